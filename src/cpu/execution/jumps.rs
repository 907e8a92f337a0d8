use super::Cpu;
use crate::error::Result;

/// Index of the general-purpose register used as the call-return slot.
const LINK_REGISTER: u16 = 7;

impl Cpu {
    pub(crate) fn instruction_jmpl(&mut self, pc_before: u32, operand: u16) -> Result<()> {
        let target = Self::jump_target(self.label_offset(operand)?);
        self.jump(pc_before, target);
        Ok(())
    }

    pub(crate) fn instruction_jmpr(&mut self, pc_before: u32, operand: u16) -> Result<()> {
        let return_address = self.pc() as i32;
        self.write_reg_traced(LINK_REGISTER, return_address)?;

        let target = Self::jump_target(self.label_offset(operand)?);
        self.jump(pc_before, target);
        Ok(())
    }

    pub(crate) fn instruction_ret(&mut self, pc_before: u32) -> Result<()> {
        let link = self.read_reg_traced(LINK_REGISTER)?;
        let target = Self::jump_target(link as u32);
        self.jump(pc_before, target);
        Ok(())
    }

    pub(crate) fn instruction_jmpa(&mut self, pc_before: u32) -> Result<()> {
        let addr = self.pop1()?;
        let target = Self::jump_target(addr as u32);
        self.jump(pc_before, target);
        Ok(())
    }
}
