use super::Cpu;
use crate::error::Result;

impl Cpu {
    pub(crate) fn instruction_rgw(&mut self, operand: u16) -> Result<()> {
        let value = self.pop1()?;
        self.write_reg_traced(operand, value)
    }

    pub(crate) fn instruction_rgr(&mut self, operand: u16) -> Result<()> {
        let value = self.read_reg_traced(operand)?;
        self.push(value)
    }
}
