use super::Cpu;
use crate::error::Result;

impl Cpu {
    pub(crate) fn instruction_sl(&mut self, operand: u16) -> Result<()> {
        self.push(operand as i32)
    }

    pub(crate) fn instruction_spop(&mut self, operand: u16) -> Result<()> {
        self.pop_many(operand)
    }

    pub(crate) fn instruction_llbl(&mut self, operand: u16) -> Result<()> {
        let offset = self.label_offset(operand)?;
        self.push(offset as i32)
    }
}
