use super::Cpu;
use crate::error::{KL27Error, Result};
use crate::instruction::sign_extend_operand;

impl Cpu {
    fn resolve_rhs(&mut self, operand: u16) -> Result<i32> {
        if operand == 0 {
            self.pop1()
        } else {
            Ok(sign_extend_operand(operand))
        }
    }

    fn binary_op(&mut self, operand: u16, op: impl Fn(i32, i32) -> Result<i32>) -> Result<()> {
        let rhs = self.resolve_rhs(operand)?;
        let lhs = self.pop1()?;
        let result = op(lhs, rhs)?;
        self.push(result)
    }

    pub(crate) fn instruction_add(&mut self, operand: u16) -> Result<()> {
        self.binary_op(operand, |lhs, rhs| Ok(lhs.wrapping_add(rhs)))
    }

    pub(crate) fn instruction_sub(&mut self, operand: u16) -> Result<()> {
        self.binary_op(operand, |lhs, rhs| Ok(lhs.wrapping_sub(rhs)))
    }

    pub(crate) fn instruction_mul(&mut self, operand: u16) -> Result<()> {
        self.binary_op(operand, |lhs, rhs| Ok(lhs.wrapping_mul(rhs)))
    }

    pub(crate) fn instruction_div(&mut self, operand: u16) -> Result<()> {
        self.binary_op(operand, |lhs, rhs| {
            if rhs == 0 {
                Err(KL27Error::DivideByZero)
            } else {
                Ok(lhs.wrapping_div(rhs))
            }
        })
    }
}
