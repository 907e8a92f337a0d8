//! The eleven-register table: eight general-purpose registers plus the
//! three special registers PC, MAR, and MVR.

use crate::error::{KL27Error, Result};
use crate::register::Register;

/// Index of the memory address register.
pub const MAR: u16 = 8;
/// Index of the memory value register.
pub const MVR: u16 = 9;
/// Index of the program counter.
pub const PC: u16 = 10;

const REGISTER_COUNT: usize = 11;

/// Register polymorphism by index: a fixed table rather than a hand-written
/// match per register, with PC marked read-only to external writers.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    registers: [Register; REGISTER_COUNT],
}

impl RegisterFile {
    pub fn new() -> Result<Self> {
        let mut registers = [Register::new(16)?; REGISTER_COUNT];
        registers[MAR as usize] = Register::new(32)?;
        registers[MVR as usize] = Register::new(32)?;
        registers[PC as usize] = Register::new(32)?;

        Ok(Self { registers })
    }

    /// Allowed for `i` in `[0, 10]`.
    pub fn read(&self, i: u16) -> Result<i32> {
        self.registers
            .get(i as usize)
            .map(|r| r.read())
            .ok_or(KL27Error::BadRegister(i))
    }

    /// Allowed for `i` in `[0, 9]`; writing PC (10) fails with `Protected`,
    /// and any index above 10 fails with `BadRegister`.
    pub fn write(&mut self, i: u16, v: i32) -> Result<()> {
        if i == PC {
            return Err(KL27Error::Protected(i));
        }

        self.registers
            .get_mut(i as usize)
            .ok_or(KL27Error::BadRegister(i))?
            .write(v);

        Ok(())
    }

    /// Reads the program counter as an unsigned address.
    pub fn pc(&self) -> u32 {
        self.registers[PC as usize].read() as u32
    }

    /// Sets the program counter directly, bypassing the `write`
    /// protection (internal fetch/jump logic only).
    pub fn set_pc(&mut self, addr: u32) {
        self.registers[PC as usize].write(addr as i32);
    }

    pub fn reset(&mut self) {
        for reg in &mut self.registers {
            reg.write(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_purpose_registers_round_trip_sign_extended() {
        let mut regs = RegisterFile::new().unwrap();
        regs.write(0, -1).unwrap();
        assert_eq!(regs.read(0).unwrap(), -1);
    }

    #[test]
    fn writing_pc_is_protected() {
        let mut regs = RegisterFile::new().unwrap();
        assert_eq!(regs.write(PC, 0x2000).unwrap_err(), KL27Error::Protected(PC));
    }

    #[test]
    fn reading_pc_is_allowed() {
        let regs = RegisterFile::new().unwrap();
        assert_eq!(regs.read(PC).unwrap(), 0);
    }

    #[test]
    fn out_of_range_index_is_bad_register() {
        let regs = RegisterFile::new().unwrap();
        assert_eq!(regs.read(11).unwrap_err(), KL27Error::BadRegister(11));
    }

    #[test]
    fn set_pc_bypasses_protection() {
        let mut regs = RegisterFile::new().unwrap();
        regs.set_pc(0x1234);
        assert_eq!(regs.pc(), 0x1234);
    }
}
