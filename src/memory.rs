//! The flat, byte-addressable memory unit (MMU).

use crate::error::{KL27Error, Result};
use serde::{Deserialize, Serialize};

/// Total addressable size of the MMU: 16 MiB.
pub const MEMORY_SIZE: usize = 0x1000000;

/// Reserved region, currently unused by the core itself.
pub const RESERVED_START: u32 = 0x00000;

/// Start of the label table (3840 bytes, up to 640 six-byte records).
pub const LABEL_TABLE_START: u32 = 0x00100;

/// End of the label table / start of program code.
pub const LABEL_TABLE_END: u32 = 0x01000;

/// Start of the program code region.
pub const PROGRAM_START: u32 = 0x01000;

/// End of the program code region / start of data memory.
pub const PROGRAM_END: u32 = 0x40000;

/// Size in bytes of one on-disk label record as installed in memory.
const LABEL_RECORD_SIZE: u32 = 6;

/// A decoded 4-byte instruction fetched from program memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub address: u32,
    pub opcode: u16,
    pub operand: u16,
}

/// A flat 16 MiB byte array with typed big-endian accessors.
///
/// Every accessor fails with `MemoryFault` if any touched byte lies outside
/// `[0, MEMORY_SIZE)`.
#[derive(Clone)]
pub struct Mmu {
    bytes: Box<[u8]>,
}

impl Mmu {
    pub fn new() -> Self {
        Self {
            bytes: vec![0u8; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    /// Zeroes every byte, as happens on `reset`.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    fn check_range(&self, addr: u32, len: u32) -> Result<()> {
        let end = (addr as u64) + (len as u64);
        if end > MEMORY_SIZE as u64 {
            return Err(KL27Error::MemoryFault { addr });
        }
        Ok(())
    }

    pub fn read8(&self, addr: u32) -> Result<i8> {
        self.check_range(addr, 1)?;
        Ok(self.bytes[addr as usize] as i8)
    }

    pub fn write8(&mut self, addr: u32, value: i8) -> Result<()> {
        self.check_range(addr, 1)?;
        self.bytes[addr as usize] = value as u8;
        Ok(())
    }

    pub fn read16(&self, addr: u32) -> Result<i16> {
        self.check_range(addr, 2)?;
        let i = addr as usize;
        Ok(i16::from_be_bytes([self.bytes[i], self.bytes[i + 1]]))
    }

    pub fn write16(&mut self, addr: u32, value: i16) -> Result<()> {
        self.check_range(addr, 2)?;
        let i = addr as usize;
        let b = value.to_be_bytes();
        self.bytes[i..i + 2].copy_from_slice(&b);
        Ok(())
    }

    pub fn read32(&self, addr: u32) -> Result<i32> {
        self.check_range(addr, 4)?;
        let i = addr as usize;
        Ok(i32::from_be_bytes([
            self.bytes[i],
            self.bytes[i + 1],
            self.bytes[i + 2],
            self.bytes[i + 3],
        ]))
    }

    pub fn write32(&mut self, addr: u32, value: i32) -> Result<()> {
        self.check_range(addr, 4)?;
        let i = addr as usize;
        let b = value.to_be_bytes();
        self.bytes[i..i + 4].copy_from_slice(&b);
        Ok(())
    }

    /// Writes a raw byte slice starting at `addr`, used by the loader to
    /// install the label table and instruction body.
    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.check_range(addr, data.len() as u32)?;
        let i = addr as usize;
        self.bytes[i..i + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Fetches a decoded 4-byte instruction at `addr`.
    pub fn fetch(&self, addr: u32) -> Result<Instruction> {
        let opcode = self.read16(addr)? as u16;
        let operand = self.read16(addr + 2)? as u16;
        Ok(Instruction {
            address: addr,
            opcode,
            operand,
        })
    }

    /// Resolves a label id to the absolute offset stored for it in the
    /// label table, i.e. the `u32` at `0x00100 + 6*id + 2`.
    pub fn label_offset(&self, id: u16) -> Result<u32> {
        let addr = LABEL_TABLE_START + LABEL_RECORD_SIZE * id as u32 + 2;
        Ok(self.read32(addr)? as u32)
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_big_endian_accessors() {
        let mut mmu = Mmu::new();
        mmu.write8(0x40000, -5).unwrap();
        assert_eq!(mmu.read8(0x40000).unwrap(), -5);

        mmu.write16(0x40010, -1000).unwrap();
        assert_eq!(mmu.read16(0x40010).unwrap(), -1000);

        mmu.write32(0x40020, -123456).unwrap();
        assert_eq!(mmu.read32(0x40020).unwrap(), -123456);
    }

    #[test]
    fn big_endian_byte_order_is_honored() {
        let mut mmu = Mmu::new();
        mmu.write_bytes(0x40000, &[0x01, 0x02, 0x03, 0x04]).unwrap();
        assert_eq!(mmu.read32(0x40000).unwrap(), 0x01020304);
    }

    #[test]
    fn out_of_bounds_access_faults() {
        let mmu = Mmu::new();
        let err = mmu.read32(MEMORY_SIZE as u32 - 2).unwrap_err();
        assert_eq!(
            err,
            KL27Error::MemoryFault {
                addr: MEMORY_SIZE as u32 - 2
            }
        );
    }

    #[test]
    fn fetch_decodes_opcode_and_operand() {
        let mut mmu = Mmu::new();
        mmu.write_bytes(PROGRAM_START, &[0x00, 0x02, 0x00, 0x07])
            .unwrap();
        let insn = mmu.fetch(PROGRAM_START).unwrap();
        assert_eq!(insn.address, PROGRAM_START);
        assert_eq!(insn.opcode, 0x0002);
        assert_eq!(insn.operand, 0x0007);
    }

    #[test]
    fn label_offset_reads_the_offset_field_of_the_record() {
        let mut mmu = Mmu::new();
        // id=3 record starts at 0x100 + 6*3 = 0x112; offset field at +2.
        mmu.write16(LABEL_TABLE_START + 18, 3).unwrap();
        mmu.write32(LABEL_TABLE_START + 20, 0x0020).unwrap();
        assert_eq!(mmu.label_offset(3).unwrap(), 0x0020);
    }

    #[test]
    fn clear_zeroes_everything() {
        let mut mmu = Mmu::new();
        mmu.write32(0x40000, -1).unwrap();
        mmu.clear();
        assert_eq!(mmu.read32(0x40000).unwrap(), 0);
    }
}
