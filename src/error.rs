//! Error kinds shared by the loader and the running CPU.

use thiserror::Error;

/// Every fallible path through the loader or the CPU produces one of these.
///
/// Loader errors (`BadMagic`..`Checksum`) surface directly to the caller of
/// `load`/`reset`. Runtime errors (`MemoryFault`..`Config`) are instead caught
/// inside `Cpu::step` and recorded as `last_error`; they only reach a caller
/// directly through `BadState`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KL27Error {
    #[error("bad magic: expected \"KL27\"")]
    BadMagic,

    #[error("unsupported version {0}")]
    BadVersion(u8),

    #[error("unsupported compression mode {0}")]
    Unsupported(u8),

    #[error("malformed K27 file: {0}")]
    BadFile(&'static str),

    #[error("checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    Checksum { expected: u32, computed: u32 },

    #[error("memory fault at address {addr:#08x}")]
    MemoryFault { addr: u32 },

    #[error("stack overflow (capacity {capacity})")]
    Overflow { capacity: u8 },

    #[error("stack underflow")]
    Underflow,

    #[error("bad register index {0}")]
    BadRegister(u16),

    #[error("register {0} is protected")]
    Protected(u16),

    #[error("divide by zero")]
    DivideByZero,

    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("step called while CPU is not running or debugging")]
    BadState,

    #[error("invalid configuration: {0}")]
    Config(&'static str),
}

pub type Result<T> = core::result::Result<T, KL27Error>;
