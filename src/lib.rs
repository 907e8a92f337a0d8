//! KL27: a 16-bit virtual CPU that executes programs stored in the K27
//! binary container.
//!
//! The crate is split the way the machine itself is: a [`register::Register`]
//! is a single sign-extending machine word, a [`memory::Mmu`] is the flat
//! byte-addressable memory unit, [`loader`] turns a K27 byte stream into an
//! image installed into an `Mmu`, [`diagnostics`] holds the bounded ring
//! buffers a front-end polls between steps, and [`cpu::Cpu`] wires all of the
//! above into the fetch-execute cycle.

pub mod cpu;
pub mod diagnostics;
pub mod error;
pub mod instruction;
pub mod loader;
pub mod memory;
pub mod register;

pub use cpu::{Cpu, CpuState};
pub use error::{KL27Error, Result};
