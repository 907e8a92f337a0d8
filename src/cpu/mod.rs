//! The CPU: owns the register file, memory unit, stack, and diagnostics,
//! and drives the fetch-execute cycle.

pub mod register_file;
pub mod stack;

mod execution;

use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::diagnostics::{Diagnostics, TraceEvent};
use crate::error::{KL27Error, Result};
use crate::loader::{self, LoadedImage};
use crate::memory::{Instruction, Mmu, PROGRAM_START};
use register_file::RegisterFile;
use stack::Stack;

/// The CPU's run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Halted,
    Running,
    Debugging,
    Errored,
}

/// A fully wired KL27 machine: register file, memory unit, stack, state,
/// and diagnostics, built from a loaded K27 image.
///
/// `source` is retained verbatim so `reset` can re-parse and reinstall the
/// image exactly as `new` did, without requiring the caller to keep the
/// bytes around.
pub struct Cpu {
    registers: RegisterFile,
    mmu: Mmu,
    stack: Stack,
    state: CpuState,
    cycle_count: u64,
    diagnostics: Diagnostics,
    last_error: Option<String>,
    source: Vec<u8>,
}

impl Cpu {
    /// Parses `source` as a K27 file, installs it into a fresh MMU, and
    /// returns a CPU halted at the image's entry point.
    pub fn new(source: Vec<u8>) -> Result<Self> {
        let image = loader::load(source.as_slice())?;
        let mut mmu = Mmu::new();
        image.install(&mut mmu)?;

        let mut registers = RegisterFile::new()?;
        registers.set_pc(image.entry_pc());

        Ok(Self {
            registers,
            mmu,
            stack: Stack::new(image.header.stack_size),
            state: CpuState::Halted,
            cycle_count: 0,
            diagnostics: Diagnostics::new(),
            last_error: None,
            source,
        })
    }

    /// Reads `path` from disk and builds a CPU from its contents.
    pub fn load_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|_| KL27Error::BadFile("could not read file"))?;
        Self::new(bytes)
    }

    /// Re-parses the original source, zeros the MMU, reinstalls the image,
    /// clears the stack and diagnostics, and returns to `halted` with PC at
    /// the entry point.
    pub fn reset(&mut self) -> Result<()> {
        let image: LoadedImage = loader::load(self.source.as_slice())?;

        self.mmu.clear();
        image.install(&mut self.mmu)?;

        self.registers.reset();
        self.registers.set_pc(image.entry_pc());

        self.stack = Stack::new(image.header.stack_size);
        self.diagnostics.clear();
        self.cycle_count = 0;
        self.last_error = None;
        self.state = CpuState::Halted;

        debug!("cpu reset, entry_pc={:#08x}", image.entry_pc());
        Ok(())
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn pc(&self) -> u32 {
        self.registers.pc()
    }

    pub fn read_register(&self, i: u16) -> Result<i32> {
        self.registers.read(i)
    }

    pub fn mar(&self) -> i32 {
        self.registers
            .read(register_file::MAR)
            .expect("MAR is always a valid index")
    }

    pub fn mvr(&self) -> i32 {
        self.registers
            .read(register_file::MVR)
            .expect("MVR is always a valid index")
    }

    pub fn stack_snapshot(&self) -> Vec<i32> {
        self.stack.snapshot()
    }

    pub fn instruction_log(&self) -> Vec<Instruction> {
        self.diagnostics.instruction_log.snapshot()
    }

    pub fn trace_log(&self) -> Vec<TraceEvent> {
        self.diagnostics.trace_log.snapshot()
    }

    // --- state transitions (4.5) ---

    pub fn set_running(&mut self) {
        if self.state == CpuState::Halted {
            self.state = CpuState::Running;
        }
    }

    pub fn set_halted(&mut self) {
        if matches!(self.state, CpuState::Running | CpuState::Debugging) {
            self.state = CpuState::Halted;
        }
    }

    pub fn set_debugging(&mut self) {
        if matches!(self.state, CpuState::Halted | CpuState::Running) {
            self.state = CpuState::Debugging;
        }
    }

    /// Swaps `halted` and `running`; `debugging` counts as non-halted and
    /// becomes `halted`. A no-op in `errored`.
    pub fn toggle(&mut self) {
        self.state = match self.state {
            CpuState::Halted => CpuState::Running,
            CpuState::Running | CpuState::Debugging => CpuState::Halted,
            CpuState::Errored => CpuState::Errored,
        };
    }

    fn error(&mut self, msg: String) {
        warn!("cpu errored at pc={:#08x}: {msg}", self.registers.pc());
        self.state = CpuState::Errored;
        self.diagnostics.log_error_sentinel(self.registers.pc());
        self.last_error = Some(msg);
    }

    // --- fetch-execute (4.5) ---

    /// Runs one fetch-execute cycle. Requires `running` or `debugging`;
    /// otherwise fails with `BadState`. Internal failures during the cycle
    /// are caught and transition the CPU to `errored`; `step` itself
    /// returns `Ok` in both the successful and the caught-error case.
    pub fn step(&mut self) -> Result<()> {
        if !matches!(self.state, CpuState::Running | CpuState::Debugging) {
            return Err(KL27Error::BadState);
        }

        self.cycle_count += 1;

        if let Err(e) = self.execute_cycle() {
            self.error(e.to_string());
        }

        Ok(())
    }

    /// Repeatedly steps until the state leaves `running`.
    pub fn run_until_idle(&mut self) -> Result<()> {
        while self.state == CpuState::Running {
            self.step()?;
        }
        Ok(())
    }

    fn execute_cycle(&mut self) -> Result<()> {
        let pc_before = self.registers.pc();
        let instr = self.mmu.fetch(pc_before)?;

        self.registers.set_pc(pc_before + 4);
        self.diagnostics.instruction_log.push(instr);

        self.dispatch(instr, pc_before)
    }

    fn jump_target(addr: u32) -> u32 {
        if addr < PROGRAM_START {
            addr + PROGRAM_START
        } else {
            addr
        }
    }

    fn jump(&mut self, from: u32, target: u32) {
        self.registers.set_pc(target);
        self.diagnostics
            .trace_log
            .push(TraceEvent::Jump { from, to: target });
    }

    fn push(&mut self, value: i32) -> Result<()> {
        self.stack.push(value)?;
        self.diagnostics.trace_log.push(TraceEvent::Push(value));
        Ok(())
    }

    /// Pops one value and logs a single-item `Pop(1)` trace event.
    fn pop1(&mut self) -> Result<i32> {
        let value = self.stack.pop()?;
        self.diagnostics.trace_log.push(TraceEvent::Pop(1));
        Ok(value)
    }

    /// Pops `count` values for `spop`, logging one `Pop(count)` event for
    /// the whole batch rather than one event per item.
    fn pop_many(&mut self, count: u16) -> Result<()> {
        for _ in 0..count {
            self.stack.pop()?;
        }
        self.diagnostics.trace_log.push(TraceEvent::Pop(count));
        Ok(())
    }

    fn read_reg_traced(&mut self, i: u16) -> Result<i32> {
        let value = self.registers.read(i)?;
        self.diagnostics.trace_log.push(TraceEvent::RegRead(i));
        Ok(value)
    }

    fn write_reg_traced(&mut self, i: u16, value: i32) -> Result<()> {
        self.registers.write(i, value)?;
        self.diagnostics
            .trace_log
            .push(TraceEvent::RegWrite(i, value));
        Ok(())
    }

    fn label_offset(&self, id: u16) -> Result<u32> {
        self.mmu.label_offset(id)
    }
}
