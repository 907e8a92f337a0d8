//! A thin front-end for manual smoke-testing: loads a K27 file, runs it to
//! completion, and prints the final machine state.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use kl27::{Cpu, CpuState};
use log::error;

#[derive(Parser, Debug)]
#[command(name = "klvm", about = "Run a K27 program")]
struct Args {
    /// Path to a K27 file.
    path: PathBuf,

    /// Stop after at most this many fetch-execute cycles.
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Print the trace log (oldest to newest) after the run finishes.
    #[arg(long)]
    trace: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            e.print().ok();
            // `--help`/`--version` are clap successes (exit 0); anything
            // else is a usage error, mapped to this crate's own
            // bad-arguments code rather than clap's default of 2.
            return if e.exit_code() == 0 {
                ExitCode::from(0)
            } else {
                ExitCode::from(3)
            };
        }
    };

    let mut cpu = match Cpu::load_path(&args.path) {
        Ok(cpu) => cpu,
        Err(e) => {
            error!("failed to load {}: {e}", args.path.display());
            return ExitCode::from(1);
        }
    };

    cpu.set_running();
    if let Err(e) = run(&mut cpu, args.max_cycles) {
        error!("{e}");
        return ExitCode::from(2);
    }

    print_summary(&cpu);
    if args.trace {
        print_trace(&cpu);
    }

    match cpu.state() {
        CpuState::Halted => ExitCode::from(0),
        CpuState::Errored => {
            if let Some(msg) = cpu.last_error() {
                eprintln!("cpu errored: {msg}");
            }
            ExitCode::from(2)
        }
        _ => ExitCode::from(0),
    }
}

/// Drives the CPU one `step()` at a time so `--max-cycles` can bound it;
/// the CPU's own `run_until_idle` has no such cap.
fn run(cpu: &mut Cpu, max_cycles: Option<u64>) -> kl27::Result<()> {
    loop {
        if cpu.state() != CpuState::Running {
            return Ok(());
        }
        if let Some(max) = max_cycles {
            if cpu.cycle_count() >= max {
                return Ok(());
            }
        }
        cpu.step()?;
    }
}

fn print_summary(cpu: &Cpu) {
    println!("state:        {:?}", cpu.state());
    println!("cycles:       {}", cpu.cycle_count());
    println!("pc:           {:#08x}", cpu.pc());
    for i in 0..8 {
        println!("r{i}:           {}", cpu.read_register(i).unwrap());
    }
    println!("stack:        {:?}", cpu.stack_snapshot());
    if let Some(msg) = cpu.last_error() {
        println!("last_error:   {msg}");
    }
}

fn print_trace(cpu: &Cpu) {
    println!("trace:");
    for event in cpu.trace_log() {
        println!("  {event:?}");
    }
}
