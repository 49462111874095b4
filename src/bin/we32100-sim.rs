//! CLI front-end (SPEC_FULL.md §A): loads a `MachineConfig`, boots a
//! `Machine`, runs N steps or until a stop reason, prints a final register
//! dump.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use we32100_core::config::MachineConfig;
use we32100_core::machine::Machine;

#[derive(Parser, Debug)]
#[command(name = "we32100-sim", about = "WE32100/WE32200 3B2 core simulator")]
struct Args {
    /// Path to a JSON (or, with `config-toml`, TOML) MachineConfig.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the config's boot ROM path.
    #[arg(long)]
    rom: Option<PathBuf>,

    /// Number of instructions to run before stopping.
    #[arg(long, default_value_t = 1_000_000)]
    steps: u32,

    /// Enable instruction tracing (RUST_LOG=trace also works).
    #[arg(long)]
    trace: bool,

    /// Convert any architected exception into an external stop.
    #[arg(long)]
    halt_on_exception: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.trace {
        std::env::set_var("RUST_LOG", "trace");
    }
    we32100_core::logging::init();

    let mut config = match &args.config {
        Some(path) => MachineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => MachineConfig::default(),
    };
    if let Some(rom) = args.rom {
        config.boot_rom_path = Some(rom);
    }
    config.halt_on_exception |= args.halt_on_exception;

    let mut machine = Machine::new(config);
    let reason = machine.run(args.steps);

    tracing::info!(?reason, "simulator stopped");
    for i in 0..16 {
        println!("r{i:<2} = {:#010x}", machine.cpu.regs.get(i));
    }
    println!("stop reason: {reason}");

    Ok(())
}
