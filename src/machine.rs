//! `Machine`: the top-level owner of the booted system — config, the
//! physical bus, and the [`Cpu`] (which in turn owns MMU/MAU/timer/
//! interrupt/CIO state) — plus save/load-state lifecycle (spec §9 Design
//! Notes "single Machine value"; SPEC_FULL.md §A `src/machine.rs`).

use crate::config::{MachineConfig, MmuGeneration};
use crate::cpu::Cpu;
use crate::memory::{Bus, Ram, Rom};
use crate::mmu::gen1::MmuGen1;
use crate::mmu::gen2::MmuGen2;
use crate::mmu::Mmu;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Boot ROM base and size (spec §6 "Memory map": "ROM at 0..128K").
pub const ROM_BASE: u32 = 0;
pub const ROM_SIZE: u32 = 128 * 1024;
/// Main RAM base (spec §6: "Main RAM at 0x2000000..0x2000000+size").
pub const RAM_BASE: u32 = 0x0200_0000;

/// TOD persistence record shape (SPEC_FULL.md §C.6): a small
/// serde-serializable struct rather than real hardware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub sec: u8,
    pub min: u8,
    pub hour: u8,
    pub mday: u8,
    pub mon: u8,
    pub year: u16,
    pub host_delta_secs: i64,
}

/// Persisted non-architectural state (SPEC_FULL.md §C.6 "NVRAM as a
/// fixed-size raw byte blob, TOD as a small serde-serializable struct").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedState {
    pub nvram: Vec<u8>,
    pub tod: TimeOfDay,
}

pub const NVRAM_SIZE: usize = 8192;

pub struct Machine {
    pub config: MachineConfig,
    pub cpu: Cpu,
    pub nvram: Vec<u8>,
    pub tod: TimeOfDay,
}

fn build_mmu(generation: MmuGeneration) -> Box<dyn Mmu> {
    match generation {
        MmuGeneration::Gen1 => Box::new(MmuGen1::new()),
        MmuGeneration::Gen2 => Box::new(MmuGen2::new()),
    }
}

impl Machine {
    /// Boots a machine from `config`: attaches boot ROM (if configured) and
    /// RAM sized per `config.ram_size_mib`, per the memory map of spec §6.
    pub fn new(config: MachineConfig) -> Self {
        let mut bus = Bus::new();
        if let Some(rom_path) = &config.boot_rom_path {
            if let Ok(content) = std::fs::read(rom_path) {
                bus.attach(ROM_BASE, ROM_SIZE, Box::new(Rom::new(content)));
            }
        }
        let ram_size = (config.ram_size_mib as usize) * 1024 * 1024;
        bus.attach(RAM_BASE, ram_size as u32, Box::new(Ram::new(ram_size)));

        let mmu = build_mmu(config.mmu_generation);
        let mut cpu = Cpu::new(bus, mmu);
        cpu.halt_on_exception = config.halt_on_exception;

        Machine { config, cpu, nvram: vec![0; NVRAM_SIZE], tod: TimeOfDay::default() }
    }

    /// A machine wired for unit tests: `size` bytes of flat RAM starting at
    /// physical address 0 (so tests can write code at low addresses
    /// without caring about the real memory map), MMU disabled by default,
    /// gen1 MMU plugged in.
    pub fn for_test(size: usize) -> Self {
        let mut bus = Bus::new();
        bus.attach(0, size as u32, Box::new(Ram::new(size)));
        let mmu: Box<dyn Mmu> = Box::new(MmuGen1::new());
        let mut machine = Machine {
            config: MachineConfig::default(),
            cpu: Cpu::new(bus, mmu),
            nvram: vec![0; NVRAM_SIZE],
            tod: TimeOfDay::default(),
        };
        machine.cpu.mmu_enabled = false;
        machine
    }

    pub fn save_state(&self, path: &Path) -> std::io::Result<()> {
        let state = SavedState { nvram: self.nvram.clone(), tod: self.tod };
        let text = serde_json::to_string_pretty(&state).expect("SavedState always serializes");
        std::fs::write(path, text)
    }

    pub fn load_state(&mut self, path: &Path) -> std::io::Result<()> {
        let text = std::fs::read_to_string(path)?;
        let state: SavedState =
            serde_json::from_str(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.nvram = state.nvram;
        self.tod = state.tod;
        Ok(())
    }

    /// Runs until `max_steps` instructions retire or the interpreter stops
    /// for any reason (spec §4.1 "Public contract").
    pub fn run(&mut self, max_steps: u32) -> crate::error::StopReason {
        for _ in 0..max_steps {
            if let Err(reason) = self.cpu.step() {
                return reason;
            }
        }
        crate::error::StopReason::StepBudgetExhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_test_machine_boots_with_mmu_disabled() {
        let machine = Machine::for_test(4096);
        assert!(!machine.cpu.mmu_enabled);
    }

    #[test]
    fn saved_state_round_trips_through_json() {
        let dir = std::env::temp_dir();
        let path = dir.join("we32100_test_state.json");
        let mut machine = Machine::for_test(4096);
        machine.nvram[0] = 0xab;
        machine.tod.year = 1991;
        machine.save_state(&path).unwrap();

        let mut reloaded = Machine::for_test(4096);
        reloaded.load_state(&path).unwrap();
        assert_eq!(reloaded.nvram[0], 0xab);
        assert_eq!(reloaded.tod.year, 1991);
        let _ = std::fs::remove_file(&path);
    }
}
