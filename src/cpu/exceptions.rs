//! Exception classes, the two-level gate mechanism, and interrupt delivery
//! (spec §4.1 "Exception classes", "GATE", "Interrupts").
//!
//! Ported from `cpu_on_interrupt` in the original source for the interrupt
//! path; the four exception classes generalize the same push/gate/
//! context-switch shape with class-specific pre-switch PSW encoding and
//! new-PCBP source, per spec §4.1 and the ISC table in spec §6.

use crate::cpu::registers::PCBP;
use crate::cpu::Cpu;
use crate::error::{Exception, ExceptionType, Fault, StopReason};
use crate::psw::Level;

/// Reset vector: PCBP for the Reset exception class (spec §6 memory map,
/// "physical 0x80").
const RESET_VECTOR_PCBP: u32 = 0x80;
/// Fixed system-data location carrying the Stack exception's PCBP (spec
/// §4.1 "reads a new PCBP from a fixed system-data location (offset
/// 0x88)").
const STACK_EXCEPTION_PCBP_PTR: u32 = 0x88;
/// Interrupt vector table base: entry `vec` lives at `0x8c + 4*vec` (spec
/// §4.1 "Interrupts").
const INTERRUPT_VECTOR_BASE: u32 = 0x8c;
/// Fixed system-data location carrying the Process exception's PCBP.
/// Not spelled out verbatim in the distilled spec; chosen adjacent to the
/// stack-exception slot and recorded as an Open-Question resolution in
/// DESIGN.md rather than guessed from unread source.
const PROCESS_EXCEPTION_PCBP_PTR: u32 = 0x84;
/// Base of the two-level gate table used by both the explicit GATE opcode
/// and Normal-exception dispatch (spec §4.1 "GATE", "per-ISC dispatch
/// using the same gate mechanism as GATE"). Same Open-Question status as
/// above.
const GATE_TABLE_BASE: u32 = 0x90;

impl Cpu {
    fn push_word_isp(&mut self, value: u32) -> Result<(), Fault> {
        let isp = self.regs.isp() - 4;
        self.regs.set_isp(isp);
        self.write_word_phys(isp, value)
    }

    /// Two-level gate table lookup (spec §4.1 "GATE"): `index1` selects a
    /// level-2 table pointer out of the level-1 table, `index2` selects
    /// the final PCBP out of that level-2 table.
    pub fn gate_lookup(&mut self, index1: u32, index2: u32) -> Result<u32, Fault> {
        let level1_base = self.read_word_phys(GATE_TABLE_BASE).map_err(|_| Fault::InvalidGateVector)?;
        let level2_base = self
            .read_word_phys(level1_base.wrapping_add(index1 & !0x3))
            .map_err(|_| Fault::InvalidGateVector)?;
        self.read_word_phys(level2_base.wrapping_add(index2 & !0x3))
            .map_err(|_| Fault::InvalidGateVector)
    }

    /// Shared tail of every exception/interrupt delivery path: push the
    /// old PCBP, run phases 1-2 of the context switch into `new_pcbp`,
    /// force the post-switch PSW encoding, then run phase 3.
    fn switch_to(&mut self, new_pcbp: u32, post_isc: u32, post_et: u32) -> Result<(), Fault> {
        self.exception_depth += 1;
        self.push_word_isp(self.regs.get(PCBP))?;
        self.context_switch_save_from_current(new_pcbp)?;
        self.context_switch_load_from_new(new_pcbp)?;

        let mut psw = self.regs.psw();
        psw.set_isc(post_isc);
        psw.set_tm(false);
        psw.set_et(post_et);
        self.regs.set(crate::cpu::registers::PSW, psw.bits());

        self.context_switch_block_move_in()
    }

    /// Deliver an architected exception, dispatching on its class (spec
    /// §4.1 "Exception classes").
    pub fn deliver_exception(&mut self, exception: Exception) -> Result<(), StopReason> {
        if self.exception_depth >= super::MAX_EXCEPTION_DEPTH {
            return Err(StopReason::ExceptionStackTooDeep);
        }

        let result = match exception.kind {
            ExceptionType::Normal => self.deliver_normal(exception.isc),
            ExceptionType::Stack => self.deliver_stack(exception.isc),
            ExceptionType::Process => self.deliver_process(exception.isc),
            ExceptionType::Reset => self.deliver_reset(exception.isc),
        };

        result.map_err(|_fault| StopReason::ExceptionStackTooDeep)
    }

    fn deliver_normal(&mut self, isc: u8) -> Result<(), Fault> {
        let mut psw = self.regs.psw();
        psw.set_et(3);
        psw.set_isc(isc as u32);
        psw.set_tm(false);
        self.regs.set(crate::cpu::registers::PSW, psw.bits());

        let new_pcbp = self.gate_lookup(0, (isc as u32) << 3)?;
        self.switch_to(new_pcbp, 7, 3)
    }

    fn deliver_stack(&mut self, _isc: u8) -> Result<(), Fault> {
        self.force_kernel_mode();
        let new_pcbp = self.read_word_phys(STACK_EXCEPTION_PCBP_PTR)?;
        self.switch_to(new_pcbp, 7, 3)
    }

    fn deliver_process(&mut self, _isc: u8) -> Result<(), Fault> {
        self.force_kernel_mode();
        let new_pcbp = self.read_word_phys(PROCESS_EXCEPTION_PCBP_PTR)?;
        self.switch_to(new_pcbp, 7, 3)
    }

    fn deliver_reset(&mut self, _isc: u8) -> Result<(), Fault> {
        self.mmu_enabled = false;
        let new_pcbp = self.read_word_phys(RESET_VECTOR_PCBP)?;
        self.context_switch_load_from_new(new_pcbp)?;
        self.context_switch_block_move_in()
    }

    fn force_kernel_mode(&mut self) {
        let mut psw = self.regs.psw();
        psw.set_cm(Level::Kernel);
        self.regs.set(crate::cpu::registers::PSW, psw.bits());
    }

    /// Deliver a vectored or non-maskable interrupt (spec §4.1
    /// "Interrupts"), ported from `cpu_on_interrupt`.
    pub fn deliver_interrupt(&mut self, vector: u16) -> Result<(), StopReason> {
        if self.exception_depth >= super::MAX_EXCEPTION_DEPTH {
            return Err(StopReason::ExceptionStackTooDeep);
        }
        self.force_kernel_mode();

        let mut psw = self.regs.psw();
        psw.set_et(1);
        psw.set_isc(0);
        psw.set_tm(false);
        self.regs.set(crate::cpu::registers::PSW, psw.bits());

        let new_pcbp = self
            .read_word_phys(INTERRUPT_VECTOR_BASE + 4 * vector as u32)
            .map_err(|_| StopReason::ExceptionStackTooDeep)?;

        self.switch_to(new_pcbp, 7, 3).map_err(|_| StopReason::ExceptionStackTooDeep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;

    #[test]
    fn normal_exception_routes_through_gate_table() {
        let mut machine = Machine::for_test(65536);
        // Level-1 table at 0x90 -> level-2 table at 0x1000; level-2[isc<<3]
        // -> new PCBP 0x2000.
        machine.cpu.write_word_phys(0x90, 0x1000).unwrap();
        machine.cpu.write_word_phys(0x1000, 0x2000).unwrap();
        machine.cpu.regs.set_pc(0x500);
        machine.cpu.regs.set(PCBP, 0x300);

        let exc = Exception { kind: ExceptionType::Normal, isc: 2, fault: Fault::IllegalOpcode };
        machine.cpu.deliver_exception(exc).unwrap();

        assert_eq!(machine.cpu.regs.get(PCBP), 0x2000);
        assert_eq!(machine.cpu.regs.psw().et(), 3);
        assert_eq!(machine.cpu.regs.psw().isc(), 7);
    }

    #[test]
    fn reset_exception_disables_mmu_and_loads_fixed_vector() {
        let mut machine = Machine::for_test(65536);
        machine.cpu.mmu_enabled = true;
        machine.cpu.write_word_phys(RESET_VECTOR_PCBP, 0x4000).unwrap();
        machine.cpu.write_word_phys(0x4000 + 4, 0x9000).unwrap();
        machine.cpu.write_word_phys(0x4000 + 8, 0xa000).unwrap();

        let exc = Exception { kind: ExceptionType::Reset, isc: 3, fault: Fault::ExternalReset };
        machine.cpu.deliver_exception(exc).unwrap();

        assert!(!machine.cpu.mmu_enabled);
        assert_eq!(machine.cpu.regs.pc(), 0x9000);
        assert_eq!(machine.cpu.regs.sp(), 0xa000);
    }
}
