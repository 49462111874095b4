//! The three-phase context switch (spec §4.1 "Context switch stages").
//!
//! Ported directly from `cpu_context_switch_1/2/3` in the original source:
//! phase 1 saves the current context into the *old* PCB, phase 2 loads
//! register state from the *new* PCB, phase 3 walks the new PCB's
//! block-move descriptor list (a built-in MOVBLW loop) when the R bit
//! requests register copy-in. Each phase is a free function over
//! `&mut Registers` + a memory-access closure so exception delivery can
//! call any subset (stack/process/reset exceptions only need phases 1-2,
//! interrupts and normal GATE transfers use all three).

use crate::cpu::registers::{AP, FP, PCBP, PSW, SP};
use crate::cpu::Cpu;
use crate::error::Fault;
use crate::psw::PswFlags;

const PCB_PC_OFFSET: u32 = 4;
const PCB_SP_OFFSET: u32 = 8;
const PCB_AP_OFFSET: u32 = 20;
const PCB_FP_OFFSET: u32 = 24;
const PCB_R0_OFFSET: u32 = 28;
const PCB_BLOCKMOVE_OFFSET: u32 = 64;
const PCB_INITIAL_CONTEXT_SKIP: u32 = 12;

impl Cpu {
    /// Phase 1: save-from-current (spec §4.1 item 1).
    pub fn context_switch_save_from_current(&mut self, new_pcbp: u32) -> Result<(), Fault> {
        let pcbp = self.regs.get(PCBP);
        let pc = self.regs.pc();
        self.write_word_phys(pcbp + PCB_PC_OFFSET, pc)?;

        let new_psw_word = self.read_word_phys(new_pcbp)?;
        let mut psw = self.regs.psw();
        psw.set_flag(PswFlags::R, (new_psw_word & PswFlags::R.bits()) != 0);
        self.regs.set(PSW, psw.bits());

        self.write_word_phys(pcbp, self.regs.get(PSW))?;
        self.write_word_phys(pcbp + PCB_SP_OFFSET, self.regs.sp())?;

        if psw.flag(PswFlags::R) {
            self.write_word_phys(pcbp + PCB_FP_OFFSET, self.regs.fp())?;
            for i in 0..=8u32 {
                self.write_word_phys(pcbp + PCB_R0_OFFSET + i * 4, self.regs.get(i as usize))?;
            }
            self.write_word_phys(pcbp + PCB_AP_OFFSET, self.regs.ap())?;
            self.regs.set_fp(pcbp + 52);
        }

        Ok(())
    }

    /// Phase 2: load-from-new (spec §4.1 item 2).
    pub fn context_switch_load_from_new(&mut self, new_pcbp: u32) -> Result<(), Fault> {
        self.regs.set(PCBP, new_pcbp);

        let mut psw_bits = self.read_word_phys(new_pcbp)?;
        psw_bits &= !(1u32 << 2); // clear TM
        self.regs.set(PSW, psw_bits);
        let new_pc = self.read_word_phys(new_pcbp + PCB_PC_OFFSET)?;
        self.regs.set_pc(new_pc);
        let new_sp = self.read_word_phys(new_pcbp + PCB_SP_OFFSET)?;
        self.regs.set_sp(new_sp);

        let mut psw = self.regs.psw();
        if psw.flag(PswFlags::I) {
            psw.set_flag(PswFlags::I, false);
            self.regs.set(PSW, psw.bits());
            self.regs.set(PCBP, self.regs.get(PCBP) + PCB_INITIAL_CONTEXT_SKIP);
        }

        Ok(())
    }

    /// Phase 3: block-move-in (spec §4.1 item 3). Walks the descriptor
    /// list at `PCBP+64`: each entry is `(dest, count, source)` words,
    /// repeated until a zero count terminates the list, moving `count`
    /// words from `source` to `dest` via an inline MOVBLW-equivalent loop.
    pub fn context_switch_block_move_in(&mut self) -> Result<(), Fault> {
        let psw = self.regs.psw();
        if !psw.flag(PswFlags::R) {
            return Ok(());
        }

        let mut list_ptr = self.regs.get(PCBP) + PCB_BLOCKMOVE_OFFSET;
        let mut count = self.read_word_phys(list_ptr)?;
        list_ptr += 4;

        while count != 0 {
            let mut dest = self.read_word_phys(list_ptr)?;
            list_ptr += 4;

            while count != 0 {
                let value = self.read_word_phys(list_ptr)?;
                self.write_word_phys(dest, value)?;
                count -= 1;
                list_ptr += 4;
                dest += 4;
            }

            count = self.read_word_phys(list_ptr)?;
            list_ptr += 4;
        }

        Ok(())
    }
}

#[allow(dead_code)]
const ASSERT_SLOTS: [usize; 3] = [AP, FP, SP];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;

    #[test]
    fn save_then_load_round_trips_pc_sp_psw() {
        let mut machine = Machine::for_test(4096);
        machine.cpu.regs.set_pc(0x1000);
        machine.cpu.regs.set_sp(0x2000);
        machine.cpu.regs.set(PCBP, 0x100);

        machine.cpu.context_switch_save_from_current(0x200).unwrap();
        assert_eq!(machine.cpu.read_word_phys(0x100 + PCB_PC_OFFSET).unwrap(), 0x1000);
        assert_eq!(machine.cpu.read_word_phys(0x100 + PCB_SP_OFFSET).unwrap(), 0x2000);
    }

    #[test]
    fn load_from_new_clears_tm_and_advances_pcbp_on_i_bit() {
        let mut machine = Machine::for_test(4096);
        let new_pcbp = 0x300u32;
        let mut psw = crate::psw::Psw::new(0);
        psw.set_flag(PswFlags::I, true);
        psw.set_tm(true);
        machine.cpu.write_word_phys(new_pcbp, psw.bits()).unwrap();
        machine.cpu.write_word_phys(new_pcbp + PCB_PC_OFFSET, 0x4000).unwrap();
        machine.cpu.write_word_phys(new_pcbp + PCB_SP_OFFSET, 0x5000).unwrap();

        machine.cpu.context_switch_load_from_new(new_pcbp).unwrap();

        assert_eq!(machine.cpu.regs.pc(), 0x4000);
        assert_eq!(machine.cpu.regs.sp(), 0x5000);
        assert!(!machine.cpu.regs.psw().tm());
        assert!(!machine.cpu.regs.psw().flag(PswFlags::I));
        assert_eq!(machine.cpu.regs.get(PCBP), new_pcbp + PCB_INITIAL_CONTEXT_SKIP);
    }

    #[test]
    fn block_move_in_no_op_without_r_flag() {
        let mut machine = Machine::for_test(4096);
        assert!(machine.cpu.context_switch_block_move_in().is_ok());
    }
}
