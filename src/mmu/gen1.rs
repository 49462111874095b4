//! First-generation MMU: direct-mapped PD cache, no context-ID tagging
//! (spec §9 Design Notes / SPEC_FULL.md "two generations").

use super::cache::{PdCacheDirect, SdCache};
use super::{
    access_right_for_level, encode_fault_code, MmuRegisters, Mmu, PageDescriptor, PageSize, SegmentDescriptor,
    VirtualAddress, AccessRequest, MAX_INDIRECT_CHAIN,
};
use crate::error::{Fault, TranslationFault};
use crate::memory::{Bus, Width};
use crate::psw::Level;

pub struct MmuGen1 {
    sdc: SdCache,
    pdc: PdCacheDirect,
    regs: MmuRegisters,
    /// Physical base address of the segment descriptor table for section
    /// `SID` (spec §4.2 "Walk" step 1: "base[SID]+SSL*8").
    pub section_table_base: [u32; 4],
    pub page_size: PageSize,
}

impl MmuGen1 {
    pub fn new() -> Self {
        MmuGen1 {
            sdc: SdCache::new(),
            pdc: PdCacheDirect::new(),
            regs: MmuRegisters::default(),
            section_table_base: [0; 4],
            page_size: PageSize::Size4K,
        }
    }

    fn fault(&mut self, va: u32, access: AccessRequest, level: Level, kind: TranslationFault) -> Fault {
        self.regs.fault_address = va;
        self.regs.fault_code = encode_fault_code(access, level, kind);
        Fault::Translation(kind)
    }

    fn fetch_segment_descriptor(&mut self, bus: &mut Bus, sid: u8, ssl: u16) -> Result<SegmentDescriptor, Fault> {
        let base = self.section_table_base[(sid & 0b11) as usize];
        let addr = base.wrapping_add(ssl as u32 * 8);
        let word0 = bus.read(addr, Width::Word)?;
        let word1 = bus.read(addr + 4, Width::Word)?;
        Ok(SegmentDescriptor::decode(word0, word1))
    }
}

impl Default for MmuGen1 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mmu for MmuGen1 {
    fn translate(&mut self, va: u32, access: AccessRequest, level: Level, bus: &mut Bus) -> Result<u32, Fault> {
        let decoded = VirtualAddress::decode(va);

        let sd = match self.sdc.lookup(va, decoded.ssl) {
            Some(sd) => sd,
            None => {
                let sd = self.fetch_segment_descriptor(bus, decoded.section, decoded.ssl)?;
                if !sd.present {
                    return Err(self.fault(va, access, level, TranslationFault::SegmentNotPresent));
                }
                self.sdc.install(va, decoded.ssl, sd);
                sd
            }
        };

        let right = access_right_for_level(sd.access_control, level);
        if !right.permits(access) {
            return Err(self.fault(va, access, level, TranslationFault::AccessDenied));
        }

        if !sd.paged {
            if decoded.sot > sd.max_offset {
                return Err(self.fault(va, access, level, TranslationFault::SegmentOffsetOutOfRange));
            }
            return Ok(sd.address.wrapping_add(decoded.sot));
        }

        let offset_bits = self.page_size.offset_bits();
        let psl = decoded.sot >> offset_bits;
        let pot = decoded.sot & ((1u32 << offset_bits) - 1);
        if psl > sd.max_offset {
            return Err(self.fault(va, access, level, TranslationFault::SdtLength));
        }

        let mut pd = match self.pdc.lookup(va) {
            Some(pd) => pd,
            None => {
                let mut addr = sd.address.wrapping_add(psl * 4);
                let mut chain = 0;
                let mut pd;
                loop {
                    let word = bus.read(addr, Width::Word)?;
                    pd = PageDescriptor::decode(word);
                    if !pd.present {
                        return Err(self.fault(va, access, level, TranslationFault::PageNotPresent));
                    }
                    if !pd.indirect {
                        break;
                    }
                    chain += 1;
                    if chain > MAX_INDIRECT_CHAIN {
                        return Err(self.fault(va, access, level, TranslationFault::IndirectTooDeep));
                    }
                    addr = pd.addr;
                }
                self.pdc.install(va, pd);
                pd
            }
        };

        pd.referenced = true;
        if access.is_write() {
            pd.modified = true;
        }
        self.pdc.install(va, pd);

        Ok(pd.addr | pot)
    }

    fn registers(&self) -> MmuRegisters {
        self.regs
    }

    fn flush_all(&mut self) {
        self.sdc.flush_all();
        self.pdc.flush_all();
    }

    fn flush_entry(&mut self, va: u32) {
        self.sdc.flush_entry(va);
        self.pdc.flush_entry(va);
    }
}
