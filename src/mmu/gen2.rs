//! Second-generation MMU: fully-associative 64-entry PD cache tagged with a
//! context ID, so several address spaces can be resident at once (spec
//! §4.2 "Caches": "PD cache is 64 entries (2g MMU), tag includes context
//! ID").

use super::cache::{PdCacheAssoc, SdCache};
use super::{
    access_right_for_level, encode_fault_code, AccessRequest, MmuRegisters, Mmu, PageDescriptor, PageSize,
    SegmentDescriptor, VirtualAddress, MAX_INDIRECT_CHAIN,
};
use crate::error::{Fault, TranslationFault};
use crate::memory::{Bus, Width};
use crate::psw::Level;

const PDC_CAPACITY: usize = 64;

pub struct MmuGen2 {
    sdc: SdCache,
    pdc: PdCacheAssoc,
    regs: MmuRegisters,
    pub section_table_base: [u32; 4],
    /// Selected by SID, per spec §4.2 "Registers": "context-ID array".
    pub context_id: [u8; 4],
    pub page_size: PageSize,
}

impl MmuGen2 {
    pub fn new() -> Self {
        MmuGen2 {
            sdc: SdCache::new(),
            pdc: PdCacheAssoc::new(PDC_CAPACITY),
            regs: MmuRegisters::default(),
            section_table_base: [0; 4],
            context_id: [0; 4],
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

impl Default for MmuGen2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mmu for MmuGen2 {
    fn translate(&mut self, va: u32, access: AccessRequest, level: Level, bus: &mut Bus) -> Result<u32, Fault> {
        let decoded = VirtualAddress::decode(va);
        let context_id = self.context_id[(decoded.section & 0b11) as usize];

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

        let mut pd = match self.pdc.lookup(context_id, va) {
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
                self.pdc.install(context_id, va, pd);
                pd
            }
        };

        pd.referenced = true;
        if access.is_write() {
            pd.modified = true;
        }
        self.pdc.install(context_id, va, pd);
        self.pdc.set_modified(context_id, va);

        Ok(pd.addr | pot)
    }

    fn registers(&self) -> MmuRegisters {
        self.regs
    }

    fn flush_all(&mut self) {
        self.sdc.flush_all();
        self.pdc.flush_all_but_most_recent();
    }

    fn flush_entry(&mut self, va: u32) {
        let decoded = VirtualAddress::decode(va);
        let context_id = self.context_id[(decoded.section & 0b11) as usize];
        self.sdc.flush_entry(va);
        self.pdc.flush_entry(context_id, va);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Ram;

    fn bus_with_identity_mapping(size: usize) -> Bus {
        let mut bus = Bus::new();
        bus.attach(0, size as u32, Box::new(Ram::new(size)));
        bus
    }

    #[test]
    fn unpaged_segment_translates_by_offset() {
        let mut bus = bus_with_identity_mapping(65536);
        let mut mmu = MmuGen2::new();
        mmu.section_table_base[0] = 0x1000;
        // SSL=0 descriptor at 0x1000: address=0x8000, present+non-paged,
        // max_offset=0xffff, access_control=0xff (read-write everywhere).
        bus.write(0x1000, Width::Word, 0x8000).unwrap();
        bus.write(0x1004, Width::Word, 0x8000_0000 | 0xffff).unwrap();

        let pa = mmu.translate(0x10, AccessRequest::OperandFetch, Level::Kernel, &mut bus).unwrap();
        assert_eq!(pa, 0x8010);
    }

    #[test]
    fn segment_not_present_is_a_fault() {
        let mut bus = bus_with_identity_mapping(65536);
        let mut mmu = MmuGen2::new();
        mmu.section_table_base[0] = 0x1000;

        let result = mmu.translate(0x10, AccessRequest::OperandFetch, Level::Kernel, &mut bus);
        assert_eq!(result, Err(Fault::Translation(TranslationFault::SegmentNotPresent)));
    }
}
