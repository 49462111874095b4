//! The memory management unit (spec §4.2).
//!
//! Generalizes the teacher's direct VA==PA flat memory model to a real
//! two-level segment/page walk with caches, behind a [`Mmu`] trait so the
//! two hardware generations ([`gen1::MmuGen1`], [`gen2::MmuGen2`]) can share
//! [`Cpu`]'s call site (`cpu/mod.rs`'s `translate`) without it knowing which
//! generation is plugged in.

pub mod cache;
pub mod gen1;
pub mod gen2;

use crate::error::{Fault, TranslationFault};
use crate::memory::Bus;
use crate::psw::Level;

/// Access-request tag carried by every virtual memory operation (spec §4.1
/// "Memory primitives", §4.2 "Contract"). The MMU uses this, together with
/// the current execution level, to check the 2-bit-per-level permission
/// field on the segment descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequest {
    MoveTranslated,
    CoprocessorWrite,
    CoprocessorFetch,
    InterlockedRead,
    AddressFetch,
    OperandFetch,
    Write,
    InstructionFetch,
    InstructionFetchAfterDiscontinuity,
}

impl AccessRequest {
    /// True for any request that must check write permission and, on
    /// success, set the M (modified) bit (spec §4.2 step 4).
    pub fn is_write(self) -> bool {
        matches!(self, AccessRequest::Write | AccessRequest::CoprocessorWrite)
    }

    /// 5-bit encoding used in the fault-code register (spec §4.2
    /// "Registers").
    pub fn code(self) -> u32 {
        match self {
            AccessRequest::MoveTranslated => 0,
            AccessRequest::CoprocessorWrite => 1,
            AccessRequest::CoprocessorFetch => 2,
            AccessRequest::InterlockedRead => 3,
            AccessRequest::AddressFetch => 4,
            AccessRequest::OperandFetch => 5,
            AccessRequest::Write => 6,
            AccessRequest::InstructionFetch => 7,
            AccessRequest::InstructionFetchAfterDiscontinuity => 8,
        }
    }
}

/// Per-level access rights encoded in a segment descriptor's 8-bit
/// access-control field, 2 bits per level (spec §4.2 "Contract").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRight {
    NoAccess,
    ReadOnly,
    ReadExecute,
    ReadWrite,
}

impl AccessRight {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => AccessRight::NoAccess,
            1 => AccessRight::ReadOnly,
            2 => AccessRight::ReadExecute,
            _ => AccessRight::ReadWrite,
        }
    }

    pub fn permits(self, access: AccessRequest) -> bool {
        match self {
            AccessRight::NoAccess => false,
            AccessRight::ReadOnly => !access.is_write(),
            AccessRight::ReadExecute => {
                matches!(access, AccessRequest::InstructionFetch | AccessRequest::InstructionFetchAfterDiscontinuity)
                    || !access.is_write()
            }
            AccessRight::ReadWrite => true,
        }
    }
}

/// Extracts the per-level 2-bit field out of an 8-bit access-control byte
/// (spec §4.2: "8-bit access-control fields ... 2 bits of {...} per
/// level").
pub fn access_right_for_level(access_control: u8, level: Level) -> AccessRight {
    let shift = (level as u32) * 2;
    AccessRight::from_bits((access_control >> shift) as u8)
}

/// Virtual address layout (spec §4.2 "Virtual address layout"): 2 bits
/// section, 13 bits segment (SSL), 17 bits in-segment offset (SOT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub section: u8,
    pub ssl: u16,
    pub sot: u32,
}

impl VirtualAddress {
    pub fn decode(va: u32) -> Self {
        VirtualAddress {
            section: ((va >> 30) & 0b11) as u8,
            ssl: ((va >> 17) & 0x1fff) as u16,
            sot: va & 0x1_ffff,
        }
    }
}

/// Fault-code register encoding (spec §4.2 "Registers": "{access-request:5,
/// current-mode:2, fault-kind:5}").
pub fn encode_fault_code(access: AccessRequest, level: Level, fault: TranslationFault) -> u32 {
    let kind = match fault {
        TranslationFault::SdtLength => 0,
        TranslationFault::SegmentNotPresent => 1,
        TranslationFault::PageNotPresent => 2,
        TranslationFault::InvalidSegmentDescriptor => 3,
        TranslationFault::IndirectTooDeep => 4,
        TranslationFault::AccessDenied => 5,
        TranslationFault::SegmentOffsetOutOfRange => 6,
    };
    (access.code() << 7) | ((level as u32) << 5) | kind
}

/// Page size, configurable per spec §4.2 ("the split depends on configured
/// page size (2K / 4K / 8K)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    Size2K,
    Size4K,
    Size8K,
}

impl PageSize {
    pub fn offset_bits(self) -> u32 {
        match self {
            PageSize::Size2K => 11,
            PageSize::Size4K => 12,
            PageSize::Size8K => 13,
        }
    }
}

/// Shared MMU register file (spec §4.2 "Registers"), common to both
/// generations.
#[derive(Debug, Clone, Copy, Default)]
pub struct MmuRegisters {
    pub fault_code: u32,
    pub fault_address: u32,
    pub configuration: u32,
    pub virtual_address_latch: u32,
    pub section_ram_a: u32,
    pub section_ram_b: u32,
    pub version: u8,
}

/// A two-word segment descriptor (spec §4.2 "Walk" step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub present: bool,
    pub paged: bool,
    pub address: u32,
    pub max_offset: u32,
    pub access_control: u8,
}

impl SegmentDescriptor {
    /// Mirrors the original's packed two-word segment descriptor format: a
    /// base/limit word followed by a flags+access-control word.
    pub fn decode(word0: u32, word1: u32) -> Self {
        SegmentDescriptor {
            present: word1 & 0x8000_0000 != 0,
            paged: word1 & 0x4000_0000 != 0,
            address: word0,
            max_offset: word1 & 0x00ff_ffff,
            access_control: (word1 >> 24) as u8 & 0xff,
        }
    }
}

/// A page descriptor (spec §4.2 "Walk" step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDescriptor {
    pub present: bool,
    pub indirect: bool,
    pub modified: bool,
    pub referenced: bool,
    pub addr: u32,
}

impl PageDescriptor {
    pub fn decode(word: u32) -> Self {
        PageDescriptor {
            present: word & 0x8000_0000 != 0,
            indirect: word & 0x4000_0000 != 0,
            modified: word & 0x2000_0000 != 0,
            referenced: word & 0x1000_0000 != 0,
            addr: word & 0x00ff_ffff,
        }
    }

    pub fn encode(self) -> u32 {
        (if self.present { 0x8000_0000 } else { 0 })
            | (if self.indirect { 0x4000_0000 } else { 0 })
            | (if self.modified { 0x2000_0000 } else { 0 })
            | (if self.referenced { 0x1000_0000 } else { 0 })
            | (self.addr & 0x00ff_ffff)
    }
}

pub const MAX_INDIRECT_CHAIN: u32 = 3;

/// Translates a virtual address to a physical one (spec §4.2 "Contract"),
/// implemented once per hardware generation since the PD cache structure
/// (direct-mapped vs. fully-associative with context tags) differs.
pub trait Mmu {
    fn translate(&mut self, va: u32, access: AccessRequest, level: Level, bus: &mut Bus) -> Result<u32, Fault>;

    fn registers(&self) -> MmuRegisters;

    /// Whole-cache flush (spec §4.2 "Caches": "Flushes: whole-cache by
    /// writing to a flush register").
    fn flush_all(&mut self);

    /// Single-entry flush by virtual address (spec §4.2 "Caches").
    fn flush_entry(&mut self, va: u32);
}
