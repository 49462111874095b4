//! Segment Descriptor Cache and Page Descriptor Cache (spec §4.2 "Caches").

use super::{PageDescriptor, SegmentDescriptor};

/// 8-entry, direct-mapped by VA bits 19-17 (spec §4.2: "SD cache is 8
/// entries, direct-mapped by bits 19-17 of VA").
pub struct SdCache {
    entries: [Option<(u16, SegmentDescriptor)>; 8],
}

impl Default for SdCache {
    fn default() -> Self {
        SdCache { entries: [None; 8] }
    }
}

impl SdCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(va: u32) -> usize {
        ((va >> 17) & 0b111) as usize
    }

    pub fn lookup(&self, va: u32, ssl: u16) -> Option<SegmentDescriptor> {
        let idx = Self::index(va);
        self.entries[idx].filter(|(tag, _)| *tag == ssl).map(|(_, sd)| sd)
    }

    pub fn install(&mut self, va: u32, ssl: u16, sd: SegmentDescriptor) {
        let idx = Self::index(va);
        self.entries[idx] = Some((ssl, sd));
    }

    pub fn flush_all(&mut self) {
        self.entries = [None; 8];
    }

    pub fn flush_entry(&mut self, va: u32) {
        self.entries[Self::index(va)] = None;
    }
}

/// One PD cache entry (spec §4.2: "tag = context-ID || relevant
/// virtual-address bits || cache flags"), plus the "U" (recently used) flag
/// that protects the most-recently-used entry from a partial flush.
#[derive(Debug, Clone, Copy)]
struct PdcEntry {
    tag: u32,
    descriptor: PageDescriptor,
    recently_used: bool,
}

/// Generation-2 PD cache: 64 entries, fully associative, tagged with a
/// context ID so multiple address spaces can coexist (spec §4.2: "PD cache
/// is 64 entries (2g MMU), tag includes context ID").
pub struct PdCacheAssoc {
    entries: Vec<PdcEntry>,
    capacity: usize,
}

impl PdCacheAssoc {
    pub fn new(capacity: usize) -> Self {
        PdCacheAssoc { entries: Vec::with_capacity(capacity), capacity }
    }

    fn tag(context_id: u8, va: u32) -> u32 {
        ((context_id as u32) << 24) | (va & 0x00ff_ffff)
    }

    pub fn lookup(&mut self, context_id: u8, va: u32) -> Option<PageDescriptor> {
        let tag = Self::tag(context_id, va);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.tag == tag) {
            entry.recently_used = true;
            Some(entry.descriptor)
        } else {
            None
        }
    }

    pub fn install(&mut self, context_id: u8, va: u32, descriptor: PageDescriptor) {
        let tag = Self::tag(context_id, va);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.tag == tag) {
            entry.descriptor = descriptor;
            entry.recently_used = true;
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(victim) = self.entries.iter().position(|e| !e.recently_used) {
                self.entries.remove(victim);
            } else {
                self.entries.remove(0);
            }
        }
        self.entries.push(PdcEntry { tag, descriptor, recently_used: true });
    }

    pub fn set_modified(&mut self, context_id: u8, va: u32) {
        let tag = Self::tag(context_id, va);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.tag == tag) {
            entry.descriptor.modified = true;
            entry.descriptor.referenced = true;
        }
    }

    /// Clears every entry not currently marked recently-used, then clears
    /// the recently-used flag itself so the next partial flush can make
    /// progress (spec §4.2 invariant: "single-entry flush never clears the
    /// most-recently-used entry").
    pub fn flush_all_but_most_recent(&mut self) {
        self.entries.retain(|e| e.recently_used);
        for e in &mut self.entries {
            e.recently_used = false;
        }
    }

    pub fn flush_entry(&mut self, context_id: u8, va: u32) {
        let tag = Self::tag(context_id, va);
        self.entries.retain(|e| e.tag != tag);
    }
}

/// Generation-1 PD cache: small, direct-mapped, no context tagging (spec
/// §4.2 describes the 2g cache; the 1st-gen MMU predates multi-context
/// support and uses a simpler direct-mapped structure, per SPEC_FULL.md's
/// "two generations" module split).
pub struct PdCacheDirect {
    entries: [Option<(u32, PageDescriptor)>; 16],
}

impl Default for PdCacheDirect {
    fn default() -> Self {
        PdCacheDirect { entries: [None; 16] }
    }
}

impl PdCacheDirect {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(va: u32) -> usize {
        ((va >> 12) & 0xf) as usize
    }

    pub fn lookup(&self, va: u32) -> Option<PageDescriptor> {
        let idx = Self::index(va);
        self.entries[idx].filter(|(tag, _)| *tag == va).map(|(_, pd)| pd)
    }

    pub fn install(&mut self, va: u32, pd: PageDescriptor) {
        let idx = Self::index(va);
        self.entries[idx] = Some((va, pd));
    }

    pub fn flush_all(&mut self) {
        self.entries = [None; 16];
    }

    pub fn flush_entry(&mut self, va: u32) {
        self.entries[Self::index(va)] = None;
    }
}
