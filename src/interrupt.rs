//! Interrupt controller: per-source IPL/vector table and priority sampling
//! (spec §4.4, SPEC_FULL.md §C.7 "Bus-timeout/parity/DMA interrupt sources").
//!
//! The CPU consults [`InterruptController::pending_above`] exactly once per
//! `step()` (spec §5 "Interrupt sampling happens exactly once per step").

/// Every interrupt source the original's vector table (`3b2_defs.h`)
/// enumerates, beyond the clock/CIO pair spec.md calls out by name
/// (SPEC_FULL.md §C.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    SanityWatchdog,
    ClockTick,
    BusTimeout,
    ParityError,
    Dma0,
    Dma1,
    Dma2,
    Uart,
    Cio(u8),
}

/// Fixed IPL/vector for every source except CIO, which negotiates both at
/// sysgen time (spec §4.4: "for CIO devices, runtime-negotiated values
/// stored in a per-slot table").
fn fixed_ipl_vector(source: Source) -> Option<(u32, u16)> {
    match source {
        Source::SanityWatchdog => Some((15, 0)), // NMI: vector 0 regardless of source.
        Source::ClockTick => Some((15, 0x4a)),
        Source::BusTimeout => Some((14, 0x48)),
        Source::ParityError => Some((14, 0x46)),
        Source::Dma0 => Some((11, 0x50)),
        Source::Dma1 => Some((11, 0x52)),
        Source::Dma2 => Some((11, 0x54)),
        Source::Uart => Some((12, 0x5a)),
        Source::Cio(_) => None,
    }
}

/// Per-slot negotiated IPL/vector for CIO cards (spec §4.5 "negotiated IPL
/// and vector").
#[derive(Debug, Clone, Copy, Default)]
pub struct CioSlot {
    pub ipl: u32,
    pub vector: u16,
}

const CIO_SLOT_COUNT: usize = 12;

pub struct InterruptController {
    pending: Vec<Source>,
    cio_slots: [CioSlot; CIO_SLOT_COUNT],
}

impl InterruptController {
    pub fn new() -> Self {
        InterruptController { pending: Vec::new(), cio_slots: [CioSlot::default(); CIO_SLOT_COUNT] }
    }

    pub fn configure_cio_slot(&mut self, slot: u8, ipl: u32, vector: u16) {
        if let Some(entry) = self.cio_slots.get_mut(slot as usize) {
            *entry = CioSlot { ipl, vector };
        }
    }

    pub fn raise(&mut self, source: Source) {
        if !self.pending.contains(&source) {
            self.pending.push(source);
        }
    }

    pub fn clear(&mut self, source: Source) {
        self.pending.retain(|&s| s != source);
    }

    fn ipl_vector(&self, source: Source) -> (u32, u16) {
        match fixed_ipl_vector(source) {
            Some(pair) => pair,
            None => match source {
                Source::Cio(slot) => {
                    let entry = self.cio_slots[(slot as usize) % CIO_SLOT_COUNT];
                    (entry.ipl, entry.vector)
                }
                _ => (0, 0),
            },
        }
    }

    /// The NMI source (the sanity watchdog) always wins regardless of IPL
    /// comparison and always delivers vector 0 (spec §4.4/SPEC_FULL.md
    /// "NMI special-case (vector 0 regardless of source)").
    pub fn pending_above(&mut self, current_ipl: u32) -> Option<(u32, u16)> {
        if self.pending.contains(&Source::SanityWatchdog) {
            self.clear(Source::SanityWatchdog);
            return Some((15, 0));
        }

        let best = self
            .pending
            .iter()
            .copied()
            .map(|s| (s, self.ipl_vector(s)))
            .filter(|&(_, (ipl, _))| ipl > current_ipl)
            .max_by_key(|&(_, (ipl, _))| ipl);

        if let Some((source, (ipl, vector))) = best {
            self.clear(source);
            Some((ipl, vector))
        } else {
            None
        }
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_ipl_wins_among_pending_sources() {
        let mut ctrl = InterruptController::new();
        ctrl.raise(Source::Dma0);
        ctrl.raise(Source::BusTimeout);
        let (ipl, vector) = ctrl.pending_above(0).unwrap();
        assert_eq!(ipl, 14);
        assert_eq!(vector, 0x48);
    }

    #[test]
    fn nothing_above_current_ipl_yields_none() {
        let mut ctrl = InterruptController::new();
        ctrl.raise(Source::Dma0);
        assert_eq!(ctrl.pending_above(11), None);
    }

    #[test]
    fn watchdog_is_nmi_and_always_vector_zero() {
        let mut ctrl = InterruptController::new();
        ctrl.raise(Source::SanityWatchdog);
        ctrl.raise(Source::ClockTick);
        assert_eq!(ctrl.pending_above(15), Some((15, 0)));
    }

    #[test]
    fn cio_slot_uses_negotiated_ipl_and_vector() {
        let mut ctrl = InterruptController::new();
        ctrl.configure_cio_slot(2, 9, 0x90);
        ctrl.raise(Source::Cio(2));
        assert_eq!(ctrl.pending_above(0), Some((9, 0x90)));
    }
}
