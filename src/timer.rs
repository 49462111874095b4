//! Three-channel 8253/82C54-style interval timer (spec §4.4).
//!
//! Counter 0 is the sanity watchdog, counter 1 the 100 Hz system interval
//! timer, counter 2 the bus-timeout counter. All three share the same
//! control-register protocol (spec §4.4 "mode register selects one of
//! {latch-read, LSB, MSB, LSB-then-MSB} access plus a counting mode");
//! only the underflow action differs per channel, handled by
//! [`TimerUnit::advance`]'s caller via the returned [`TimerEvent`] set.

/// Which byte a `LSB-then-MSB` access expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessPhase {
    Lsb,
    Msb,
}

/// Counter access mode (spec §4.4): which bytes of the 16-bit divider a
/// read/write touches, and in what order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    LatchRead,
    LsbOnly,
    MsbOnly,
    LsbThenMsb,
}

impl AccessMode {
    fn decode(bits: u8) -> Self {
        match bits & 0x3 {
            0 => AccessMode::LatchRead,
            1 => AccessMode::LsbOnly,
            2 => AccessMode::MsbOnly,
            _ => AccessMode::LsbThenMsb,
        }
    }
}

/// One 8253-style channel: a 16-bit down-counter, its reload value, and the
/// access-phase bookkeeping for `LsbThenMsb` mode.
pub struct Channel {
    pub counting_mode: u8,
    access_mode: AccessMode,
    phase: AccessPhase,
    reload: u16,
    count: u16,
    /// Disarmed until the divider has been fully written (spec §4.4:
    /// "resets the counter to all-ones and disarms it until the divider
    /// has been fully written").
    armed: bool,
    latched: Option<u16>,
}

impl Channel {
    fn new() -> Self {
        Channel {
            counting_mode: 0,
            access_mode: AccessMode::LsbThenMsb,
            phase: AccessPhase::Lsb,
            reload: 0xffff,
            count: 0xffff,
            armed: false,
            latched: None,
        }
    }

    pub fn write_control(&mut self, control: u8) {
        self.access_mode = AccessMode::decode(control >> 4);
        self.counting_mode = (control >> 1) & 0x7;
        self.phase = AccessPhase::Lsb;
        self.count = 0xffff;
        self.armed = false;
    }

    /// Writes one byte of the divider, per the channel's access mode.
    /// Returns true once the divider is fully written and the channel
    /// becomes armed.
    pub fn write_data(&mut self, byte: u8) -> bool {
        match self.access_mode {
            AccessMode::LsbOnly => {
                self.reload = (self.reload & 0xff00) | byte as u16;
                self.arm();
                true
            }
            AccessMode::MsbOnly => {
                self.reload = (self.reload & 0x00ff) | ((byte as u16) << 8);
                self.arm();
                true
            }
            AccessMode::LsbThenMsb => match self.phase {
                AccessPhase::Lsb => {
                    self.reload = (self.reload & 0xff00) | byte as u16;
                    self.phase = AccessPhase::Msb;
                    false
                }
                AccessPhase::Msb => {
                    self.reload = (self.reload & 0x00ff) | ((byte as u16) << 8);
                    self.phase = AccessPhase::Lsb;
                    self.arm();
                    true
                }
            },
            AccessMode::LatchRead => false,
        }
    }

    fn arm(&mut self) {
        self.count = self.reload;
        self.armed = true;
    }

    /// Latches the current count for a subsequent `read_data`. Latched
    /// values are consumed in a fixed LSB-then-MSB order (spec §4.4:
    /// "Reads of the latched value ... are consumed in a fixed order").
    pub fn latch(&mut self) {
        if self.latched.is_none() {
            self.latched = Some(self.count);
        }
    }

    pub fn read_data(&mut self) -> u8 {
        let value = self.latched.unwrap_or(self.count);
        match self.phase {
            AccessPhase::Lsb => {
                self.phase = AccessPhase::Msb;
                value as u8
            }
            AccessPhase::Msb => {
                self.phase = AccessPhase::Lsb;
                self.latched = None;
                (value >> 8) as u8
            }
        }
    }

    /// Advances the counter by `ticks`, reporting whether it underflowed.
    /// Disarmed channels never count (spec §4.4).
    fn tick(&mut self, ticks: u32) -> bool {
        if !self.armed {
            return false;
        }
        let mut underflowed = false;
        let mut remaining = ticks;
        while remaining > 0 {
            if self.count == 0 {
                self.count = self.reload;
                underflowed = true;
            } else {
                self.count -= 1;
            }
            remaining -= 1;
        }
        underflowed
    }
}

/// Events produced by advancing the timer by one instruction (spec §4.4
/// per-channel underflow actions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerEvent {
    pub watchdog_timeout: bool,
    pub clock_tick: bool,
    pub bus_timeout: bool,
}

/// Target rate for channel 1 (spec §4.4: "target rate 100 Hz"). Channels 0
/// and 2 are plain step counters per spec §9 "Timer accuracy" guidance.
pub const CLOCK_RATE_HZ: u32 = 100;

pub struct TimerUnit {
    pub watchdog: Channel,
    pub clock: Channel,
    pub bus_timeout: Channel,
    /// Whether the bus-timeout counter is currently armed by an in-flight
    /// bus transaction (spec §4.4: "started on each bus transaction,
    /// canceled on response").
    pub bus_transaction_in_flight: bool,
}

impl TimerUnit {
    pub fn new() -> Self {
        TimerUnit {
            watchdog: Channel::new(),
            clock: Channel::new(),
            bus_timeout: Channel::new(),
            bus_transaction_in_flight: false,
        }
    }

    pub fn channel_mut(&mut self, index: u8) -> &mut Channel {
        match index & 0x3 {
            0 => &mut self.watchdog,
            1 => &mut self.clock,
            _ => &mut self.bus_timeout,
        }
    }

    /// Advances the watchdog and clock counters by one host step (spec §9:
    /// "Counters 0 and 2 may be implemented as integer-step counters that
    /// advance between instructions"). The bus-timeout counter only ticks
    /// while a transaction is outstanding.
    pub fn advance(&mut self, ticks: u32) -> TimerEvent {
        let mut event = TimerEvent::default();
        if self.watchdog.tick(ticks) {
            event.watchdog_timeout = true;
        }
        if self.clock.tick(ticks) {
            event.clock_tick = true;
        }
        if self.bus_transaction_in_flight && self.bus_timeout.tick(ticks) {
            event.bus_timeout = true;
        }
        event
    }

    pub fn start_bus_transaction(&mut self) {
        self.bus_transaction_in_flight = true;
    }

    pub fn cancel_bus_transaction(&mut self) {
        self.bus_transaction_in_flight = false;
    }
}

impl Default for TimerUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_channel_underflows_after_reload_ticks() {
        let mut timer = TimerUnit::new();
        timer.clock.write_control(0b0011_0000); // LsbThenMsb, mode 0
        timer.clock.write_data(0x03);
        timer.clock.write_data(0x00);
        let event = timer.advance(3);
        assert!(event.clock_tick);
    }

    #[test]
    fn disarmed_channel_never_ticks() {
        let mut timer = TimerUnit::new();
        let event = timer.advance(1000);
        assert!(!event.clock_tick);
        assert!(!event.watchdog_timeout);
    }

    #[test]
    fn bus_timeout_only_counts_in_flight() {
        let mut timer = TimerUnit::new();
        timer.bus_timeout.write_control(0b0001_0000); // LsbOnly
        timer.bus_timeout.write_data(0x02);
        let event = timer.advance(5);
        assert!(!event.bus_timeout);
        timer.start_bus_transaction();
        let event = timer.advance(2);
        assert!(event.bus_timeout);
    }
}
