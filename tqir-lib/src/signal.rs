//! The pulse-train signal model and its wire/interchange format converters.
//!
//! All durations are kept in internal units of half a microsecond, which
//! keeps every NEC timing (one NEC unit is 562.5 µs) and every device tick
//! (16 µs) an exact integer.

/// Internal duration units per microsecond.
pub const UNITS_PER_MICROSECOND: u32 = 2;

/// One device tick (16 µs) in internal units.
pub const DEVICE_TICK_UNITS: u32 = 16 * UNITS_PER_MICROSECOND;

/// Mark flag bit of a device-format byte.
pub const DEVICE_MARK_BIT: u8 = 0x80;

/// Tick-count mask of a device-format byte (max 127 ticks per byte).
pub const DEVICE_TICK_MASK: u8 = 0x7F;

/// Mark flag bit of a generic interchange value.
pub const INTERCHANGE_MARK_BIT: u32 = 0x0100_0000;

/// Magnitude mask of a generic interchange value.
pub const INTERCHANGE_MAGNITUDE_MASK: u32 = 0x00FF_FFFF;

/// Interchange unit corresponding to one microsecond.
pub const INTERCHANGE_MICROSECOND: u32 = UNITS_PER_MICROSECOND;

/// One mark (carrier on) or space (silent) phase of an IR signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    /// Duration in internal units (0.5 µs).
    pub len: u32,
    /// True for a mark, false for a space.
    pub mark: bool,
}

/// An ordered sequence of pulses with strictly alternating polarity.
///
/// The pivot representation between the device tick format, the generic
/// interchange format and the NEC codec. `push` coalesces, so a train can
/// never hold two adjacent pulses of the same polarity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PulseTrain {
    pulses: Vec<Pulse>,
}

impl PulseTrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pulse, merging it into the previous one when the polarity
    /// matches and dropping it when it is empty.
    pub fn push(&mut self, len: u32, mark: bool) {
        match self.pulses.last_mut() {
            Some(last) if last.mark == mark => last.len = last.len.saturating_add(len),
            _ if len == 0 => {}
            _ => self.pulses.push(Pulse { len, mark }),
        }
    }

    pub fn pulses(&self) -> &[Pulse] {
        &self.pulses
    }

    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    /// Decode the device's byte-per-run tick format.
    ///
    /// Each byte carries a 7-bit tick count plus a mark flag; consecutive
    /// bytes with the same flag accumulate into a single pulse.
    pub fn from_device_ticks(data: &[u8]) -> Self {
        let mut train = PulseTrain::new();
        for &b in data {
            train.push(
                u32::from(b & DEVICE_TICK_MASK) * DEVICE_TICK_UNITS,
                b & DEVICE_MARK_BIT != 0,
            );
        }
        train
    }

    /// Encode into the device tick format.
    ///
    /// Quantization keeps a running ideal and emitted time base so rounding
    /// never drifts by more than one tick over the whole train. Runs longer
    /// than 127 ticks are split into several same-polarity bytes.
    pub fn to_device_ticks(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut ideal: u64 = 0;
        let mut emitted: u64 = 0;
        for pulse in &self.pulses {
            ideal += u64::from(pulse.len);
            let mut ticks = ((ideal - emitted) / u64::from(DEVICE_TICK_UNITS)) as u32;
            emitted += u64::from(ticks) * u64::from(DEVICE_TICK_UNITS);
            let flag = if pulse.mark { DEVICE_MARK_BIT } else { 0 };
            while ticks > 0 {
                let run = ticks.min(u32::from(DEVICE_TICK_MASK));
                out.push(run as u8 | flag);
                ticks -= run;
            }
        }
        out
    }

    /// Decode the generic 32-bit interchange format.
    ///
    /// Bit 24 of each value is the mark flag, the low 24 bits are the
    /// magnitude in steps of `units_per_step` internal units (use
    /// [`INTERCHANGE_MICROSECOND`] for microsecond values).
    pub fn from_interchange(values: &[u32], units_per_step: u32) -> Self {
        let mut train = PulseTrain::new();
        for &v in values {
            train.push(
                (v & INTERCHANGE_MAGNITUDE_MASK).saturating_mul(units_per_step),
                v & INTERCHANGE_MARK_BIT != 0,
            );
        }
        train
    }

    /// Encode into the generic 32-bit interchange format.
    ///
    /// A pulse whose magnitude exceeds the 24-bit maximum is split into
    /// repeated values carrying the same polarity flag rather than clamped.
    pub fn to_interchange(&self, units_per_step: u32) -> Vec<u32> {
        let mut out = Vec::new();
        for pulse in &self.pulses {
            let flag = if pulse.mark { INTERCHANGE_MARK_BIT } else { 0 };
            let mut magnitude = pulse.len / units_per_step;
            loop {
                let chunk = magnitude.min(INTERCHANGE_MAGNITUDE_MASK);
                out.push(chunk | flag);
                magnitude -= chunk;
                if magnitude == 0 {
                    break;
                }
            }
        }
        out
    }
}
