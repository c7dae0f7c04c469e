//! Tolerant encoder/decoder for the NEC infrared protocol.

use crate::signal::{Pulse, PulseTrain};

/// One NEC time unit (562.5 µs) in internal units of 0.5 µs.
pub const NEC_UNIT: u32 = 1125;

/// Matching tolerance: expected durations may deviate by one fifth (20%).
const TOLERANCE_DIVISOR: u32 = 5;

/// A successfully decoded NEC signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NecCode {
    /// The 16-bit IR code.
    pub code: u16,
    /// The 32-bit word accumulated off the air, before undoing the
    /// byte-swap/complement transmission transform.
    pub raw: u32,
}

/// Build the 32-bit transmission word for a 16-bit code.
///
/// NEC sends address, inverted address, command and inverted command; on the
/// wire that is the little-endian word `[hi, !hi, lo, !lo]` shifted out
/// least-significant bit first.
pub fn transmission_word(code: u16) -> u32 {
    let hi = (code >> 8) as u8;
    let lo = code as u8;
    u32::from_le_bytes([hi, !hi, lo, !lo])
}

/// Encode a 16-bit code into an NEC pulse train.
pub fn encode(code: u16) -> PulseTrain {
    let mut train = PulseTrain::new();
    train.push(16 * NEC_UNIT, true);
    train.push(8 * NEC_UNIT, false);
    let mut word = transmission_word(code);
    for _ in 0..32 {
        train.push(NEC_UNIT, true);
        train.push(if word & 1 != 0 { 3 * NEC_UNIT } else { NEC_UNIT }, false);
        word >>= 1;
    }
    train.push(NEC_UNIT, true);
    train.push(72 * NEC_UNIT, false);
    train
}

/// Encode a 16-bit code straight into device tick bytes, the payload the
/// transceiver actually transmits.
pub fn encode_to_device_ticks(code: u16) -> Vec<u8> {
    encode(code).to_device_ticks()
}

fn in_range(pulse: &Pulse, nominal: u32, mark: bool) -> bool {
    let slack = nominal / TOLERANCE_DIVISOR;
    pulse.mark == mark && pulse.len >= nominal - slack && pulse.len <= nominal + slack
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    LeadMark,
    LeadSpace,
    BitMark,
    BitSpace,
}

/// Scan a pulse train for an NEC signal.
///
/// A mismatch anywhere before the final bit sends the scanner back to lead
/// mark search one position past the originally matched lead mark, so
/// overlapping candidate headers are not missed. `None` means no decodable
/// NEC signal was present, which is a normal outcome for captured IR.
pub fn decode(train: &PulseTrain) -> Option<NecCode> {
    let pulses = train.pulses();
    let mut state = Scan::LeadMark;
    let mut lead_offset = 0usize;
    let mut raw: u32 = 0;
    let mut bits: u32 = 0;

    let mut i = 0usize;
    while i < pulses.len() {
        let pulse = &pulses[i];
        match state {
            Scan::LeadMark => {
                if in_range(pulse, 16 * NEC_UNIT, true) {
                    state = Scan::LeadSpace;
                    lead_offset = i;
                }
            }
            Scan::LeadSpace => {
                if in_range(pulse, 8 * NEC_UNIT, false) {
                    state = Scan::BitMark;
                    raw = 0;
                    bits = 0;
                } else {
                    state = Scan::LeadMark;
                    i = lead_offset + 1;
                    continue;
                }
            }
            Scan::BitMark => {
                if in_range(pulse, NEC_UNIT, true) {
                    if bits >= 32 {
                        let code = (((raw & 0xFF) << 8) | ((raw >> 16) & 0xFF)) as u16;
                        return Some(NecCode { code, raw });
                    }
                    state = Scan::BitSpace;
                } else {
                    state = Scan::LeadMark;
                    i = lead_offset + 1;
                    continue;
                }
            }
            Scan::BitSpace => {
                if in_range(pulse, NEC_UNIT, false) {
                    raw >>= 1;
                    bits += 1;
                    state = Scan::BitMark;
                } else if in_range(pulse, 3 * NEC_UNIT, false) {
                    raw = (raw >> 1) | 0x8000_0000;
                    bits += 1;
                    state = Scan::BitMark;
                } else {
                    state = Scan::LeadMark;
                    i = lead_offset + 1;
                    continue;
                }
            }
        }
        i += 1;
    }
    None
}
