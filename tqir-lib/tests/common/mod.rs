#![allow(dead_code)]

pub use bytes::Bytes;
pub use tqir_lib::TqError;
pub use tqir_lib::fragment::{Reassembler, fragment};
pub use tqir_lib::frame::{CmdType, DeviceMode, Frame, VersionInfo};
pub use tqir_lib::nec;
pub use tqir_lib::signal::{Pulse, PulseTrain};

pub fn hex_to_bytes(hex: &str) -> Bytes {
    Bytes::from(hex::decode(hex).expect("Invalid hex string"))
}

/// Rewrite outbound fragments as the device would send them back: the read
/// direction uses report id 1 instead of 2.
pub fn as_inbound(fragments: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
    fragments
        .into_iter()
        .map(|mut frag| {
            frag[0] = 1;
            frag
        })
        .collect()
}

/// Fragment an encoded frame and rewrite it for the inbound direction.
pub fn inbound_fragments(frame: &Frame, packet_index: u8) -> Vec<Vec<u8>> {
    as_inbound(fragment(&frame.encode(), packet_index).expect("fragmentation failed"))
}

/// Build an alternating pulse train from (len, mark) pairs.
pub fn train_of(pulses: &[(u32, bool)]) -> PulseTrain {
    let mut train = PulseTrain::new();
    for &(len, mark) in pulses {
        train.push(len, mark);
    }
    train
}
