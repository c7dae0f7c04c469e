//! Fragmentation of logical packets into USB report fragments and
//! reassembly of inbound fragments back into logical packets.
//!
//! Every fragment starts with a 5-byte header:
//! `[report-id][size][packet-index][fragment-count][fragment-index]`
//! followed by up to 56 payload bytes. The declared size field counts the
//! carried payload bytes plus a constant offset of 3.

use crate::constants::{
    FRAGMENT_HEADER_SIZE, FRAGMENT_SIZE_OFFSET, FRAME_END, FRAME_START, MAX_FRAGMENT_PAYLOAD,
    MAX_PACKET_SIZE, MIN_FRAME_SIZE, READ_REPORT_ID, WRITE_REPORT_ID,
};
use crate::error::TqError;
use bytes::Bytes;
use tracing::debug;

/// Split a serialized frame into outbound report fragments.
///
/// Produces `ceil(len / 56)` fragments with 1-based indices, all carrying
/// the same packet index and total count. Each returned buffer is one
/// complete bulk transfer.
pub fn fragment(frame: &[u8], packet_index: u8) -> Result<Vec<Vec<u8>>, TqError> {
    if frame.is_empty() || frame.len() > MAX_PACKET_SIZE {
        return Err(TqError::InvalidFrameSize(frame.len()));
    }
    let count = frame.len().div_ceil(MAX_FRAGMENT_PAYLOAD);
    let mut fragments = Vec::with_capacity(count);
    for (i, chunk) in frame.chunks(MAX_FRAGMENT_PAYLOAD).enumerate() {
        let mut buf = Vec::with_capacity(FRAGMENT_HEADER_SIZE + chunk.len());
        buf.push(WRITE_REPORT_ID);
        buf.push((chunk.len() + FRAGMENT_SIZE_OFFSET) as u8);
        buf.push(packet_index);
        buf.push(count as u8);
        buf.push((i + 1) as u8);
        buf.extend_from_slice(chunk);
        fragments.push(buf);
    }
    Ok(fragments)
}

/// Incremental reassembly state for one receive loop.
///
/// Fragments that fail validation or break the expected sequence are
/// discarded without surfacing an error; assembly resynchronizes on the
/// next valid fragment with index 1.
#[derive(Debug, Default)]
pub struct Reassembler {
    packet_index: u8,
    /// Expected total fragment count; 0 means no packet in progress.
    fragment_count: u8,
    last_fragment: u8,
    buf: Vec<u8>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw inbound transfer.
    ///
    /// Returns the interior of a completed frame (start/end markers
    /// validated and stripped) once the final fragment arrives.
    pub fn push(&mut self, transfer: &[u8]) -> Option<Bytes> {
        if transfer.len() <= FRAGMENT_HEADER_SIZE {
            return None;
        }
        if transfer[0] != READ_REPORT_ID {
            return None;
        }
        let declared = transfer[1] as usize;
        if declared < FRAGMENT_SIZE_OFFSET || declared + 2 > transfer.len() {
            return None;
        }
        let packet_index = transfer[2];
        let count = transfer[3];
        let index = transfer[4];

        if self.fragment_count != 0 {
            if packet_index == self.packet_index
                && count == self.fragment_count
                && index == self.last_fragment + 1
            {
                self.last_fragment = index;
            } else {
                debug!(
                    packet_index,
                    index, "out-of-sequence fragment, dropping packet in progress"
                );
                self.fragment_count = 0;
            }
        }
        if self.fragment_count == 0 {
            if count == 0 || index != 1 {
                return None;
            }
            self.packet_index = packet_index;
            self.fragment_count = count;
            self.last_fragment = 1;
            self.buf.clear();
        }

        let payload_len = declared - FRAGMENT_SIZE_OFFSET;
        if self.buf.len() + payload_len > MAX_PACKET_SIZE {
            debug!("reassembly buffer overflow, dropping packet in progress");
            self.fragment_count = 0;
            return None;
        }
        self.buf
            .extend_from_slice(&transfer[FRAGMENT_HEADER_SIZE..FRAGMENT_HEADER_SIZE + payload_len]);

        if index == self.fragment_count && self.buf.len() >= MIN_FRAME_SIZE {
            self.fragment_count = 0;
            let end = self.buf.len() - 2;
            if self.buf[..2] == FRAME_START.to_le_bytes() && self.buf[end..] == FRAME_END.to_le_bytes()
            {
                return Some(Bytes::copy_from_slice(&self.buf[2..end]));
            }
            debug!("frame marker mismatch, dropping packet");
        }
        None
    }
}
