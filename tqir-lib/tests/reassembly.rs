//! Tests for inbound fragment reassembly and its resynchronization behavior

mod common;

use common::*;

fn ack_frame(cmd_type: CmdType, cmd_id: u8, state: u8) -> Frame {
    Frame {
        cmd_type,
        cmd_id,
        payload: Bytes::copy_from_slice(&[state]),
    }
}

fn data_frame(payload_len: usize) -> Frame {
    let payload: Vec<u8> = (0..payload_len).map(|i| i as u8).collect();
    Frame {
        cmd_type: CmdType::Data,
        cmd_id: 9,
        payload: Bytes::from(payload),
    }
}

#[test]
fn test_single_fragment_frame_reassembles() {
    let frame = ack_frame(CmdType::SendMode, 5, 9);
    let fragments = inbound_fragments(&frame, 1);
    assert_eq!(fragments.len(), 1);

    let mut reassembler = Reassembler::new();
    let interior = reassembler
        .push(&fragments[0])
        .expect("complete frame expected");
    let parsed = Frame::try_from(interior).expect("frame should parse");
    assert_eq!(parsed, frame);
}

#[test]
fn test_multi_fragment_frame_reassembles() {
    let frame = data_frame(300);
    let fragments = inbound_fragments(&frame, 4);
    assert!(fragments.len() > 1);

    let mut reassembler = Reassembler::new();
    let mut delivered = None;
    for frag in &fragments {
        if let Some(interior) = reassembler.push(frag) {
            assert!(delivered.is_none(), "only one delivery per packet");
            delivered = Some(interior);
        }
    }
    let parsed = Frame::try_from(delivered.expect("frame expected")).expect("frame should parse");
    assert_eq!(parsed, frame);
}

#[test]
fn test_out_of_order_fragments_drop_packet_then_recover() {
    let frame = data_frame(300);
    let mut fragments = inbound_fragments(&frame, 4);
    assert!(fragments.len() >= 3);
    fragments.swap(1, 2);

    let mut reassembler = Reassembler::new();
    for frag in &fragments {
        assert!(
            reassembler.push(frag).is_none(),
            "corrupted packet must deliver nothing"
        );
    }

    // A subsequent well-formed packet still reassembles.
    let next = data_frame(120);
    let mut delivered = None;
    for frag in &inbound_fragments(&next, 5) {
        if let Some(interior) = reassembler.push(frag) {
            delivered = Some(interior);
        }
    }
    let parsed = Frame::try_from(delivered.expect("recovery frame expected")).unwrap();
    assert_eq!(parsed, next);
}

#[test]
fn test_wrong_packet_index_mid_stream_drops_packet() {
    let frame = data_frame(300);
    let mut fragments = inbound_fragments(&frame, 4);
    fragments[2][2] = 9; // packet index changes mid-assembly

    let mut reassembler = Reassembler::new();
    for frag in &fragments {
        assert!(reassembler.push(frag).is_none());
    }
}

#[test]
fn test_truncated_fragment_breaks_sequence() {
    let frame = data_frame(300);
    let mut fragments = inbound_fragments(&frame, 4);
    // Second fragment arrives truncated below the header size; it is
    // discarded outright and the gap then kills the packet.
    fragments[1].truncate(4);

    let mut reassembler = Reassembler::new();
    for frag in &fragments {
        assert!(reassembler.push(frag).is_none());
    }

    let next = data_frame(40);
    let mut delivered = None;
    for frag in &inbound_fragments(&next, 5) {
        if let Some(interior) = reassembler.push(frag) {
            delivered = Some(interior);
        }
    }
    assert_eq!(Frame::try_from(delivered.unwrap()).unwrap(), next);
}

#[test]
fn test_wrong_report_id_is_ignored() {
    let frame = ack_frame(CmdType::SendMode, 1, 9);
    let mut fragments = fragment(&frame.encode(), 1).unwrap();
    // Still carries the outbound report id 2.
    let mut reassembler = Reassembler::new();
    assert!(reassembler.push(&fragments[0]).is_none());

    fragments[0][0] = 1;
    assert!(reassembler.push(&fragments[0]).is_some());
}

#[test]
fn test_declared_size_exceeding_transfer_is_ignored() {
    let frame = ack_frame(CmdType::SendMode, 1, 9);
    let mut fragments = inbound_fragments(&frame, 1);
    fragments[0][1] = 60; // claims more payload than the transfer holds

    let mut reassembler = Reassembler::new();
    assert!(reassembler.push(&fragments[0]).is_none());
}

#[test]
fn test_marker_mismatch_is_dropped_silently() {
    let mut bogus = ack_frame(CmdType::Output, 3, 9).encode();
    let last = bogus.len() - 1;
    bogus[last] = 0x00; // break the end marker
    let fragments = as_inbound(fragment(&bogus, 2).unwrap());

    let mut reassembler = Reassembler::new();
    assert!(reassembler.push(&fragments[0]).is_none());

    // The reassembler is immediately reusable.
    let good = inbound_fragments(&ack_frame(CmdType::Output, 4, 9), 3);
    assert!(reassembler.push(&good[0]).is_some());
}

#[test]
fn test_continuation_without_lead_fragment_is_ignored() {
    let frame = data_frame(300);
    let fragments = inbound_fragments(&frame, 4);

    let mut reassembler = Reassembler::new();
    for frag in &fragments[1..] {
        assert!(
            reassembler.push(frag).is_none(),
            "continuation fragments without a lead must be discarded"
        );
    }
}

#[test]
fn test_interleaved_garbage_transfer_does_not_corrupt_packet() {
    let frame = data_frame(150);
    let fragments = inbound_fragments(&frame, 2);
    assert_eq!(fragments.len(), 3);

    let mut reassembler = Reassembler::new();
    assert!(reassembler.push(&fragments[0]).is_none());
    // A malformed transfer (bad report id) in the middle is invisible.
    assert!(reassembler.push(&[0x42, 0x09, 0x01, 0x01, 0x01, 0xFF]).is_none());
    assert!(reassembler.push(&fragments[1]).is_none());
    let interior = reassembler.push(&fragments[2]).expect("frame expected");
    assert_eq!(Frame::try_from(interior).unwrap(), frame);
}
