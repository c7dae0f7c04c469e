//! Tests for logical frame serialization and parsing

mod common;

use common::*;

#[test]
fn test_command_frame_wire_layout() {
    let encoded = Frame::command(CmdType::Version, 0x2A).encode();
    // "ST" marker, type, id, "EN" marker.
    assert_eq!(encoded, vec![0x53, 0x54, b'V', 0x2A, 0x45, 0x4E]);
}

#[test]
fn test_ir_output_frame_wire_layout() {
    let pulses = [0x90, 0x10, 0x90];
    let encoded = Frame::ir_output(0x11, 8, &pulses).encode();
    assert_eq!(
        encoded,
        vec![0x53, 0x54, b'D', 0x11, 0x08, 0x90, 0x10, 0x90, 0x45, 0x4E]
    );
}

#[test]
fn test_frame_interior_roundtrip() {
    let frame = Frame {
        cmd_type: CmdType::Output,
        cmd_id: 0x7F,
        payload: Bytes::from_static(&[9]),
    };
    let encoded = frame.encode();
    // Strip the markers the way the reassembler does before parsing.
    let interior = Bytes::copy_from_slice(&encoded[2..encoded.len() - 2]);
    assert_eq!(Frame::try_from(interior).unwrap(), frame);
}

#[test]
fn test_unknown_command_type_is_preserved() {
    let interior = hex_to_bytes("5a01");
    let frame = Frame::try_from(interior).unwrap();
    assert_eq!(frame.cmd_type, CmdType::Unknown(0x5A));
    assert_eq!(frame.cmd_id, 1);
    assert!(frame.payload.is_empty());
}

#[test]
fn test_too_short_interior_is_rejected() {
    assert!(Frame::try_from(Bytes::from_static(&[b'V'])).is_err());
    assert!(Frame::try_from(Bytes::new()).is_err());
}

#[test]
fn test_device_mode_bytes() {
    assert_eq!(DeviceMode::from(3u8), DeviceMode::Idle);
    assert_eq!(DeviceMode::from(9u8), DeviceMode::Send);
    assert_eq!(DeviceMode::from(19u8), DeviceMode::Receive);
    assert_eq!(DeviceMode::from(0u8), DeviceMode::Unknown(0));
    assert_eq!(DeviceMode::default(), DeviceMode::Unknown(0));
}

#[test]
fn test_version_info_parse() {
    let mut payload = vec![b'v', 2];
    payload.extend_from_slice(&[b'g'; 36]);
    payload.push(9);
    let version = VersionInfo::parse(&payload).unwrap();
    assert_eq!(version.version_char, b'v');
    assert_eq!(version.version_int, 2);
    assert_eq!(version.guid, [b'g'; 36]);
    assert_eq!(version.state, DeviceMode::Send);
}

#[test]
fn test_version_info_wrong_length_is_rejected() {
    assert!(VersionInfo::parse(&[0u8; 38]).is_err());
    assert!(VersionInfo::parse(&[0u8; 40]).is_err());
    assert!(VersionInfo::parse(&[]).is_err());
}
