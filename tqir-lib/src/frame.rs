use crate::constants::{FRAME_END, FRAME_START, VERSION_GUID_SIZE, VERSION_PAYLOAD_SIZE};
use crate::error::TqError;
use bytes::Bytes;
use num_enum::{FromPrimitive, IntoPrimitive};

/// Command type byte of a logical frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum CmdType {
    Handshake = b'H',
    Version = b'V',
    IdleMode = b'L',
    SendMode = b'S',
    RecvMode = b'R',
    Data = b'D',
    Output = b'O',
    Cancel = b'C',

    #[num_enum(catch_all)]
    Unknown(u8) = 0,
}

/// Operating mode as reported by the device itself.
///
/// The session never assumes a transition succeeded; it only adopts the
/// state byte carried by the device's own acknowledgments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum DeviceMode {
    Idle = 3,
    Send = 9,
    Receive = 19,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl Default for DeviceMode {
    fn default() -> Self {
        DeviceMode::Unknown(0)
    }
}

/// One logical application-layer packet.
///
/// Wire layout: `[start:2]["type":1]["id":1][payload..][end:2]`, with the
/// 16-bit start/end markers transmitted little-endian. `encode()` produces
/// the full marked buffer; `TryFrom<Bytes>` parses the interior that the
/// reassembler delivers with the markers already stripped and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub cmd_type: CmdType,
    pub cmd_id: u8,
    pub payload: Bytes,
}

impl Frame {
    /// Build a plain command frame (empty payload).
    pub fn command(cmd_type: CmdType, cmd_id: u8) -> Self {
        Frame {
            cmd_type,
            cmd_id,
            payload: Bytes::new(),
        }
    }

    /// Build an IR-output frame: payload is the frequency table id followed
    /// by the device-format pulse bytes.
    pub fn ir_output(cmd_id: u8, freq_id: u8, pulses: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(1 + pulses.len());
        payload.push(freq_id);
        payload.extend_from_slice(pulses);
        Frame {
            cmd_type: CmdType::Data,
            cmd_id,
            payload: Bytes::from(payload),
        }
    }

    /// Serialize the frame including start/end markers.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(6 + self.payload.len());
        out.extend_from_slice(&FRAME_START.to_le_bytes());
        out.push(self.cmd_type.into());
        out.push(self.cmd_id);
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&FRAME_END.to_le_bytes());
        out
    }
}

impl TryFrom<Bytes> for Frame {
    type Error = TqError;

    fn try_from(mut bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() < 2 {
            return Err(TqError::Protocol(format!(
                "frame interior too short: {} bytes",
                bytes.len()
            )));
        }
        let cmd_type = CmdType::from_primitive(bytes[0]);
        let cmd_id = bytes[1];
        let payload = bytes.split_off(2);
        Ok(Frame {
            cmd_type,
            cmd_id,
            payload,
        })
    }
}

/// Payload of a Version reply frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version_char: u8,
    pub version_int: u8,
    pub guid: [u8; VERSION_GUID_SIZE],
    pub state: DeviceMode,
}

impl VersionInfo {
    /// Parse the fixed-size Version reply payload.
    pub fn parse(payload: &[u8]) -> Result<Self, TqError> {
        if payload.len() != VERSION_PAYLOAD_SIZE {
            return Err(TqError::Protocol(format!(
                "version reply payload is {} bytes, expected {}",
                payload.len(),
                VERSION_PAYLOAD_SIZE
            )));
        }
        let mut guid = [0u8; VERSION_GUID_SIZE];
        guid.copy_from_slice(&payload[2..2 + VERSION_GUID_SIZE]);
        Ok(VersionInfo {
            version_char: payload[0],
            version_int: payload[1],
            guid,
            state: DeviceMode::from_primitive(payload[2 + VERSION_GUID_SIZE]),
        })
    }
}
