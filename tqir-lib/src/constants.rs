// Protocol constants for the Tiqiaa Tview USB transport

/// Size of the USB report fragment header (5 bytes)
pub const FRAGMENT_HEADER_SIZE: usize = 5;

/// Maximum frame payload bytes carried by one fragment
pub const MAX_FRAGMENT_PAYLOAD: usize = 56;

/// Maximum size of a reassembled logical packet
pub const MAX_PACKET_SIZE: usize = 1024;

/// Packet index counter wraps back to 1 past this value
pub const MAX_PACKET_INDEX: u8 = 15;

/// Command id counter wraps back to 1 past this value
pub const MAX_CMD_ID: u8 = 0x7F;

/// Report id carried by outbound (host to device) fragments
pub const WRITE_REPORT_ID: u8 = 2;

/// Report id carried by inbound (device to host) fragments
pub const READ_REPORT_ID: u8 = 1;

/// Declared fragment size is the carried payload length plus this offset
pub const FRAGMENT_SIZE_OFFSET: usize = 3;

/// Frame start marker, transmitted little-endian ("ST")
pub const FRAME_START: u16 = 0x5453;

/// Frame end marker, transmitted little-endian ("EN")
pub const FRAME_END: u16 = 0x4E45;

/// Minimum reassembled size at which the frame markers are checked
pub const MIN_FRAME_SIZE: usize = 7;

/// Length of the Version reply payload
pub const VERSION_PAYLOAD_SIZE: usize = 39;

/// Length of the firmware GUID inside the Version reply
pub const VERSION_GUID_SIZE: usize = 36;
