use std::io;
use thiserror::Error;

/// The primary error type for the `tqir-lib` library.
#[derive(Error, Debug)]
pub enum TqError {
    #[error("USB device not found. Is the Tiqiaa Tview transceiver connected?")]
    DeviceNotFound,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),

    #[error("Timeout during USB operation: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("A command reply wait is already outstanding")]
    ReplyPending,

    #[error("Device session is closed")]
    Closed,

    #[error("Frame size {0} is outside the valid range 1..=1024")]
    InvalidFrameSize(usize),

    #[error("Unsupported carrier frequency: {0}")]
    InvalidFrequency(u32),
}
