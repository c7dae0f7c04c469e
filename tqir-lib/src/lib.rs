pub mod constants;
pub mod device;
pub mod error;
pub mod fragment;
pub mod frame;
pub mod nec;
pub mod reply;
pub mod signal;

// Re-export the session type and error for easy access
pub use device::TqIr;
pub use error::TqError;
