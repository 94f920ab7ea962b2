//! Error types for hidisp-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate and by the programmer backends.

use core::fmt;

/// Classification of a failed USB transport operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// No device with the requested identity is attached
    NotFound,
    /// The device is claimed by another application
    Busy,
    /// The OS refused access to the device
    AccessDenied,
    /// Any other transfer failure
    Io,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "The specified device was not found"),
            Self::Busy => write!(f, "The device is used by another application"),
            Self::AccessDenied => write!(f, "Access to device denied"),
            Self::Io => write!(f, "Communication error with device"),
        }
    }
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// USB transport failure
    Transport(TransportErrorKind),
    /// The status report did not echo the sequence number just sent
    ProtocolDesync {
        /// Sequence number of the command frame
        sent: u8,
        /// Sequence number found in the status report
        received: u8,
    },
    /// A frame or report had the wrong length or report id
    InvalidFrame,

    // Target errors
    /// The target did not echo the programming enable instruction
    ProgramEnableFailed,
    /// The first signature byte is not the Atmel vendor code
    UnknownVendor(u8),
    /// The signature matched no entry in the device database
    DeviceNotFound,
    /// The target stayed busy for longer than the poll budget
    Timeout,
    /// Operation is not implemented for this target
    NotImplemented,

    // Image errors
    /// Image does not fit into the device flash
    SizeExceeded {
        /// Image size in bytes
        image_bytes: usize,
        /// Flash size in bytes
        flash_bytes: usize,
    },
    /// Flash contents differ from the image
    VerifyMismatch {
        /// Number of differing bytes
        count: usize,
    },
}

impl Error {
    /// Whether the error means that no usable target was identified
    pub fn is_device_not_found(&self) -> bool {
        matches!(self, Self::DeviceNotFound | Self::UnknownVendor(_))
    }
}

impl From<TransportErrorKind> for Error {
    fn from(kind: TransportErrorKind) -> Self {
        Error::Transport(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(kind) => write!(f, "USB error: {}", kind),
            Self::ProtocolDesync { sent, received } => write!(
                f,
                "sequence number not copied (sent 0x{:02X}, got 0x{:02X})",
                sent, received
            ),
            Self::InvalidFrame => write!(f, "malformed HID report"),
            Self::ProgramEnableFailed => write!(
                f,
                "failed to put device in program mode, no device connected?"
            ),
            Self::UnknownVendor(vendor) => write!(
                f,
                "first signature byte is 0x{:02X}, not 0x1E: not an Atmel device, or no device",
                vendor
            ),
            Self::DeviceNotFound => write!(f, "failed to find device"),
            Self::Timeout => write!(f, "target did not become ready"),
            Self::NotImplemented => write!(f, "not implemented"),
            Self::SizeExceeded {
                image_bytes,
                flash_bytes,
            } => write!(
                f,
                "image is {} bytes but the device flash holds only {} bytes",
                image_bytes, flash_bytes
            ),
            Self::VerifyMismatch { count } => {
                write!(f, "verify failed: {} byte(s) differ", count)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
