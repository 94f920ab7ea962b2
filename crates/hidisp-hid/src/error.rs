//! Error types for the HID bridge client

use hidisp_core::{Error as CoreError, TransportErrorKind};
use thiserror::Error;

/// HID bridge errors
#[derive(Debug, Error)]
pub enum HidError {
    /// No programmer with the requested identity is attached
    #[error("The specified device was not found")]
    NotFound,

    /// The programmer is claimed by another application
    #[error("The device is used by another application")]
    Busy,

    /// The OS refused access to the programmer
    #[error("Access to device denied")]
    AccessDenied,

    /// A transfer failed
    #[error("Communication error with device: {0}")]
    Io(String),

    /// The status report did not echo the sequence number just sent
    #[error("sequence number not copied (sent 0x{sent:02X}, got 0x{received:02X})")]
    ProtocolDesync {
        /// Sequence number of the command frame
        sent: u8,
        /// Sequence number in the status report
        received: u8,
    },

    /// The status report was too short
    #[error("short status report ({0} bytes)")]
    ShortReport(usize),

    /// Core library error
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for HID bridge operations
pub type Result<T> = std::result::Result<T, HidError>;

impl HidError {
    /// Transport classification, for errors raised by the USB layer
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            HidError::NotFound => Some(TransportErrorKind::NotFound),
            HidError::Busy => Some(TransportErrorKind::Busy),
            HidError::AccessDenied => Some(TransportErrorKind::AccessDenied),
            HidError::Io(_) => Some(TransportErrorKind::Io),
            _ => None,
        }
    }
}

impl From<HidError> for CoreError {
    fn from(e: HidError) -> Self {
        match e {
            HidError::ProtocolDesync { sent, received } => {
                CoreError::ProtocolDesync { sent, received }
            }
            HidError::ShortReport(_) => CoreError::InvalidFrame,
            HidError::Core(e) => e,
            other => match other.transport_kind() {
                Some(kind) => CoreError::Transport(kind),
                None => CoreError::Transport(TransportErrorKind::Io),
            },
        }
    }
}

#[cfg(feature = "std")]
impl From<nusb::Error> for HidError {
    fn from(e: nusb::Error) -> Self {
        match e.kind() {
            nusb::ErrorKind::NotFound | nusb::ErrorKind::Disconnected => HidError::NotFound,
            nusb::ErrorKind::Busy => HidError::Busy,
            nusb::ErrorKind::PermissionDenied => HidError::AccessDenied,
            _ => HidError::Io(e.to_string()),
        }
    }
}

#[cfg(feature = "std")]
impl From<nusb::transfer::TransferError> for HidError {
    fn from(e: nusb::transfer::TransferError) -> Self {
        match e {
            nusb::transfer::TransferError::Disconnected => HidError::NotFound,
            other => HidError::Io(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_messages() {
        assert_eq!(
            HidError::NotFound.to_string(),
            "The specified device was not found"
        );
        assert_eq!(
            HidError::Busy.to_string(),
            "The device is used by another application"
        );
        assert_eq!(HidError::AccessDenied.to_string(), "Access to device denied");
    }

    #[test]
    fn test_into_core_error() {
        assert_eq!(
            CoreError::from(HidError::ProtocolDesync {
                sent: 0x3A,
                received: 0x39
            }),
            CoreError::ProtocolDesync {
                sent: 0x3A,
                received: 0x39
            }
        );
        assert_eq!(
            CoreError::from(HidError::Io("stall".to_string())),
            CoreError::Transport(TransportErrorKind::Io)
        );
        assert_eq!(
            CoreError::from(HidError::Core(CoreError::Timeout)),
            CoreError::Timeout
        );
    }
}
