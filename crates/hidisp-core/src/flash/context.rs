//! Flash context - runtime state for programming operations

use crate::chip::AvrDevice;

/// Default number of busy polls before giving up
pub const DEFAULT_MAX_POLLS: u32 = 1000;

/// Default delay between busy polls, in microseconds
pub const DEFAULT_POLL_DELAY_US: u32 = 1000;

/// Runtime context for programming operations
///
/// Holds the identified device and the busy-poll budget used by every
/// operation that waits for the target.
#[derive(Debug, Clone)]
pub struct FlashContext {
    /// The identified device
    pub device: AvrDevice,
    /// Full signature as read from the target
    pub signature: [u8; 3],
    /// Busy polls before [`Error::Timeout`](crate::Error::Timeout)
    pub max_polls: u32,
    /// Delay between busy polls, in microseconds
    pub poll_delay_us: u32,
}

impl FlashContext {
    /// Create a new context for the given device
    pub fn new(device: AvrDevice, signature: [u8; 3]) -> Self {
        Self {
            device,
            signature,
            max_polls: DEFAULT_MAX_POLLS,
            poll_delay_us: DEFAULT_POLL_DELAY_US,
        }
    }

    /// Override the busy-poll budget
    pub fn with_polling(mut self, max_polls: u32, poll_delay_us: u32) -> Self {
        self.max_polls = max_polls;
        self.poll_delay_us = poll_delay_us;
        self
    }

    /// Page size in bytes
    pub fn page_size(&self) -> usize {
        self.device.page_bytes()
    }

    /// Flash size in bytes
    pub fn total_size(&self) -> usize {
        self.device.flash_bytes()
    }
}
