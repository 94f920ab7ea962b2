//! High-level programming operations
//!
//! This module sequences ISP instructions into device-level operations:
//! entering programming mode, identifying the target, erasing, writing and
//! verifying flash, and reading or writing fuses.

mod context;
mod operations;

pub use context::FlashContext;
pub use operations::*;
