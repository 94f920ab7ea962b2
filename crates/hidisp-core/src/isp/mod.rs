//! AVR serial programming instruction set
//!
//! Every ISP instruction is exactly four bytes long and clocks four bytes
//! back from the target. Which response byte carries meaning depends on the
//! instruction: the programming enable echo shows up in byte 2, read
//! instructions return their data in byte 3.

mod command;
pub mod opcodes;

pub use command::{Command, Response};

/// Vendor code expected in signature byte 0 (Atmel)
pub const ATMEL_VENDOR_ID: u8 = 0x1E;

/// Byte echoed back in response byte 2 when programming enable succeeds
pub const PROGRAM_ENABLE_ECHO: u8 = 0x53;

/// RDY/BSY bit in the poll response data byte
pub const BUSY: u8 = 0x01;

/// Value of an erased flash byte
pub const ERASED_VALUE: u8 = 0xFF;
