//! ISP instruction bytes
//!
//! Byte values of the first (and where fixed, second) instruction byte of
//! the AVR serial programming instruction set.

// ============================================================================
// Programming control
// ============================================================================

/// Programming Enable, first byte
pub const PROGRAM_ENABLE: u8 = 0xAC;
/// Programming Enable, second byte
pub const PROGRAM_ENABLE_2: u8 = 0x53;
/// Chip Erase, first byte
pub const CHIP_ERASE: u8 = 0xAC;
/// Chip Erase, second byte
pub const CHIP_ERASE_2: u8 = 0x80;
/// Poll RDY/BSY
pub const POLL_READY: u8 = 0xF0;

// ============================================================================
// Identification
// ============================================================================

/// Read Signature Byte (address in byte 2)
pub const READ_SIGNATURE: u8 = 0x30;

// ============================================================================
// Program memory
// ============================================================================

/// Load Program Memory Page, low byte
pub const LOAD_PROGRAM_LOW: u8 = 0x40;
/// Load Program Memory Page, high byte
pub const LOAD_PROGRAM_HIGH: u8 = 0x48;
/// Write Program Memory Page
pub const WRITE_PROGRAM_PAGE: u8 = 0x4C;
/// Read Program Memory, low byte
pub const READ_PROGRAM_LOW: u8 = 0x20;
/// Read Program Memory, high byte
pub const READ_PROGRAM_HIGH: u8 = 0x28;

// ============================================================================
// Fuses
// ============================================================================

/// Read Fuse bits
pub const READ_LOW_FUSE: u8 = 0x50;
/// Read Fuse High bits
pub const READ_HIGH_FUSE: u8 = 0x58;
/// Second byte of Read Fuse High bits
pub const READ_HIGH_FUSE_2: u8 = 0x08;
/// Write fuse instructions, first byte
pub const WRITE_FUSE: u8 = 0xAC;
/// Write Fuse bits, second byte
pub const WRITE_LOW_FUSE_2: u8 = 0xA0;
/// Write Fuse High bits, second byte
pub const WRITE_HIGH_FUSE_2: u8 = 0xA8;
