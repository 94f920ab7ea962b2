//! ISP command and response frames

use super::opcodes;

/// A single 4-byte ISP instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command(pub [u8; 4]);

impl Command {
    /// Create a command from raw bytes
    pub const fn new(b0: u8, b1: u8, b2: u8, b3: u8) -> Self {
        Self([b0, b1, b2, b3])
    }

    /// Programming Enable (`AC 53 00 00`)
    pub const fn program_enable() -> Self {
        Self::new(opcodes::PROGRAM_ENABLE, opcodes::PROGRAM_ENABLE_2, 0, 0)
    }

    /// Chip Erase (`AC 80 00 00`)
    pub const fn chip_erase() -> Self {
        Self::new(opcodes::CHIP_ERASE, opcodes::CHIP_ERASE_2, 0, 0)
    }

    /// Poll RDY/BSY (`F0 00 00 00`)
    pub const fn poll_ready() -> Self {
        Self::new(opcodes::POLL_READY, 0, 0, 0)
    }

    /// Read signature byte at `addr` (0..=2)
    pub const fn read_signature(addr: u8) -> Self {
        Self::new(opcodes::READ_SIGNATURE, 0, addr, 0)
    }

    /// Load the low byte of a page buffer word
    ///
    /// Only the low address byte is sent; the target masks it to the page.
    pub const fn load_program_low(word: u16, data: u8) -> Self {
        Self::new(opcodes::LOAD_PROGRAM_LOW, 0, word as u8, data)
    }

    /// Load the high byte of a page buffer word
    pub const fn load_program_high(word: u16, data: u8) -> Self {
        Self::new(opcodes::LOAD_PROGRAM_HIGH, 0, word as u8, data)
    }

    /// Write the page buffer to the page containing `word`
    pub const fn write_program_page(word: u16) -> Self {
        Self::new(
            opcodes::WRITE_PROGRAM_PAGE,
            (word >> 8) as u8,
            word as u8,
            0,
        )
    }

    /// Read the low byte of a program memory word
    pub const fn read_program_low(word: u16) -> Self {
        Self::new(opcodes::READ_PROGRAM_LOW, (word >> 8) as u8, word as u8, 0)
    }

    /// Read the high byte of a program memory word
    pub const fn read_program_high(word: u16) -> Self {
        Self::new(opcodes::READ_PROGRAM_HIGH, (word >> 8) as u8, word as u8, 0)
    }

    /// Read the low fuse byte (`50 00 00 00`)
    pub const fn read_low_fuse() -> Self {
        Self::new(opcodes::READ_LOW_FUSE, 0, 0, 0)
    }

    /// Read the high fuse byte (`58 08 00 00`)
    pub const fn read_high_fuse() -> Self {
        Self::new(opcodes::READ_HIGH_FUSE, opcodes::READ_HIGH_FUSE_2, 0, 0)
    }

    /// Write the low fuse byte (`AC A0 00 vv`)
    pub const fn write_low_fuse(value: u8) -> Self {
        Self::new(opcodes::WRITE_FUSE, opcodes::WRITE_LOW_FUSE_2, 0, value)
    }

    /// Write the high fuse byte (`AC A8 00 vv`)
    pub const fn write_high_fuse(value: u8) -> Self {
        Self::new(opcodes::WRITE_FUSE, opcodes::WRITE_HIGH_FUSE_2, 0, value)
    }

    /// Raw instruction bytes
    pub const fn bytes(&self) -> [u8; 4] {
        self.0
    }
}

/// The four bytes clocked back while a [`Command`] is shifted out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Response(pub [u8; 4]);

impl Response {
    /// Byte 2, where the target echoes the second instruction byte
    pub const fn echo(&self) -> u8 {
        self.0[2]
    }

    /// Byte 3, the data byte of read instructions
    pub const fn data(&self) -> u8 {
        self.0[3]
    }

    /// Raw response bytes
    pub const fn bytes(&self) -> [u8; 4] {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_addressing() {
        assert_eq!(Command::write_program_page(0x0120).0, [0x4C, 0x01, 0x20, 0x00]);
        assert_eq!(Command::read_program_high(0x0FFF).0, [0x28, 0x0F, 0xFF, 0x00]);
        // Page loads only carry the low address byte
        assert_eq!(Command::load_program_low(0x0123, 0xAA).0, [0x40, 0x00, 0x23, 0xAA]);
    }

    #[test]
    fn test_response_fields() {
        let resp = Response([0x00, 0xAC, 0x53, 0x1E]);
        assert_eq!(resp.echo(), 0x53);
        assert_eq!(resp.data(), 0x1E);
    }
}
