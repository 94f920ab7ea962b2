//! hidisp-dummy - Simulated AVR target for testing
//!
//! This crate provides an in-memory AVR target that understands the serial
//! programming instruction set. It can be driven a whole instruction at a
//! time through [`IspMaster`], or bit by bit through [`SimulatedGpio`],
//! which plugs into the bit-banged driver and the HID bridge exactly like
//! the programmer's port pins would.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use hidisp_core::error::Result;
use hidisp_core::isp::opcodes;
use hidisp_core::isp::{Command, Response, BUSY, ERASED_VALUE};
use hidisp_core::programmer::{Gpio, IspMaster, Level, Line};

/// Configuration for the simulated target
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Signature bytes (vendor, part, variant)
    pub signature: [u8; 3],
    /// Flash size in words
    pub flash_words: u32,
    /// Page size in words
    pub page_words: u16,
    /// Initial low fuse byte
    pub low_fuse: u8,
    /// Initial high fuse byte
    pub high_fuse: u8,
    /// Polls reporting busy after an erase or write
    pub busy_polls: u32,
    /// Whether the target answers at all
    pub connected: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            signature: [0x1E, 0x93, 0x07], // ATmega8
            flash_words: 4096,
            page_words: 32,
            low_fuse: 0xE1,
            high_fuse: 0xD9,
            busy_polls: 2,
            connected: true,
        }
    }
}

/// A page write as seen by the target
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWrite {
    /// First word of the page
    pub word: u16,
    /// Page buffer bytes that were explicitly loaded before the write
    pub loaded: Vec<Option<u8>>,
}

/// Simulated AVR target
///
/// Bytes are exchanged full duplex: the answer to byte `n` of an instruction
/// is known before byte `n` arrives, as on the real part. Bytes 1 and 2
/// echo the previous instruction byte, byte 3 carries read data.
#[cfg(feature = "alloc")]
pub struct DummyAvr {
    config: DummyConfig,
    flash: Vec<u8>,
    page_buffer: Vec<Option<u8>>,
    low_fuse: u8,
    high_fuse: u8,
    reset_asserted: bool,
    programming: bool,
    busy: u32,
    rx: [u8; 4],
    pos: usize,
    page_writes: Vec<PageWrite>,
    erase_count: usize,
    delay_total_us: u64,
}

#[cfg(feature = "alloc")]
impl DummyAvr {
    /// Create a new target with erased flash
    pub fn new(config: DummyConfig) -> Self {
        let flash = vec![ERASED_VALUE; config.flash_words as usize * 2];
        let page_buffer = vec![None; config.page_words as usize * 2];
        Self {
            low_fuse: config.low_fuse,
            high_fuse: config.high_fuse,
            config,
            flash,
            page_buffer,
            reset_asserted: false,
            programming: false,
            busy: 0,
            rx: [0; 4],
            pos: 0,
            page_writes: Vec::new(),
            erase_count: 0,
            delay_total_us: 0,
        }
    }

    /// Create a new ATmega8 target
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a target with pre-filled flash
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut avr = Self::new(config);
        let len = core::cmp::min(initial_data.len(), avr.flash.len());
        avr.flash[..len].copy_from_slice(&initial_data[..len]);
        avr
    }

    /// Flash contents
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Mutable flash contents
    pub fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    /// Current (low, high) fuse bytes
    pub fn fuses(&self) -> (u8, u8) {
        (self.low_fuse, self.high_fuse)
    }

    /// Every page write so far, in order
    pub fn page_writes(&self) -> &[PageWrite] {
        &self.page_writes
    }

    /// Number of chip erases so far
    pub fn erase_count(&self) -> usize {
        self.erase_count
    }

    /// Whether programming is enabled
    pub fn is_programming(&self) -> bool {
        self.programming
    }

    /// Whether reset is held low
    pub fn reset_asserted(&self) -> bool {
        self.reset_asserted
    }

    /// Total time the host asked to wait, in microseconds
    pub fn delay_total_us(&self) -> u64 {
        self.delay_total_us
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Drive the reset line
    ///
    /// Releasing reset leaves programming mode. Any partially shifted
    /// instruction is dropped.
    pub fn set_reset(&mut self, asserted: bool) {
        if !asserted {
            self.programming = false;
        }
        self.reset_asserted = asserted;
        self.pos = 0;
    }

    /// The byte the target shifts out during the next byte exchange
    pub fn next_out(&self) -> u8 {
        if !self.config.connected || !self.reset_asserted {
            return 0;
        }
        match self.pos {
            0 => 0xFF,
            1 | 2 => self.rx[self.pos - 1],
            _ if self.programming => self.read_data(),
            _ => self.rx[2],
        }
    }

    /// Accept one byte shifted in by the host
    pub fn shift_in(&mut self, byte: u8) {
        if !self.config.connected || !self.reset_asserted {
            return;
        }
        self.rx[self.pos] = byte;
        self.pos += 1;
        if self.pos == 4 {
            self.pos = 0;
            self.execute();
        }
    }

    /// Exchange one byte full duplex
    pub fn exchange(&mut self, byte: u8) -> u8 {
        let out = self.next_out();
        self.shift_in(byte);
        out
    }

    fn word_addr(&self) -> usize {
        u16::from_be_bytes([self.rx[1], self.rx[2]]) as usize
    }

    fn read_data(&self) -> u8 {
        match self.rx[0] {
            opcodes::READ_SIGNATURE => self
                .config
                .signature
                .get(self.rx[2] as usize)
                .copied()
                .unwrap_or(0),
            opcodes::READ_PROGRAM_LOW => self
                .flash
                .get(self.word_addr() * 2)
                .copied()
                .unwrap_or(ERASED_VALUE),
            opcodes::READ_PROGRAM_HIGH => self
                .flash
                .get(self.word_addr() * 2 + 1)
                .copied()
                .unwrap_or(ERASED_VALUE),
            opcodes::READ_LOW_FUSE => self.low_fuse,
            opcodes::READ_HIGH_FUSE if self.rx[1] == opcodes::READ_HIGH_FUSE_2 => self.high_fuse,
            opcodes::POLL_READY => {
                if self.busy > 0 {
                    BUSY
                } else {
                    0
                }
            }
            _ => self.rx[2],
        }
    }

    fn execute(&mut self) {
        let [op, b1, b2, b3] = self.rx;

        if !self.programming {
            if op == opcodes::PROGRAM_ENABLE && b1 == opcodes::PROGRAM_ENABLE_2 {
                log::trace!("dummy: programming enabled");
                self.programming = true;
            }
            return;
        }

        let page_words = self.config.page_words as usize;
        match (op, b1) {
            (opcodes::CHIP_ERASE, opcodes::CHIP_ERASE_2) => {
                self.flash.fill(ERASED_VALUE);
                self.page_buffer.fill(None);
                self.erase_count += 1;
                self.busy = self.config.busy_polls;
            }
            (opcodes::WRITE_FUSE, opcodes::WRITE_LOW_FUSE_2) => {
                self.low_fuse = b3;
                self.busy = self.config.busy_polls;
            }
            (opcodes::WRITE_FUSE, opcodes::WRITE_HIGH_FUSE_2) => {
                self.high_fuse = b3;
                self.busy = self.config.busy_polls;
            }
            (opcodes::POLL_READY, _) => {
                self.busy = self.busy.saturating_sub(1);
            }
            (opcodes::LOAD_PROGRAM_LOW, _) => {
                self.page_buffer[(b2 as usize % page_words) * 2] = Some(b3);
            }
            (opcodes::LOAD_PROGRAM_HIGH, _) => {
                self.page_buffer[(b2 as usize % page_words) * 2 + 1] = Some(b3);
            }
            (opcodes::WRITE_PROGRAM_PAGE, _) => {
                let word = self.word_addr() & !(page_words - 1);
                let start = word * 2;
                if start < self.flash.len() {
                    for (i, byte) in self.page_buffer.iter().enumerate() {
                        // Flash programming can only clear bits
                        self.flash[start + i] &= byte.unwrap_or(ERASED_VALUE);
                    }
                }
                log::trace!("dummy: page write at word 0x{:04X}", word);
                self.page_writes.push(PageWrite {
                    word: word as u16,
                    loaded: self.page_buffer.clone(),
                });
                self.page_buffer.fill(None);
                self.busy = self.config.busy_polls;
            }
            _ => {}
        }
    }
}

#[cfg(feature = "alloc")]
impl IspMaster for DummyAvr {
    fn transact(&mut self, cmd: Command) -> Result<Response> {
        let mut resp = [0u8; 4];
        for (out, byte) in resp.iter_mut().zip(cmd.bytes()) {
            *out = self.exchange(byte);
        }
        Ok(Response(resp))
    }

    fn set_reset(&mut self, asserted: bool) -> Result<()> {
        DummyAvr::set_reset(self, asserted);
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.delay_total_us += us as u64;
    }
}

/// Port pins wired to a simulated target
///
/// Implements [`Gpio`] so the bit-banged driver can talk to a [`DummyAvr`].
/// MOSI is sampled on the rising SCK edge and MISO changes after the
/// falling edge, as on the real part.
#[cfg(feature = "alloc")]
pub struct SimulatedGpio {
    avr: DummyAvr,
    mosi: Level,
    sck: Level,
    reset: Level,
    bit: u8,
    out: u8,
    rx: u8,
    delay_total_us: u64,
}

#[cfg(feature = "alloc")]
impl SimulatedGpio {
    /// Wire up a target
    pub fn new(avr: DummyAvr) -> Self {
        Self {
            avr,
            mosi: Level::Low,
            sck: Level::Low,
            reset: Level::High,
            bit: 0,
            out: 0,
            rx: 0,
            delay_total_us: 0,
        }
    }

    /// The simulated target
    pub fn avr(&self) -> &DummyAvr {
        &self.avr
    }

    /// Mutable access to the simulated target
    pub fn avr_mut(&mut self) -> &mut DummyAvr {
        &mut self.avr
    }

    /// Total requested delay, in microseconds
    pub fn delay_total_us(&self) -> u64 {
        self.delay_total_us
    }

    /// Level of the reset line
    pub fn reset_level(&self) -> Level {
        self.reset
    }
}

#[cfg(feature = "alloc")]
impl Gpio for SimulatedGpio {
    fn set_line(&mut self, line: Line, level: Level) {
        match line {
            Line::Reset => {
                self.reset = level;
                self.avr.set_reset(!level.is_high());
                self.bit = 0;
                self.rx = 0;
            }
            Line::Mosi => self.mosi = level,
            Line::Sck => {
                let previous = self.sck;
                self.sck = level;
                match (previous, level) {
                    (Level::Low, Level::High) => {
                        if self.bit == 0 {
                            self.out = self.avr.next_out();
                        }
                        self.rx = (self.rx << 1) | self.mosi.is_high() as u8;
                    }
                    (Level::High, Level::Low) => {
                        self.bit += 1;
                        if self.bit == 8 {
                            self.avr.shift_in(self.rx);
                            self.bit = 0;
                            self.rx = 0;
                        }
                    }
                    _ => {}
                }
            }
            Line::Miso => {}
        }
    }

    fn read_line(&mut self, line: Line) -> Level {
        match line {
            Line::Miso => Level::from(self.out & (0x80 >> self.bit) != 0),
            Line::Reset => self.reset,
            Line::Mosi => self.mosi,
            Line::Sck => self.sck,
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.delay_total_us += us as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hidisp_core::chip::{ChipDatabase, FuseByte};
    use hidisp_core::flash::{self, NoProgress};
    use hidisp_core::ihex::FlashImage;
    use hidisp_core::programmer::IspBitbang;
    use hidisp_core::Error;

    fn programmed(config: DummyConfig) -> DummyAvr {
        let mut avr = DummyAvr::new(config);
        flash::enter_programming_mode(&mut avr).unwrap();
        avr
    }

    fn image(len: usize) -> FlashImage {
        FlashImage::from_bytes((0..len).map(|i| (i * 7 + 3) as u8).collect())
    }

    #[test]
    fn test_program_enable_echo() {
        let mut avr = DummyAvr::new_default();
        avr.set_reset(true);
        let resp = avr.transact(Command::program_enable()).unwrap();
        assert_eq!(resp.echo(), 0x53);
        assert!(avr.is_programming());

        avr.set_reset(false);
        assert!(!avr.is_programming());
    }

    #[test]
    fn test_disconnected_target() {
        let mut avr = DummyAvr::new(DummyConfig {
            connected: false,
            ..DummyConfig::default()
        });
        assert_eq!(
            flash::enter_programming_mode(&mut avr),
            Err(Error::ProgramEnableFailed)
        );
    }

    #[test]
    fn test_probe_mega8() {
        let db = ChipDatabase::builtin().unwrap();
        let mut avr = programmed(DummyConfig::default());
        let ctx = flash::probe(&mut avr, &db).unwrap();
        assert_eq!(ctx.device.name, "ATMega8");
        assert_eq!(ctx.device.flash_words, 4096);
        assert_eq!(ctx.device.page_words, 32);
        assert_eq!(ctx.signature, [0x1E, 0x93, 0x07]);
    }

    #[test]
    fn test_probe_unknown_part() {
        let db = ChipDatabase::builtin().unwrap();
        let mut avr = programmed(DummyConfig {
            signature: [0x1E, 0x99, 0x99],
            ..DummyConfig::default()
        });
        assert_eq!(flash::probe(&mut avr, &db).unwrap_err(), Error::DeviceNotFound);

        let mut avr = programmed(DummyConfig {
            signature: [0x00, 0x93, 0x07],
            ..DummyConfig::default()
        });
        let err = flash::probe(&mut avr, &db).unwrap_err();
        assert_eq!(err, Error::UnknownVendor(0x00));
        assert!(err.is_device_not_found());
    }

    #[test]
    fn test_write_one_full_page() {
        let db = ChipDatabase::builtin().unwrap();
        let mut avr = programmed(DummyConfig::default());
        let ctx = flash::probe(&mut avr, &db).unwrap();
        let img = image(64);

        flash::chip_erase(&mut avr, &ctx).unwrap();
        let pages = flash::write(&mut avr, &ctx, &img, &mut NoProgress).unwrap();

        assert_eq!(pages, 1);
        assert_eq!(avr.page_writes().len(), 1);
        assert_eq!(&avr.flash()[..64], img.as_bytes());
        assert!(avr.flash()[64..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_write_partial_second_page() {
        let db = ChipDatabase::builtin().unwrap();
        let mut avr = programmed(DummyConfig::default());
        let ctx = flash::probe(&mut avr, &db).unwrap();
        let img = image(65);

        flash::chip_erase(&mut avr, &ctx).unwrap();
        let pages = flash::write(&mut avr, &ctx, &img, &mut NoProgress).unwrap();

        assert_eq!(pages, 2);
        let writes = avr.page_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].word, 32);
        assert_eq!(writes[1].loaded[0], Some(img.as_bytes()[64]));
        assert!(writes[1].loaded[1..].iter().all(|&b| b == Some(0xFF)));
        assert_eq!(&avr.flash()[..65], img.as_bytes());
    }

    #[test]
    fn test_verify_counts_each_mismatch() {
        let db = ChipDatabase::builtin().unwrap();
        let mut avr = programmed(DummyConfig::default());
        let ctx = flash::probe(&mut avr, &db).unwrap();
        let img = image(200);

        flash::chip_erase(&mut avr, &ctx).unwrap();
        flash::write(&mut avr, &ctx, &img, &mut NoProgress).unwrap();

        let report = flash::verify(&mut avr, &ctx, &img, &mut NoProgress).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.bytes_checked, 200);

        let original = avr.flash()[101];
        avr.flash_mut()[101] = !original;
        let report = flash::verify(&mut avr, &ctx, &img, &mut NoProgress).unwrap();
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].address, 101);
        assert_eq!(report.mismatches[0].expected, original);
        assert_eq!(report.mismatches[0].found, !original);
    }

    #[test]
    fn test_oversized_image_leaves_flash_alone() {
        let db = ChipDatabase::builtin().unwrap();
        let mut avr = programmed(DummyConfig::default());
        let ctx = flash::probe(&mut avr, &db).unwrap();
        let img = image(8193);

        assert!(matches!(
            flash::write(&mut avr, &ctx, &img, &mut NoProgress),
            Err(Error::SizeExceeded {
                image_bytes: 8193,
                flash_bytes: 8192
            })
        ));
        assert!(avr.page_writes().is_empty());
    }

    #[test]
    fn test_erase_times_out() {
        let db = ChipDatabase::builtin().unwrap();
        let mut avr = programmed(DummyConfig {
            busy_polls: u32::MAX,
            ..DummyConfig::default()
        });
        let ctx = flash::probe(&mut avr, &db).unwrap().with_polling(10, 1000);

        assert_eq!(flash::chip_erase(&mut avr, &ctx), Err(Error::Timeout));
        assert_eq!(avr.erase_count(), 1);
    }

    #[test]
    fn test_fuses() {
        let db = ChipDatabase::builtin().unwrap();
        let mut avr = programmed(DummyConfig::default());
        let ctx = flash::probe(&mut avr, &db).unwrap();

        let fuses = flash::read_fuses(&mut avr).unwrap();
        assert_eq!((fuses.low, fuses.high), (0xE1, 0xD9));

        let cksel = ctx.device.fuses.iter().find(|f| f.name == "CKSEL").unwrap();
        assert_eq!(cksel.decode(fuses.low).label, Some("Internal RC: 1Mhz"));

        flash::write_fuse(&mut avr, &ctx, FuseByte::Low, 0xE4).unwrap();
        flash::write_fuse(&mut avr, &ctx, FuseByte::High, 0xC9).unwrap();
        assert_eq!(avr.fuses(), (0xE4, 0xC9));
    }

    #[test]
    fn test_start_device() {
        let mut avr = programmed(DummyConfig::default());
        flash::start_device(&mut avr).unwrap();
        assert!(!avr.reset_asserted());
        assert!(!avr.is_programming());
    }

    #[test]
    fn test_bitbang_against_simulated_target() {
        let db = ChipDatabase::builtin().unwrap();
        let gpio = SimulatedGpio::new(DummyAvr::new_default());
        let mut isp = IspBitbang::new(gpio);
        assert_eq!(isp.gpio().reset_level(), Level::Low);

        flash::enter_programming_mode(&mut isp).unwrap();
        let ctx = flash::probe(&mut isp, &db).unwrap();
        assert_eq!(ctx.device.name, "ATMega8");

        let img = image(70);
        flash::chip_erase(&mut isp, &ctx).unwrap();
        assert_eq!(flash::write(&mut isp, &ctx, &img, &mut NoProgress).unwrap(), 2);
        assert!(flash::verify(&mut isp, &ctx, &img, &mut NoProgress)
            .unwrap()
            .is_ok());

        assert_eq!(&isp.gpio().avr().flash()[..70], img.as_bytes());
        assert!(isp.gpio().delay_total_us() > 0);
    }
}
