//! High-level programming operations

use alloc::vec::Vec;

use crate::chip::{ChipDatabase, FuseByte};
use crate::error::{Error, Result};
use crate::hid::MAX_BATCH_COMMANDS;
use crate::ihex::FlashImage;
use crate::isp::{Command, ATMEL_VENDOR_ID, BUSY, PROGRAM_ENABLE_ECHO};
use crate::programmer::IspMaster;

use super::context::FlashContext;

/// Time the target needs after reset before it accepts programming enable
pub const RESET_SETTLE_US: u32 = 20_000;

/// Page buffer loads sent per batch (low/high pairs never split)
const LOADS_PER_BATCH: usize = MAX_BATCH_COMMANDS & !1;

// =============================================================================
// Target session
// =============================================================================

/// Put the target into serial programming mode
///
/// Pulses reset (release, then assert) and issues Programming Enable. The
/// target echoes the second instruction byte when it is in sync; anything
/// else usually means nothing is connected.
pub fn enter_programming_mode<M: IspMaster + ?Sized>(master: &mut M) -> Result<()> {
    master.set_reset(false)?;
    master.set_reset(true)?;
    master.delay_us(RESET_SETTLE_US);

    let resp = master.transact(Command::program_enable())?;
    if resp.echo() != PROGRAM_ENABLE_ECHO {
        log::debug!("program enable answered {:02X?}", resp.bytes());
        return Err(Error::ProgramEnableFailed);
    }
    log::debug!("target in programming mode");
    Ok(())
}

/// Release reset and let the target run
pub fn start_device<M: IspMaster + ?Sized>(master: &mut M) -> Result<()> {
    log::debug!("releasing target reset");
    master.set_reset(false)
}

/// Read the three signature bytes
///
/// Fails with [`Error::UnknownVendor`] if byte 0 is not the Atmel vendor
/// code, without reading the remaining bytes.
pub fn read_signature<M: IspMaster + ?Sized>(master: &mut M) -> Result<[u8; 3]> {
    let vendor = master.transact(Command::read_signature(0))?.data();
    if vendor != ATMEL_VENDOR_ID {
        return Err(Error::UnknownVendor(vendor));
    }
    let part = master.transact(Command::read_signature(1))?.data();
    let variant = master.transact(Command::read_signature(2))?.data();
    Ok([vendor, part, variant])
}

/// Identify the target using a device database and return a context
pub fn probe<M: IspMaster + ?Sized>(master: &mut M, db: &ChipDatabase) -> Result<FlashContext> {
    let signature = read_signature(master)?;
    log::info!(
        "Found device with signature: {:02x} {:02x}",
        signature[1],
        signature[2]
    );

    let device = db
        .find_by_signature([signature[1], signature[2]])
        .ok_or(Error::DeviceNotFound)?
        .clone();
    log::info!("Which is a: {}", device.name);

    Ok(FlashContext::new(device, signature))
}

/// Poll the target until it reports ready
///
/// Polls at most `max_polls` times with `poll_delay_us` between polls.
pub fn wait_ready<M: IspMaster + ?Sized>(
    master: &mut M,
    max_polls: u32,
    poll_delay_us: u32,
) -> Result<()> {
    for _ in 0..max_polls {
        let status = master.transact(Command::poll_ready())?.data();
        if status & BUSY == 0 {
            return Ok(());
        }
        if poll_delay_us > 0 {
            master.delay_us(poll_delay_us);
        }
    }

    log::warn!("target still busy after {} polls", max_polls);
    Err(Error::Timeout)
}

// =============================================================================
// Flash
// =============================================================================

/// Erase flash (and EEPROM unless EESAVE is programmed)
pub fn chip_erase<M: IspMaster + ?Sized>(master: &mut M, ctx: &FlashContext) -> Result<()> {
    log::debug!("chip erase");
    master.transact(Command::chip_erase())?;
    wait_ready(master, ctx.max_polls, ctx.poll_delay_us)
}

/// Number of page writes needed for an image of `image_len` bytes
pub fn page_write_count(image_len: usize, page_words: u16) -> usize {
    let page_bytes = page_words as usize * 2;
    if page_bytes == 0 {
        return 0;
    }
    image_len.div_ceil(page_bytes)
}

/// Check that the image fits into the device flash
pub fn check_fits(ctx: &FlashContext, image: &FlashImage) -> Result<()> {
    let flash_bytes = ctx.total_size();
    if image.len() > flash_bytes {
        return Err(Error::SizeExceeded {
            image_bytes: image.len(),
            flash_bytes,
        });
    }
    Ok(())
}

/// Fill the page buffer from the image and write page `page`
///
/// Bytes past the end of the image are loaded as `0xFF`.
pub fn load_page<M: IspMaster + ?Sized>(
    master: &mut M,
    ctx: &FlashContext,
    image: &FlashImage,
    page: usize,
) -> Result<()> {
    let page_words = ctx.device.page_words as usize;
    let first_word = page * page_words;

    let mut loads = Vec::with_capacity(page_words * 2);
    for word in first_word..first_word + page_words {
        let word_addr = word as u16;
        loads.push(Command::load_program_low(
            word_addr,
            image.byte_or_erased(word * 2),
        ));
        loads.push(Command::load_program_high(
            word_addr,
            image.byte_or_erased(word * 2 + 1),
        ));
    }

    for batch in loads.chunks(LOADS_PER_BATCH) {
        master.transact_batch(batch)?;
    }

    log::trace!("writing page {} at word 0x{:04X}", page, first_word);
    master.transact(Command::write_program_page(first_word as u16))?;
    wait_ready(master, ctx.max_polls, ctx.poll_delay_us)
}

/// Progress callbacks for [`write`] and [`verify`]
pub trait ProgramProgress {
    /// Called before the first page is written
    fn writing(&mut self, pages: usize);

    /// Called after each page write
    fn page_written(&mut self, pages_done: usize);

    /// Called before verify reads start
    fn verifying(&mut self, bytes: usize);

    /// Called as verify progresses
    fn verify_progress(&mut self, bytes_done: usize);
}

/// A no-op progress reporter
pub struct NoProgress;

impl ProgramProgress for NoProgress {
    fn writing(&mut self, _pages: usize) {}
    fn page_written(&mut self, _pages_done: usize) {}
    fn verifying(&mut self, _bytes: usize) {}
    fn verify_progress(&mut self, _bytes_done: usize) {}
}

/// Program the image into flash, page by page
///
/// Flash must have been erased. The image size is checked before any page
/// is touched. Returns the number of pages written.
pub fn write<M: IspMaster + ?Sized, P: ProgramProgress>(
    master: &mut M,
    ctx: &FlashContext,
    image: &FlashImage,
    progress: &mut P,
) -> Result<usize> {
    check_fits(ctx, image)?;

    let pages = page_write_count(image.len(), ctx.device.page_words);
    log::debug!(
        "writing {} bytes in {} pages of {} bytes",
        image.len(),
        pages,
        ctx.page_size()
    );
    progress.writing(pages);

    for page in 0..pages {
        load_page(master, ctx, image, page)?;
        progress.page_written(page + 1);
    }

    Ok(pages)
}

/// Read one flash word (low byte, then high byte)
pub fn read_word<M: IspMaster + ?Sized>(master: &mut M, word: u16) -> Result<u16> {
    let lo = master.transact(Command::read_program_low(word))?.data();
    let hi = master.transact(Command::read_program_high(word))?.data();
    Ok(u16::from_le_bytes([lo, hi]))
}

/// A byte that differs between flash and image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Byte address
    pub address: usize,
    /// Byte in the image
    pub expected: u8,
    /// Byte read from flash
    pub found: u8,
}

/// Outcome of a verify pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Bytes compared
    pub bytes_checked: usize,
    /// Every differing byte, in address order
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    /// Whether flash matched the image
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Turn a failed verify into [`Error::VerifyMismatch`]
    pub fn into_result(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(Error::VerifyMismatch {
                count: self.mismatches.len(),
            })
        }
    }
}

/// Compare flash words read back from the target against the image
///
/// `words[i]` holds flash word `i`. Only bytes inside the image are
/// compared.
pub fn verify_words(image: &FlashImage, words: &[u16]) -> VerifyReport {
    let mut report = VerifyReport::default();
    for (address, &expected) in image.as_bytes().iter().enumerate() {
        let Some(word) = words.get(address / 2) else {
            break;
        };
        let found = word.to_le_bytes()[address % 2];
        if found != expected {
            report.mismatches.push(Mismatch {
                address,
                expected,
                found,
            });
        }
        report.bytes_checked += 1;
    }
    report
}

/// Read back the flash covered by the image and compare
///
/// Every mismatch is collected; the pass does not stop at the first one.
/// Transport errors still abort.
pub fn verify<M: IspMaster + ?Sized, P: ProgramProgress>(
    master: &mut M,
    ctx: &FlashContext,
    image: &FlashImage,
    progress: &mut P,
) -> Result<VerifyReport> {
    check_fits(ctx, image)?;

    let word_count = image.len().div_ceil(2);
    progress.verifying(image.len());

    let mut words = Vec::with_capacity(word_count);
    for word in 0..word_count {
        words.push(read_word(master, word as u16)?);
        if word % 64 == 63 || word + 1 == word_count {
            progress.verify_progress(((word + 1) * 2).min(image.len()));
        }
    }

    let report = verify_words(image, &words);
    for m in &report.mismatches {
        log::debug!(
            "verify: 0x{:04X}: expected {:02X}, found {:02X}",
            m.address,
            m.expected,
            m.found
        );
    }
    Ok(report)
}

// =============================================================================
// Fuses
// =============================================================================

/// Raw fuse bytes read from the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseBytes {
    /// Low fuse byte
    pub low: u8,
    /// High fuse byte
    pub high: u8,
}

impl FuseBytes {
    /// Raw value of a fuse byte, if it was read
    pub fn get(&self, byte: FuseByte) -> Option<u8> {
        match byte {
            FuseByte::Low => Some(self.low),
            FuseByte::High => Some(self.high),
            FuseByte::Extended => None,
        }
    }
}

/// Read one fuse byte
///
/// The extended fuse byte is not supported.
pub fn read_fuse<M: IspMaster + ?Sized>(master: &mut M, byte: FuseByte) -> Result<u8> {
    let cmd = match byte {
        FuseByte::Low => Command::read_low_fuse(),
        FuseByte::High => Command::read_high_fuse(),
        FuseByte::Extended => return Err(Error::NotImplemented),
    };
    Ok(master.transact(cmd)?.data())
}

/// Read the low and high fuse bytes
pub fn read_fuses<M: IspMaster + ?Sized>(master: &mut M) -> Result<FuseBytes> {
    Ok(FuseBytes {
        low: read_fuse(master, FuseByte::Low)?,
        high: read_fuse(master, FuseByte::High)?,
    })
}

/// Program one fuse byte
///
/// The extended fuse byte is not supported.
pub fn write_fuse<M: IspMaster + ?Sized>(
    master: &mut M,
    ctx: &FlashContext,
    byte: FuseByte,
    value: u8,
) -> Result<()> {
    let cmd = match byte {
        FuseByte::Low => Command::write_low_fuse(value),
        FuseByte::High => Command::write_high_fuse(value),
        FuseByte::Extended => return Err(Error::NotImplemented),
    };
    log::debug!("writing {} fuse: 0x{:02X}", byte, value);
    master.transact(cmd)?;
    wait_ready(master, ctx.max_polls, ctx.poll_delay_us)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::AvrDevice;
    use crate::isp::Response;
    use alloc::string::ToString;
    use alloc::vec;

    /// Records instructions and answers polls with a scripted busy count
    struct Recorder {
        sent: Vec<Command>,
        batches: Vec<usize>,
        busy_polls: u32,
        delays: u32,
    }

    impl Recorder {
        fn new(busy_polls: u32) -> Self {
            Self {
                sent: Vec::new(),
                batches: Vec::new(),
                busy_polls,
                delays: 0,
            }
        }
    }

    impl IspMaster for Recorder {
        fn transact(&mut self, cmd: Command) -> Result<Response> {
            self.sent.push(cmd);
            if cmd == Command::poll_ready() && self.busy_polls > 0 {
                self.busy_polls -= 1;
                return Ok(Response([0, 0, 0, BUSY]));
            }
            Ok(Response::default())
        }

        fn transact_batch(&mut self, cmds: &[Command]) -> Result<Response> {
            self.batches.push(cmds.len());
            self.sent.extend_from_slice(cmds);
            Ok(Response::default())
        }

        fn set_reset(&mut self, _asserted: bool) -> Result<()> {
            Ok(())
        }

        fn delay_us(&mut self, _us: u32) {
            self.delays += 1;
        }
    }

    fn ctx(page_words: u16) -> FlashContext {
        let device = AvrDevice {
            name: "test".to_string(),
            signature: [0x93, 0x07],
            flash_words: 4096,
            page_words,
            fuses: Vec::new(),
        };
        FlashContext::new(device, [0x1E, 0x93, 0x07])
    }

    #[test]
    fn test_page_write_count() {
        assert_eq!(page_write_count(0, 32), 0);
        assert_eq!(page_write_count(64, 32), 1);
        assert_eq!(page_write_count(65, 32), 2);
        assert_eq!(page_write_count(8192, 32), 128);
    }

    #[test]
    fn test_check_fits() {
        let ctx = ctx(32);
        assert!(check_fits(&ctx, &FlashImage::from_bytes(vec![0; 8192])).is_ok());
        assert_eq!(
            check_fits(&ctx, &FlashImage::from_bytes(vec![0; 8193])),
            Err(Error::SizeExceeded {
                image_bytes: 8193,
                flash_bytes: 8192
            })
        );
    }

    #[test]
    fn test_wait_ready_bounded() {
        let mut m = Recorder::new(u32::MAX);
        assert_eq!(wait_ready(&mut m, 5, 1000), Err(Error::Timeout));
        assert_eq!(m.sent.len(), 5);
        assert_eq!(m.delays, 5);

        let mut m = Recorder::new(2);
        assert!(wait_ready(&mut m, 5, 1000).is_ok());
        assert_eq!(m.sent.len(), 3);
    }

    #[test]
    fn test_load_page_sequence() {
        let ctx = ctx(32);
        let image = FlashImage::from_bytes(vec![0xA5; 65]);
        let mut m = Recorder::new(0);
        load_page(&mut m, &ctx, &image, 1).unwrap();

        // 64 loads in batches of 30, then the page write and one poll
        assert_eq!(m.batches, [30, 30, 4]);
        assert_eq!(m.sent.len(), 66);
        assert_eq!(m.sent[0], Command::load_program_low(32, 0xA5));
        assert_eq!(m.sent[1], Command::load_program_high(32, 0xFF));
        assert_eq!(m.sent[63], Command::load_program_high(63, 0xFF));
        assert_eq!(m.sent[64], Command::write_program_page(32));
        assert_eq!(m.sent[65], Command::poll_ready());
    }

    #[test]
    fn test_write_rejects_oversized_image() {
        let ctx = ctx(32);
        let image = FlashImage::from_bytes(vec![0; 8194]);
        let mut m = Recorder::new(0);
        assert!(matches!(
            write(&mut m, &ctx, &image, &mut NoProgress),
            Err(Error::SizeExceeded { .. })
        ));
        assert!(m.sent.is_empty());
    }

    #[test]
    fn test_verify_words() {
        let image = FlashImage::from_bytes(vec![0x01, 0x02, 0x03]);
        let report = verify_words(&image, &[0x0201, 0xFF03]);
        assert!(report.is_ok());
        assert_eq!(report.bytes_checked, 3);

        let report = verify_words(&image, &[0x0241, 0xFF03]);
        assert_eq!(
            report.mismatches,
            [Mismatch {
                address: 0,
                expected: 0x01,
                found: 0x41
            }]
        );
        assert_eq!(
            report.into_result(),
            Err(Error::VerifyMismatch { count: 1 })
        );
    }

    #[test]
    fn test_extended_fuse_not_implemented() {
        let ctx = ctx(32);
        let mut m = Recorder::new(0);
        assert_eq!(
            read_fuse(&mut m, FuseByte::Extended),
            Err(Error::NotImplemented)
        );
        assert_eq!(
            write_fuse(&mut m, &ctx, FuseByte::Extended, 0xFF),
            Err(Error::NotImplemented)
        );
        assert!(m.sent.is_empty());
    }
}
