//! Bit-banged ISP driver
//!
//! The AVR serial programming interface is a 4-wire synchronous protocol:
//! RESET (held low while programming), SCK, MOSI (programmer to target) and
//! MISO (target to programmer). This module drives it through a minimal
//! [`Gpio`] capability so the same code runs on the programmer firmware and
//! against a simulated target on the host.
//!
//! ## Timing
//!
//! Each bit holds MOSI for [`ISP_SETTLE_DELAY_US`] before raising SCK and
//! again before lowering it. The target needs SCK high and low phases of at
//! least two target clock cycles; 10 µs covers a 1 MHz target with margin.
//!
//! ## Failure model
//!
//! Nothing at this layer can fail. A missing or unpowered target reads back
//! as all-zero or stuck bits, which only the layers above can recognise.

use crate::error::Result;
use crate::isp::{Command, Response};

use super::IspMaster;

/// Settle delay before each SCK edge, in microseconds
pub const ISP_SETTLE_DELAY_US: u32 = 10;

/// ISP signal lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// Target reset, active low
    Reset,
    /// Programmer to target data
    Mosi,
    /// Target to programmer data
    Miso,
    /// Serial clock
    Sck,
}

/// Logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Driven or read low
    Low,
    /// Driven or read high
    High,
}

impl Level {
    /// Whether the level is high
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Minimal GPIO capability needed to bit-bang ISP
pub trait Gpio {
    /// Drive an output line
    fn set_line(&mut self, line: Line, level: Level);

    /// Sample an input line
    fn read_line(&mut self, line: Line) -> Level;

    /// Busy-wait for the given number of microseconds
    fn delay_us(&mut self, us: u32);
}

/// Bit-banged ISP master
pub struct IspBitbang<G: Gpio> {
    gpio: G,
    reset_asserted: bool,
}

impl<G: Gpio> IspBitbang<G> {
    /// Take over the GPIO lines
    ///
    /// SCK and MOSI idle low and the target is held in reset, ready for a
    /// programming enable instruction.
    pub fn new(mut gpio: G) -> Self {
        gpio.set_line(Line::Sck, Level::Low);
        gpio.set_line(Line::Mosi, Level::Low);
        gpio.set_line(Line::Reset, Level::Low);
        Self {
            gpio,
            reset_asserted: true,
        }
    }

    /// Shift one byte out MSB first and return the byte shifted in
    pub fn transfer_byte(&mut self, byte: u8) -> u8 {
        let mut out = byte;
        let mut recv = 0u8;
        for _ in 0..8 {
            self.gpio.set_line(Line::Mosi, Level::from(out & 0x80 != 0));
            out <<= 1;
            self.gpio.delay_us(ISP_SETTLE_DELAY_US);
            self.gpio.set_line(Line::Sck, Level::High);
            recv <<= 1;
            if self.gpio.read_line(Line::Miso).is_high() {
                recv |= 0x01;
            }
            self.gpio.delay_us(ISP_SETTLE_DELAY_US);
            self.gpio.set_line(Line::Sck, Level::Low);
        }
        recv
    }

    /// Clock a full 4-byte instruction and return all four response bytes
    pub fn issue_command(&mut self, cmd: [u8; 4]) -> [u8; 4] {
        let mut resp = [0u8; 4];
        for (out, byte) in resp.iter_mut().zip(cmd) {
            *out = self.transfer_byte(byte);
        }
        resp
    }

    /// Assert (low) or release (high) the target reset line
    pub fn set_reset(&mut self, asserted: bool) {
        self.gpio.set_line(Line::Reset, Level::from(!asserted));
        self.reset_asserted = asserted;
    }

    /// Whether reset is currently asserted
    pub fn reset_asserted(&self) -> bool {
        self.reset_asserted
    }

    /// Access the underlying GPIO implementation
    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    /// Mutable access to the underlying GPIO implementation
    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }

    /// Release the GPIO lines
    pub fn into_inner(self) -> G {
        self.gpio
    }
}

impl<G: Gpio> IspMaster for IspBitbang<G> {
    fn transact(&mut self, cmd: Command) -> Result<Response> {
        Ok(Response(self.issue_command(cmd.0)))
    }

    fn set_reset(&mut self, asserted: bool) -> Result<()> {
        IspBitbang::set_reset(self, asserted);
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.gpio.delay_us(us);
    }
}
