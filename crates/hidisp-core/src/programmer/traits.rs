//! Programmer trait definitions

use crate::error::Result;
use crate::isp::{Command, Response};

/// ISP master trait
///
/// Represents anything that can clock a 4-byte ISP instruction into the
/// target and hand back the four response bytes: the bit-banged driver on
/// the programmer itself, the HID client on the host, or a simulator.
///
/// The master is opcode-agnostic. It never interprets the response; callers
/// pick the byte that matters for the instruction they sent.
pub trait IspMaster {
    /// Execute a single ISP transaction
    fn transact(&mut self, cmd: Command) -> Result<Response>;

    /// Execute a run of ISP transactions back to back
    ///
    /// Only the reply of the final transaction is returned. Masters that can
    /// ship several instructions in one transfer override this.
    fn transact_batch(&mut self, cmds: &[Command]) -> Result<Response> {
        let mut last = Response::default();
        for cmd in cmds {
            last = self.transact(*cmd)?;
        }
        Ok(last)
    }

    /// Drive the target reset line
    ///
    /// `asserted = true` pulls reset low, holding the target in programming
    /// mode. `false` releases it so the target runs.
    fn set_reset(&mut self, asserted: bool) -> Result<()>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

impl<M: IspMaster + ?Sized> IspMaster for &mut M {
    fn transact(&mut self, cmd: Command) -> Result<Response> {
        (**self).transact(cmd)
    }

    fn transact_batch(&mut self, cmds: &[Command]) -> Result<Response> {
        (**self).transact_batch(cmds)
    }

    fn set_reset(&mut self, asserted: bool) -> Result<()> {
        (**self).set_reset(asserted)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

#[cfg(feature = "alloc")]
impl<M: IspMaster + ?Sized> IspMaster for alloc::boxed::Box<M> {
    fn transact(&mut self, cmd: Command) -> Result<Response> {
        (**self).transact(cmd)
    }

    fn transact_batch(&mut self, cmds: &[Command]) -> Result<Response> {
        (**self).transact_batch(cmds)
    }

    fn set_reset(&mut self, asserted: bool) -> Result<()> {
        (**self).set_reset(asserted)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
