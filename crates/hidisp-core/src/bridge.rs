//! Programmer-side HID bridge
//!
//! Runs inside the USB control-transfer callbacks of the programmer
//! firmware. A SET_REPORT setup for report 2 or 3 arms the receive buffer;
//! the data stage then arrives in chunks (8 bytes at a time on a low-speed
//! device) until the frame is complete, at which point it is dispatched to
//! the ISP driver. GET_REPORT answers with the status report.
//!
//! Nothing in here blocks beyond the ISP bit timing of the frame being
//! dispatched, so the callbacks return before the next USB poll.

use crate::hid::{
    Opcode, StatusFlags, StatusReport, BATCH_COUNT_MASK, BATCH_DATA, BATCH_REPORT_LEN,
    COMMAND_REPORT_LEN, FRAME_OPCODE, FRAME_PAYLOAD, FRAME_SEQUENCE, REPORT_BATCH,
    REPORT_COMMAND,
};
use crate::programmer::{Gpio, IspBitbang};

/// HID-to-ISP bridge state
pub struct HidBridge<G: Gpio> {
    isp: IspBitbang<G>,
    recv: [u8; BATCH_REPORT_LEN],
    offset: usize,
    size: usize,
    sequence: u8,
    reply: [u8; 4],
}

impl<G: Gpio> HidBridge<G> {
    /// Create a bridge driving the given GPIO lines
    ///
    /// The target starts out held in reset.
    pub fn new(gpio: G) -> Self {
        Self {
            isp: IspBitbang::new(gpio),
            recv: [0; BATCH_REPORT_LEN],
            offset: 0,
            size: 0,
            sequence: 0,
            reply: [0; 4],
        }
    }

    /// Handle the setup stage of a SET_REPORT request
    ///
    /// Returns `true` if the report id is accepted and a data stage is
    /// expected. Any partially received frame is discarded.
    pub fn setup_set_report(&mut self, report_id: u8) -> bool {
        self.offset = 0;
        self.size = match report_id {
            REPORT_COMMAND => COMMAND_REPORT_LEN,
            REPORT_BATCH => BATCH_REPORT_LEN,
            _ => 0,
        };
        self.size != 0
    }

    /// Handle one chunk of the SET_REPORT data stage
    ///
    /// Returns `true` once the transfer is complete. Bytes past the end of
    /// the armed frame are dropped.
    pub fn write(&mut self, chunk: &[u8]) -> bool {
        if self.size == 0 {
            return true;
        }

        let len = chunk.len().min(self.size - self.offset);
        self.recv[self.offset..self.offset + len].copy_from_slice(&chunk[..len]);
        self.offset += len;

        if self.offset < self.size {
            return false;
        }

        self.dispatch();
        self.offset = 0;
        self.size = 0;
        true
    }

    /// Build the GET_REPORT answer
    pub fn status_report(&self) -> StatusReport {
        let mut flags = StatusFlags::empty();
        if !self.isp.reset_asserted() {
            flags |= StatusFlags::RESET_RELEASED;
        }
        StatusReport {
            flags,
            sequence: self.sequence,
            reply: self.reply,
        }
    }

    /// Whether a frame is partially received
    pub fn is_receiving(&self) -> bool {
        self.size != 0
    }

    /// Access the ISP driver
    pub fn isp(&self) -> &IspBitbang<G> {
        &self.isp
    }

    /// Mutable access to the ISP driver
    pub fn isp_mut(&mut self) -> &mut IspBitbang<G> {
        &mut self.isp
    }

    fn dispatch(&mut self) {
        self.sequence = self.recv[FRAME_SEQUENCE];
        let opcode = self.recv[FRAME_OPCODE];
        log::trace!(
            "bridge: report of {} bytes, seq 0x{:02X}, opcode {}",
            self.size,
            self.sequence,
            opcode
        );

        match Opcode::from_u8(opcode) {
            Some(Opcode::ResetDevice) => {
                self.isp.set_reset(self.recv[FRAME_PAYLOAD] != 0);
            }
            Some(Opcode::IspCommand) if self.size == COMMAND_REPORT_LEN => {
                let mut cmd = [0u8; 4];
                cmd.copy_from_slice(&self.recv[FRAME_PAYLOAD..FRAME_PAYLOAD + 4]);
                self.reply = self.isp.issue_command(cmd);
            }
            Some(Opcode::IspCommand) => {
                // Every instruction overwrites the reply, the host only
                // sees the last one.
                let count = (self.recv[FRAME_PAYLOAD] & BATCH_COUNT_MASK) as usize;
                for i in 0..count {
                    let start = BATCH_DATA + i * 4;
                    let mut cmd = [0u8; 4];
                    cmd.copy_from_slice(&self.recv[start..start + 4]);
                    self.reply = self.isp.issue_command(cmd);
                }
            }
            None => log::debug!("bridge: ignoring unknown opcode {}", opcode),
        }
    }
}
