//! HID bridge client
//!
//! [`HidIsp`] owns the transport and the sequence counter. Every exchange
//! is strictly one SET_REPORT followed by one GET_REPORT; nothing is
//! pipelined.

use std::time::Duration;

use hidisp_core::hid::{
    BatchFrame, CommandFrame, Opcode, StatusReport, MAX_BATCH_COMMANDS, REPORT_STATUS,
    STATUS_REPLY,
};
use hidisp_core::isp::{Command, Response};
use hidisp_core::programmer::IspMaster;

use crate::error::{HidError, Result};
use crate::protocol::{INITIAL_SEQUENCE, STATUS_TRANSFER_LEN};
use crate::transport::FeatureTransport;

/// ISP master speaking the HID bridge protocol
pub struct HidIsp<T: FeatureTransport> {
    transport: T,
    sequence: u8,
}

impl<T: FeatureTransport> HidIsp<T> {
    /// Wrap a transport, starting at the default sequence number
    pub fn new(transport: T) -> Self {
        Self::with_sequence(transport, INITIAL_SEQUENCE)
    }

    /// Wrap a transport, starting at the given sequence number
    pub fn with_sequence(transport: T, sequence: u8) -> Self {
        Self {
            transport,
            sequence,
        }
    }

    /// Sequence number the next frame will carry
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Send one command frame and return the reply bytes
    pub fn send_command(&mut self, opcode: Opcode, payload: [u8; 4]) -> Result<[u8; 4]> {
        let sequence = self.next_sequence();
        let frame = CommandFrame {
            sequence,
            opcode,
            payload,
        };
        log::trace!("hid: send {:02X?}", frame.encode());
        self.exchange(&frame.encode(), sequence)
    }

    /// Send up to 31 ISP instructions in one frame
    ///
    /// Returns the reply of the last instruction only.
    pub fn send_batch(&mut self, cmds: &[Command]) -> Result<[u8; 4]> {
        if cmds.len() > MAX_BATCH_COMMANDS {
            return Err(HidError::Core(hidisp_core::Error::InvalidFrame));
        }
        let sequence = self.next_sequence();
        let frame = BatchFrame::new(sequence, cmds)?;
        log::trace!("hid: send batch of {} (seq 0x{:02X})", cmds.len(), sequence);
        self.exchange(&frame.encode(), sequence)
    }

    /// Read the status report without sending anything
    pub fn status(&mut self) -> Result<StatusReport> {
        let mut buf = [0u8; STATUS_TRANSFER_LEN];
        let len = self.transport.get_feature_report(REPORT_STATUS, &mut buf)?;
        if len < STATUS_REPLY + 4 {
            return Err(HidError::ShortReport(len));
        }
        log::trace!("hid: recv {:02X?}", &buf[..len]);
        Ok(StatusReport::decode(&buf[..len])?)
    }

    /// Access the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Take the current sequence number and advance the counter
    ///
    /// The counter moves on whether or not the exchange succeeds.
    fn next_sequence(&mut self) -> u8 {
        let sequence = self.sequence;
        self.sequence = sequence.wrapping_add(1);
        sequence
    }

    fn exchange(&mut self, report: &[u8], sequence: u8) -> Result<[u8; 4]> {
        self.transport.set_feature_report(report)?;
        let status = self.status()?;
        if status.sequence != sequence {
            return Err(HidError::ProtocolDesync {
                sent: sequence,
                received: status.sequence,
            });
        }
        Ok(status.reply)
    }
}

impl<T: FeatureTransport> IspMaster for HidIsp<T> {
    fn transact(&mut self, cmd: Command) -> hidisp_core::Result<Response> {
        let reply = self
            .send_command(Opcode::IspCommand, cmd.bytes())
            .inspect_err(|e| log::debug!("ISP command {:02X?} failed: {}", cmd.bytes(), e))?;
        Ok(Response(reply))
    }

    fn transact_batch(&mut self, cmds: &[Command]) -> hidisp_core::Result<Response> {
        let mut last = Response::default();
        for chunk in cmds.chunks(MAX_BATCH_COMMANDS) {
            let reply = self
                .send_batch(chunk)
                .inspect_err(|e| log::debug!("ISP batch failed: {}", e))?;
            last = Response(reply);
        }
        Ok(last)
    }

    fn set_reset(&mut self, asserted: bool) -> hidisp_core::Result<()> {
        self.send_command(Opcode::ResetDevice, [asserted as u8, 0, 0, 0])?;
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(us as u64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hidisp_core::bridge::HidBridge;
    use hidisp_core::chip::ChipDatabase;
    use hidisp_core::flash::{self, NoProgress};
    use hidisp_core::ihex::FlashImage;
    use hidisp_dummy::{DummyAvr, SimulatedGpio};

    /// Feeds reports into a bridge in 8-byte chunks, like a low-speed
    /// device receives them
    struct Loopback {
        bridge: HidBridge<SimulatedGpio>,
        reports: usize,
        fail_next: bool,
        sequence_skew: u8,
    }

    impl Loopback {
        fn new() -> Self {
            Self {
                bridge: HidBridge::new(SimulatedGpio::new(DummyAvr::new_default())),
                reports: 0,
                fail_next: false,
                sequence_skew: 0,
            }
        }

        fn avr(&self) -> &DummyAvr {
            self.bridge.isp().gpio().avr()
        }
    }

    impl FeatureTransport for Loopback {
        fn set_feature_report(&mut self, data: &[u8]) -> Result<()> {
            if self.fail_next {
                self.fail_next = false;
                return Err(HidError::Io("injected".to_string()));
            }
            self.reports += 1;
            assert!(self.bridge.setup_set_report(data[0]));
            for chunk in data.chunks(8) {
                self.bridge.write(chunk);
            }
            Ok(())
        }

        fn get_feature_report(&mut self, report_id: u8, buf: &mut [u8]) -> Result<usize> {
            assert_eq!(report_id, REPORT_STATUS);
            let mut status = self.bridge.status_report();
            status.sequence = status.sequence.wrapping_add(self.sequence_skew);
            let bytes = status.encode();
            let len = bytes.len().min(buf.len());
            buf[..len].copy_from_slice(&bytes[..len]);
            Ok(len)
        }
    }

    /// Answers every GET_REPORT with too few bytes
    struct Truncating;

    impl FeatureTransport for Truncating {
        fn set_feature_report(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        fn get_feature_report(&mut self, _report_id: u8, buf: &mut [u8]) -> Result<usize> {
            buf[..3].fill(0);
            Ok(3)
        }
    }

    #[test]
    fn test_sequence_advances_and_wraps() {
        let mut isp = HidIsp::new(Loopback::new());
        assert_eq!(isp.sequence(), 0x3a);
        isp.send_command(Opcode::ResetDevice, [0; 4]).unwrap();
        assert_eq!(isp.sequence(), 0x3b);

        let mut isp = HidIsp::with_sequence(Loopback::new(), 0xff);
        isp.send_command(Opcode::ResetDevice, [1, 0, 0, 0]).unwrap();
        assert_eq!(isp.sequence(), 0x00);
        isp.send_command(Opcode::ResetDevice, [1, 0, 0, 0]).unwrap();
        assert_eq!(isp.status().unwrap().sequence, 0x00);
    }

    #[test]
    fn test_desync_detected() {
        let mut transport = Loopback::new();
        transport.sequence_skew = 1;
        let mut isp = HidIsp::new(transport);

        match isp.send_command(Opcode::IspCommand, Command::poll_ready().bytes()) {
            Err(HidError::ProtocolDesync { sent, received }) => {
                assert_eq!(sent, 0x3a);
                assert_eq!(received, 0x3b);
            }
            other => panic!("expected desync, got {:?}", other),
        }
        assert_eq!(isp.sequence(), 0x3b);

        let err = isp.transact(Command::poll_ready()).unwrap_err();
        assert!(matches!(err, hidisp_core::Error::ProtocolDesync { .. }));
    }

    #[test]
    fn test_transport_error_still_advances_sequence() {
        let mut transport = Loopback::new();
        transport.fail_next = true;
        let mut isp = HidIsp::new(transport);

        assert!(matches!(
            isp.send_command(Opcode::ResetDevice, [0; 4]),
            Err(HidError::Io(_))
        ));
        assert_eq!(isp.sequence(), 0x3b);
        assert!(isp.send_command(Opcode::ResetDevice, [0; 4]).is_ok());
    }

    #[test]
    fn test_short_status_report() {
        let mut isp = HidIsp::new(Truncating);
        assert!(matches!(
            isp.send_command(Opcode::ResetDevice, [0; 4]),
            Err(HidError::ShortReport(3))
        ));
    }

    #[test]
    fn test_reset_reflected_in_status() {
        let mut isp = HidIsp::new(Loopback::new());
        isp.set_reset(false).unwrap();
        assert!(!isp.status().unwrap().reset_asserted());
        isp.set_reset(true).unwrap();
        assert!(isp.status().unwrap().reset_asserted());
    }

    #[test]
    fn test_batch_limit() {
        let mut isp = HidIsp::new(Loopback::new());
        let cmds = [Command::poll_ready(); MAX_BATCH_COMMANDS + 1];
        assert!(matches!(
            isp.send_batch(&cmds),
            Err(HidError::Core(hidisp_core::Error::InvalidFrame))
        ));
        assert_eq!(isp.transport().reports, 0);

        // transact_batch splits instead
        isp.transact_batch(&cmds).unwrap();
        assert_eq!(isp.transport().reports, 2);
    }

    #[test]
    fn test_program_through_full_stack() {
        let db = ChipDatabase::builtin().unwrap();
        let mut isp = HidIsp::new(Loopback::new());

        flash::enter_programming_mode(&mut isp).unwrap();
        let ctx = flash::probe(&mut isp, &db).unwrap();
        assert_eq!(ctx.device.name, "ATMega8");
        assert_eq!(ctx.device.flash_words, 4096);

        let image = FlashImage::from_bytes((0..100u8).collect());
        flash::chip_erase(&mut isp, &ctx).unwrap();
        let pages = flash::write(&mut isp, &ctx, &image, &mut NoProgress).unwrap();
        assert_eq!(pages, 2);

        let report = flash::verify(&mut isp, &ctx, &image, &mut NoProgress).unwrap();
        assert!(report.is_ok());

        let avr = isp.transport().avr();
        assert_eq!(avr.page_writes().len(), 2);
        assert_eq!(&avr.flash()[..100], image.as_bytes());

        flash::start_device(&mut isp).unwrap();
        assert!(!isp.status().unwrap().reset_asserted());
    }
}
