//! HID feature report wire format
//!
//! Shared between the host client and the programmer-side bridge. The
//! programmer exposes three vendor feature reports:
//!
//! | id | direction | length | layout |
//! |----|-----------|--------|--------|
//! | 1 | device to host | 7 | status flags, echoed sequence, last ISP reply (4), reserved |
//! | 2 | host to device | 7 | report id, sequence, opcode, payload (4) |
//! | 3 | host to device | 133 | report id, sequence, opcode, count, up to 31 ISP instructions |
//!
//! The status report has no report id byte of its own: byte 0 carries the
//! status flags instead.

use bitflags::bitflags;
use heapless::Vec;

use crate::error::{Error, Result};
use crate::isp::Command;

/// Status report (device to host)
pub const REPORT_STATUS: u8 = 1;
/// Single command frame (host to device)
pub const REPORT_COMMAND: u8 = 2;
/// Batched command frame (host to device)
pub const REPORT_BATCH: u8 = 3;

/// Length of the status report
pub const STATUS_REPORT_LEN: usize = 7;
/// Length of a single command frame, including the report id
pub const COMMAND_REPORT_LEN: usize = 7;
/// Length of a batched command frame, including the report id
pub const BATCH_REPORT_LEN: usize = 133;

/// Largest number of ISP instructions in one batch frame
pub const MAX_BATCH_COMMANDS: usize = 31;
/// Bits of the count byte that hold the instruction count
pub const BATCH_COUNT_MASK: u8 = 0x1F;

/// Offset of the sequence number in host-to-device frames
pub const FRAME_SEQUENCE: usize = 1;
/// Offset of the opcode in host-to-device frames
pub const FRAME_OPCODE: usize = 2;
/// Offset of the payload (single frame) or count byte (batch frame)
pub const FRAME_PAYLOAD: usize = 3;
/// Offset of the first instruction in a batch frame
pub const BATCH_DATA: usize = 4;

/// Offset of the status flags in the status report
pub const STATUS_FLAGS: usize = 0;
/// Offset of the echoed sequence number in the status report
pub const STATUS_SEQUENCE: usize = 1;
/// Offset of the ISP reply in the status report
pub const STATUS_REPLY: usize = 2;

/// Bridge opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Drive the target reset line; payload byte 0 non-zero asserts it
    ResetDevice = 1,
    /// Clock ISP instructions into the target
    IspCommand = 2,
}

impl Opcode {
    /// Decode an opcode byte
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::ResetDevice),
            2 => Some(Self::IspCommand),
            _ => None,
        }
    }
}

bitflags! {
    /// Status report flags (byte 0)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusFlags: u8 {
        /// The reset line is high, the target is running
        const RESET_RELEASED = 0x02;
    }
}

/// A single host-to-device command frame (report 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    /// Sequence number, echoed back in the status report
    pub sequence: u8,
    /// Bridge opcode
    pub opcode: Opcode,
    /// Opcode payload
    pub payload: [u8; 4],
}

impl CommandFrame {
    /// Frame carrying one ISP instruction
    pub const fn isp(sequence: u8, cmd: Command) -> Self {
        Self {
            sequence,
            opcode: Opcode::IspCommand,
            payload: cmd.0,
        }
    }

    /// Frame driving the reset line
    pub const fn reset(sequence: u8, asserted: bool) -> Self {
        Self {
            sequence,
            opcode: Opcode::ResetDevice,
            payload: [asserted as u8, 0, 0, 0],
        }
    }

    /// Serialize to report bytes
    pub fn encode(&self) -> [u8; COMMAND_REPORT_LEN] {
        let mut buf = [0u8; COMMAND_REPORT_LEN];
        buf[0] = REPORT_COMMAND;
        buf[FRAME_SEQUENCE] = self.sequence;
        buf[FRAME_OPCODE] = self.opcode as u8;
        buf[FRAME_PAYLOAD..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse report bytes
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < COMMAND_REPORT_LEN || buf[0] != REPORT_COMMAND {
            return Err(Error::InvalidFrame);
        }
        let opcode = Opcode::from_u8(buf[FRAME_OPCODE]).ok_or(Error::InvalidFrame)?;
        let mut payload = [0u8; 4];
        payload.copy_from_slice(&buf[FRAME_PAYLOAD..COMMAND_REPORT_LEN]);
        Ok(Self {
            sequence: buf[FRAME_SEQUENCE],
            opcode,
            payload,
        })
    }
}

/// A batched host-to-device frame (report 3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFrame {
    /// Sequence number, echoed back in the status report
    pub sequence: u8,
    /// ISP instructions, executed in order
    pub commands: Vec<[u8; 4], MAX_BATCH_COMMANDS>,
}

impl BatchFrame {
    /// Build a batch from ISP instructions
    ///
    /// Fails with [`Error::InvalidFrame`] if more than
    /// [`MAX_BATCH_COMMANDS`] instructions are given.
    pub fn new(sequence: u8, cmds: &[Command]) -> Result<Self> {
        let mut commands = Vec::new();
        for cmd in cmds {
            commands.push(cmd.0).map_err(|_| Error::InvalidFrame)?;
        }
        Ok(Self { sequence, commands })
    }

    /// Serialize to report bytes
    pub fn encode(&self) -> [u8; BATCH_REPORT_LEN] {
        let mut buf = [0u8; BATCH_REPORT_LEN];
        buf[0] = REPORT_BATCH;
        buf[FRAME_SEQUENCE] = self.sequence;
        buf[FRAME_OPCODE] = Opcode::IspCommand as u8;
        buf[FRAME_PAYLOAD] = self.commands.len() as u8;
        for (i, cmd) in self.commands.iter().enumerate() {
            let start = BATCH_DATA + i * 4;
            buf[start..start + 4].copy_from_slice(cmd);
        }
        buf
    }
}

/// Device-to-host status report (report 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusReport {
    /// Live line state
    pub flags: StatusFlags,
    /// Sequence number of the last completed frame
    pub sequence: u8,
    /// Response bytes of the last ISP instruction
    pub reply: [u8; 4],
}

impl StatusReport {
    /// Whether the target is held in reset
    pub fn reset_asserted(&self) -> bool {
        !self.flags.contains(StatusFlags::RESET_RELEASED)
    }

    /// Serialize to report bytes
    pub fn encode(&self) -> [u8; STATUS_REPORT_LEN] {
        let mut buf = [0u8; STATUS_REPORT_LEN];
        buf[STATUS_FLAGS] = self.flags.bits();
        buf[STATUS_SEQUENCE] = self.sequence;
        buf[STATUS_REPLY..STATUS_REPLY + 4].copy_from_slice(&self.reply);
        buf
    }

    /// Parse report bytes
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < STATUS_REPLY + 4 {
            return Err(Error::InvalidFrame);
        }
        let mut reply = [0u8; 4];
        reply.copy_from_slice(&buf[STATUS_REPLY..STATUS_REPLY + 4]);
        Ok(Self {
            flags: StatusFlags::from_bits_truncate(buf[STATUS_FLAGS]),
            sequence: buf[STATUS_SEQUENCE],
            reply,
        })
    }
}
