//! hidisp-hid - Host side of the HID ISP bridge
//!
//! This crate talks to a programmer running the HID bridge firmware. Each
//! ISP instruction travels as a vendor feature report; the programmer
//! clocks it into the target and the host reads the reply back with a
//! status report that echoes the frame's sequence number.
//!
//! # Protocol Overview
//!
//! - SET_REPORT id 2: one ISP instruction or a reset line change
//! - SET_REPORT id 3: up to 31 ISP instructions, only the last reply kept
//! - GET_REPORT id 1: reset line state, echoed sequence, last reply
//!
//! A round trip is one SET_REPORT followed by one GET_REPORT. The echoed
//! sequence number must match the one just sent, otherwise the exchange
//! failed with [`HidError::ProtocolDesync`].
//!
//! # Example
//!
//! ```no_run
//! use hidisp_hid::{HidIsp, UsbHidTransport};
//! use hidisp_core::chip::ChipDatabase;
//! use hidisp_core::flash;
//!
//! let transport = UsbHidTransport::open_hidboot()?;
//! let mut isp = HidIsp::new(transport);
//! let db = ChipDatabase::builtin()?;
//!
//! flash::enter_programming_mode(&mut isp)?;
//! let ctx = flash::probe(&mut isp, &db)?;
//! println!("Found {}", ctx.device.name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;

#[cfg(feature = "std")]
pub mod device;

// Re-exports
pub use client::HidIsp;
pub use error::{HidError, Result};
pub use transport::FeatureTransport;

#[cfg(feature = "std")]
pub use device::UsbHidTransport;
