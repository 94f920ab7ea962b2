//! hidisp-core - Core library for AVR in-system programming
//!
//! This crate holds everything that does not depend on a particular USB
//! stack: the 4-byte ISP instruction set, the bit-banged ISP driver and the
//! HID bridge that runs on the programmer side, the feature report wire
//! format shared by both ends, the AVR device/fuse registry, the Intel HEX
//! loader and the erase/program/verify sequencing.
//!
//! It is `no_std` by default so the bridge and driver can be built for the
//! programmer firmware.
//!
//! # Features
//!
//! - `alloc` - Device descriptors, flash images and the orchestrator
//! - `std` - RON device database and file loading (includes `alloc`)
//!
//! # Example
//!
//! ```ignore
//! use hidisp_core::chip::ChipDatabase;
//! use hidisp_core::flash::{self, NoProgress};
//! use hidisp_core::{ihex, programmer::IspMaster};
//!
//! fn program<M: IspMaster>(master: &mut M, db: &ChipDatabase) -> hidisp_core::Result<()> {
//!     flash::enter_programming_mode(master)?;
//!     let ctx = flash::probe(master, db)?;
//!     let image = ihex::parse(":0400000001020304F2\n").unwrap();
//!     flash::chip_erase(master, &ctx)?;
//!     flash::write(master, &ctx, &image, &mut NoProgress)?;
//!     flash::verify(master, &ctx, &image, &mut NoProgress)?.into_result()?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bridge;
#[cfg(feature = "alloc")]
pub mod chip;
pub mod error;
#[cfg(feature = "alloc")]
pub mod flash;
pub mod hid;
#[cfg(feature = "alloc")]
pub mod ihex;
pub mod isp;
pub mod programmer;

pub use error::{Error, Result, TransportErrorKind};
