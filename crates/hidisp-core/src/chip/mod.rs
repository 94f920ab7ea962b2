//! AVR device registry and fuse model
//!
//! This module provides the device descriptors used to size flash
//! operations, the fuse field decoder, and (with `std`) a database of known
//! devices loaded from RON.

mod types;

#[cfg(feature = "std")]
mod database;

pub use types::*;

#[cfg(feature = "std")]
pub use database::*;
