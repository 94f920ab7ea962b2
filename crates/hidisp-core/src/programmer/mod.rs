//! Programmer traits and abstractions
//!
//! This module defines the trait every ISP backend implements, plus the
//! bit-banged driver that talks to the target over four GPIO lines.

pub mod bitbang;
mod traits;

pub use bitbang::{Gpio, IspBitbang, Level, Line};
pub use traits::*;
