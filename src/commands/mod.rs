//! CLI command implementations
//!
//! Each command takes an already opened [`IspMaster`] with the target in
//! programming mode and the [`FlashContext`] found by probing. The order
//! in which they run is decided in `main`.
//!
//! [`IspMaster`]: hidisp_core::programmer::IspMaster
//! [`FlashContext`]: hidisp_core::flash::FlashContext

mod fuses;
mod program;
mod verify;

pub use fuses::{print_fuses, run_write_fuses, FuseRequest};
pub use program::{run_program, IndicatifProgress};
pub use verify::run_verify;
