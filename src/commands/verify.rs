//! Verify command implementation

use super::IndicatifProgress;
use hidisp_core::flash::{self, FlashContext};
use hidisp_core::ihex::FlashImage;
use hidisp_core::programmer::IspMaster;

/// Read flash back and compare it with the image
///
/// Every differing byte is listed before the command fails.
pub fn run_verify<M: IspMaster + ?Sized>(
    master: &mut M,
    ctx: &FlashContext,
    image: &FlashImage,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut progress = IndicatifProgress::new(ctx.page_size());

    let report = match flash::verify(master, ctx, image, &mut progress) {
        Ok(report) => report,
        Err(e) => {
            progress.abandon("Verification aborted");
            return Err(e.into());
        }
    };

    if report.is_ok() {
        progress.finish("Verification passed");
        println!("Verified {} bytes", report.bytes_checked);
        return Ok(());
    }

    progress.abandon("Verification failed!");
    for m in &report.mismatches {
        eprintln!(
            "Error verifying at 0x{:04X}: expected 0x{:02X}, got 0x{:02X}",
            m.address, m.expected, m.found
        );
    }
    report.into_result()?;
    Ok(())
}
