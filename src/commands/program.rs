//! Erase and program commands

use hidisp_core::flash::{self, FlashContext, ProgramProgress};
use hidisp_core::ihex::FlashImage;
use hidisp_core::programmer::IspMaster;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
    page_size: usize,
}

impl IndicatifProgress {
    /// Create a reporter; `page_size` converts page counts into bytes
    pub fn new(page_size: usize) -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
            page_size,
        }
    }

    fn create_bar(&mut self, total: u64, phase: &'static str) {
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                    phase
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.current_bar = Some(pb);
    }

    fn create_spinner(&mut self, message: String) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    /// Finish the current bar, leaving `message` on screen
    pub fn finish(&mut self, message: &str) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    /// Stop the current bar after a failure
    pub fn abandon(&mut self, message: &str) {
        if let Some(pb) = self.current_bar.take() {
            pb.abandon_with_message(message.to_string());
        }
    }
}

impl ProgramProgress for IndicatifProgress {
    fn writing(&mut self, pages: usize) {
        self.finish("Erase complete");
        self.create_bar((pages * self.page_size) as u64, "Writing");
    }

    fn page_written(&mut self, pages_done: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position((pages_done * self.page_size) as u64);
        }
    }

    fn verifying(&mut self, bytes: usize) {
        self.create_bar(bytes as u64, "Verifying");
    }

    fn verify_progress(&mut self, bytes_done: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(bytes_done as u64);
        }
    }
}

/// Erase the chip and program the image
///
/// The image size is checked before the erase so an oversized image
/// leaves the target untouched.
pub fn run_program<M: IspMaster + ?Sized>(
    master: &mut M,
    ctx: &FlashContext,
    image: &FlashImage,
) -> Result<(), Box<dyn std::error::Error>> {
    flash::check_fits(ctx, image)?;

    let mut progress = IndicatifProgress::new(ctx.page_size());

    progress.create_spinner(format!("Erasing {}...", ctx.device.name));
    if let Err(e) = flash::chip_erase(master, ctx) {
        progress.abandon("Erase failed");
        return Err(e.into());
    }

    match flash::write(master, ctx, image, &mut progress) {
        Ok(pages) => {
            progress.finish("Write complete");
            println!(
                "Wrote {} bytes in {} page(s) of {} bytes",
                image.len(),
                pages,
                ctx.page_size()
            );
            Ok(())
        }
        Err(e) => {
            progress.abandon("Write failed");
            Err(e.into())
        }
    }
}
