//! Fuse display and programming

use hidisp_core::chip::{AvrDevice, FuseByte};
use hidisp_core::flash::{self, FlashContext, FuseBytes};
use hidisp_core::programmer::IspMaster;
use hidisp_core::Error;
use std::fmt::Write as _;

/// Fuse bytes requested on the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct FuseRequest {
    pub low: Option<u8>,
    pub high: Option<u8>,
    pub extended: Option<u8>,
}

/// Render the fuse bytes with every known field decoded
pub fn format_fuses(device: &AvrDevice, fuses: &FuseBytes) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Fuses: low 0x{:02X}, high 0x{:02X}",
        fuses.low, fuses.high
    );

    for (byte, fields) in device.fuse_groups() {
        let Some(raw) = fuses.get(byte) else {
            let _ = writeln!(out, "{} fuse: not readable", byte);
            continue;
        };
        let _ = writeln!(out, "{} fuse (0x{:02X}):", byte, raw);
        for field in fields {
            let value = field.decode(raw);
            match value.label {
                Some(label) if !label.is_empty() => {
                    let _ = writeln!(out, "  {:<10} {:>3}  {}", field.name, value.value, label);
                }
                Some(_) => {
                    let _ = writeln!(out, "  {:<10} {:>3}  (reserved)", field.name, value.value);
                }
                None => {
                    let _ = writeln!(out, "  {:<10} {:>3}", field.name, value.value);
                }
            }
        }
    }
    out
}

/// Read and print the fuse bytes of the probed device
pub fn print_fuses<M: IspMaster + ?Sized>(
    master: &mut M,
    ctx: &FlashContext,
) -> Result<FuseBytes, Box<dyn std::error::Error>> {
    let fuses = flash::read_fuses(master)?;
    if !ctx.device.has_fuses() {
        log::info!("No fuse layout known for {}", ctx.device.name);
    }
    print!("{}", format_fuses(&ctx.device, &fuses));
    Ok(fuses)
}

/// Program the requested fuse bytes, then show the result
pub fn run_write_fuses<M: IspMaster + ?Sized>(
    master: &mut M,
    ctx: &FlashContext,
    request: FuseRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    if request.extended.is_some() {
        return Err(Error::NotImplemented.into());
    }
    if request.low.is_none() && request.high.is_none() {
        return Err("--write-fuses needs --lfuse and/or --hfuse".into());
    }

    for (byte, value) in [
        (FuseByte::Low, request.low),
        (FuseByte::High, request.high),
    ] {
        if let Some(value) = value {
            println!("Writing {} fuse: 0x{:02X}", byte, value);
            flash::write_fuse(master, ctx, byte, value)?;
        }
    }

    print_fuses(master, ctx)?;
    Ok(())
}
