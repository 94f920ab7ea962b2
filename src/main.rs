//! hidisp - AVR in-system programmer for the HIDBoot USB bridge
//!
//! Programs Atmel AVR microcontrollers through a small USB HID device that
//! bit-bangs the serial programming interface. A run always puts the
//! target in programming mode, identifies it and shows its fuses; flags
//! then select what else happens, in this order:
//!
//! 1. `--write-fuses` programs the low/high fuse bytes
//! 2. `--load` erases the chip and programs an Intel HEX image
//! 3. `--verify` reads flash back and compares it with the image
//! 4. `--start-device` releases reset so the target runs

mod cli;
mod commands;
mod programmers;

use clap::error::ErrorKind;
use clap::Parser;
use cli::Cli;
use commands::FuseRequest;
use hidisp_core::chip::ChipDatabase;
use hidisp_core::flash;
use hidisp_core::ihex::{self, FlashImage};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Unknown flags print usage and exit successfully, like the
        // programmer's traditional command line did.
        Err(e) if e.kind() == ErrorKind::UnknownArgument => {
            eprintln!("{}", e);
            let _ = <Cli as clap::CommandFactory>::command().print_help();
            std::process::exit(0);
        }
        Err(e) => e.exit(),
    };

    // Initialize logger; RUST_LOG overrides the verbosity flags
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    // Load device database
    let db = match load_chip_database(cli.chip_db.as_deref()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load device database: {}", e);
            std::process::exit(1);
        }
    };

    log::debug!("Loaded {} device definitions", db.len());

    if let Err(e) = run(&cli, &db) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Run the programming session described by the command line
fn run(cli: &Cli, db: &ChipDatabase) -> Result<(), Box<dyn std::error::Error>> {
    // Parse the image up front so a bad file never costs an erase
    let image = match cli.image() {
        Some(path) if cli.load || cli.verify => Some(load_image(path)?),
        Some(path) => {
            log::warn!(
                "{} given without --load or --verify, ignoring it",
                path.display()
            );
            None
        }
        None => None,
    };

    if cli.has_fuse_request() && !cli.write_fuses {
        log::warn!("Fuse values given without --write-fuses, not programming them");
    }

    let mut master = programmers::open_programmer(&cli.programmer)?;

    flash::enter_programming_mode(&mut *master)?;
    let ctx = flash::probe(&mut *master, db)?;

    println!(
        "Device: {} ({} bytes flash, {} byte pages)",
        ctx.device.name,
        ctx.total_size(),
        ctx.page_size()
    );
    commands::print_fuses(&mut *master, &ctx)?;

    if cli.write_fuses {
        let request = FuseRequest {
            low: cli.lfuse,
            high: cli.hfuse,
            extended: cli.efuse,
        };
        commands::run_write_fuses(&mut *master, &ctx, request)?;
    }

    if let Some(image) = &image {
        if cli.load {
            commands::run_program(&mut *master, &ctx, image)?;
        }
        if cli.verify {
            commands::run_verify(&mut *master, &ctx, image)?;
        }
    }

    if cli.start_device {
        flash::start_device(&mut *master)?;
        println!("Target released from reset");
    }

    Ok(())
}

/// Parse an Intel HEX file, rejecting files without data
fn load_image(path: &Path) -> Result<FlashImage, Box<dyn std::error::Error>> {
    let image = ihex::load_file(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    if image.is_empty() {
        return Err(format!("{} contains no data records", path.display()).into());
    }
    println!("Read {} bytes from {}", image.len(), path.display());
    Ok(image)
}

/// Load the device database from the specified path or the built-in table
fn load_chip_database(path: Option<&Path>) -> Result<ChipDatabase, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(ChipDatabase::builtin()?);
    };

    let mut db = ChipDatabase::new();
    if path.is_dir() {
        let count = db.load_dir(path)?;
        log::debug!("Loaded {} devices from {}", count, path.display());
    } else if path.is_file() {
        db.load_file(path)?;
    } else {
        return Err(format!("Device database path not found: {}", path.display()).into());
    }

    if db.is_empty() {
        log::warn!("No devices found in {}", path.display());
    }

    Ok(db)
}
