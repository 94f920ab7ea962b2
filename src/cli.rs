//! CLI argument parsing

use crate::programmers;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// Parse a fuse byte given as hex (`0xE1`, `E1`) or decimal with a `#` prefix
fn parse_fuse_byte(s: &str) -> Result<u8, String> {
    if let Some(dec) = s.strip_prefix('#') {
        return dec.parse::<u8>().map_err(|e| format!("Invalid number: {}", e));
    }
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser, Debug)]
#[command(name = "hidisp")]
#[command(
    author,
    version,
    about = "AVR in-system programmer for the HIDBoot USB bridge",
    long_about = None
)]
#[command(group(ArgGroup::new("image").args(["file", "file_pos"])))]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Programmer to use
    #[arg(short, long, default_value = "hidboot", help = programmer_help())]
    pub programmer: String,

    /// Device database (a .ron file or a directory of .ron files)
    /// Defaults to the built-in table
    #[arg(long)]
    pub chip_db: Option<PathBuf>,

    /// Erase the chip and program FILE into flash
    #[arg(long, requires = "image")]
    pub load: bool,

    /// Read flash back and compare it with FILE
    #[arg(long, requires = "image")]
    pub verify: bool,

    /// Release the reset line when done so the target runs
    #[arg(long)]
    pub start_device: bool,

    /// Program the fuse bytes given with --lfuse/--hfuse
    #[arg(long)]
    pub write_fuses: bool,

    /// Low fuse byte (hex)
    #[arg(long, value_name = "HEX", value_parser = parse_fuse_byte)]
    pub lfuse: Option<u8>,

    /// High fuse byte (hex)
    #[arg(long, value_name = "HEX", value_parser = parse_fuse_byte)]
    pub hfuse: Option<u8>,

    /// Extended fuse byte (hex, not supported by the programmer)
    #[arg(long, value_name = "HEX", value_parser = parse_fuse_byte)]
    pub efuse: Option<u8>,

    /// Intel HEX image
    #[arg(short = 'f', long = "file", value_name = "FILE", conflicts_with = "file_pos")]
    pub file: Option<PathBuf>,

    /// Intel HEX image
    #[arg(value_name = "FILE", id = "file_pos")]
    pub file_pos: Option<PathBuf>,
}

impl Cli {
    /// The image path, whether given positionally or with `--file`
    pub fn image(&self) -> Option<&PathBuf> {
        self.file.as_ref().or(self.file_pos.as_ref())
    }

    /// Default log filter for the requested verbosity
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Whether any fuse byte was given on the command line
    pub fn has_fuse_request(&self) -> bool {
        self.lfuse.is_some() || self.hfuse.is_some() || self.efuse.is_some()
    }
}
