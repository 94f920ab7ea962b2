//! Device database for runtime loading and lookup
//!
//! This module provides the `ChipDatabase` type for loading AVR device
//! definitions from RON. The database shipped in `chips/avr.ron` is
//! compiled in and available through [`ChipDatabase::builtin`].

use alloc::{collections::BTreeMap, format, string::String, vec::Vec};
use std::fs;
use std::io;
use std::path::Path;

use super::types::{AvrDevice, FuseByte, FuseField};

/// RON source of the built-in device database
pub const BUILTIN_RON: &str = include_str!("../../../../chips/avr.ron");

/// Error type for chip database operations
#[derive(Debug)]
pub enum ChipDbError {
    /// I/O error reading files
    Io(io::Error),
    /// RON parsing error
    Parse(ron::error::SpannedError),
    /// Validation error
    Validation(String),
}

impl From<io::Error> for ChipDbError {
    fn from(e: io::Error) -> Self {
        ChipDbError::Io(e)
    }
}

impl From<ron::error::SpannedError> for ChipDbError {
    fn from(e: ron::error::SpannedError) -> Self {
        ChipDbError::Parse(e)
    }
}

impl std::fmt::Display for ChipDbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChipDbError::Io(e) => write!(f, "I/O error: {}", e),
            ChipDbError::Parse(e) => write!(f, "Parse error: {}", e),
            ChipDbError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ChipDbError {}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Fuse field definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct FuseFieldDef {
    name: String,
    byte: FuseByte,
    mask: u8,
    #[serde(default)]
    labels: Option<String>,
}

/// Device definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct DeviceDef {
    name: String,
    signature: (u8, u8),
    flash_words: u32,
    page_words: u16,
    #[serde(default)]
    fuses: Option<String>,
}

/// Top-level database file
#[derive(Debug, Clone, serde::Deserialize)]
struct DatabaseDef {
    #[serde(default)]
    labels: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    fuse_sets: BTreeMap<String, Vec<FuseFieldDef>>,
    devices: Vec<DeviceDef>,
}

impl DatabaseDef {
    fn resolve_fuses(&self, set: &str, device: &str) -> Result<Vec<FuseField>, ChipDbError> {
        let defs = self.fuse_sets.get(set).ok_or_else(|| {
            ChipDbError::Validation(format!("{}: unknown fuse set \"{}\"", device, set))
        })?;

        defs.iter()
            .map(|def| {
                if def.mask == 0 {
                    return Err(ChipDbError::Validation(format!(
                        "{}: fuse field {} has an empty mask",
                        device, def.name
                    )));
                }
                let labels = match &def.labels {
                    Some(list) => self.labels.get(list).cloned().ok_or_else(|| {
                        ChipDbError::Validation(format!(
                            "{}: fuse field {} uses unknown label list \"{}\"",
                            device, def.name, list
                        ))
                    })?,
                    None => Vec::new(),
                };
                Ok(FuseField {
                    name: def.name.clone(),
                    byte: def.byte,
                    mask: def.mask,
                    labels,
                })
            })
            .collect()
    }
}

// ============================================================================
// Chip database
// ============================================================================

/// Runtime device database
///
/// Holds the AVR device definitions in file order. Lookups return the
/// first match.
#[derive(Debug, Clone, Default)]
pub struct ChipDatabase {
    devices: Vec<AvrDevice>,
}

impl ChipDatabase {
    /// Create an empty device database
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Parse the compiled-in device database
    pub fn builtin() -> Result<Self, ChipDbError> {
        let mut db = Self::new();
        db.load_ron(BUILTIN_RON)?;
        Ok(db)
    }

    /// Load device definitions from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, ChipDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load device definitions from a RON string
    pub fn load_ron(&mut self, content: &str) -> Result<usize, ChipDbError> {
        let def: DatabaseDef = ron::from_str(content)?;
        let mut devices = Vec::with_capacity(def.devices.len());

        for device_def in &def.devices {
            let page_words = device_def.page_words as u32;
            if page_words == 0 || device_def.flash_words % page_words != 0 {
                return Err(ChipDbError::Validation(format!(
                    "{}: flash size {} words is not a multiple of page size {} words",
                    device_def.name, device_def.flash_words, device_def.page_words
                )));
            }

            let fuses = match &device_def.fuses {
                Some(set) => def.resolve_fuses(set, &device_def.name)?,
                None => Vec::new(),
            };

            devices.push(AvrDevice {
                name: device_def.name.clone(),
                signature: [device_def.signature.0, device_def.signature.1],
                flash_words: device_def.flash_words,
                page_words: device_def.page_words,
                fuses,
            });
        }

        let count = devices.len();
        self.devices.extend(devices);
        Ok(count)
    }

    /// Load all RON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ChipDbError> {
        let mut total = 0;

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "ron") {
                paths.push(path);
            }
        }
        // read_dir order is unspecified, first match must be stable
        paths.sort();

        for path in paths {
            total += self.load_file(&path)?;
        }

        Ok(total)
    }

    /// Get all devices in the database
    pub fn devices(&self) -> &[AvrDevice] {
        &self.devices
    }

    /// Get the number of devices in the database
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Find a device by signature bytes 1 and 2
    pub fn find_by_signature(&self, signature: [u8; 2]) -> Option<&AvrDevice> {
        self.devices
            .iter()
            .find(|d| d.matches_signature(signature))
    }

    /// Find a device by name (case-insensitive exact match)
    pub fn find_by_name(&self, name: &str) -> Option<&AvrDevice> {
        self.devices
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Iterate over all devices
    pub fn iter(&self) -> impl Iterator<Item = &AvrDevice> {
        self.devices.iter()
    }
}
