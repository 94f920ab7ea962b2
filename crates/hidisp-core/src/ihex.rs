//! Intel HEX image loader
//!
//! Only data records (type 00) are applied to the image, and only their
//! checksums are checked. Every other record type is skipped unread, so
//! images that rely on extended segment or linear addressing load as if
//! those records were absent.
//! Bytes not covered by any record read as erased flash (`0xFF`).

use alloc::vec::Vec;
use core::fmt;

use crate::isp::ERASED_VALUE;

/// Record start marker
pub const RECORD_MARK: char = ':';

/// Record type of a data record
pub const RECORD_DATA: u8 = 0x00;

/// Error type for Intel HEX parsing
#[derive(Debug)]
pub enum IhexError {
    /// A line starting with the record marker is not a well-formed record
    InvalidRecord {
        /// 1-based line number
        line: usize,
    },
    /// A record's checksum does not match its contents
    Checksum {
        /// 1-based line number
        line: usize,
        /// Checksum computed over the record
        expected: u8,
        /// Checksum stored in the record
        found: u8,
    },
    /// The file could not be read
    #[cfg(feature = "std")]
    Io(std::io::Error),
}

#[cfg(feature = "std")]
impl From<std::io::Error> for IhexError {
    fn from(e: std::io::Error) -> Self {
        IhexError::Io(e)
    }
}

impl fmt::Display for IhexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IhexError::InvalidRecord { line } => write!(f, "line {}: malformed record", line),
            IhexError::Checksum {
                line,
                expected,
                found,
            } => write!(
                f,
                "line {}: checksum mismatch (computed 0x{:02X}, record has 0x{:02X})",
                line, expected, found
            ),
            #[cfg(feature = "std")]
            IhexError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IhexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IhexError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// A zero-based flash image
///
/// The length is the highest written address plus one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashImage {
    data: Vec<u8>,
}

impl FlashImage {
    /// Create an image from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Image size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image holds no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Image contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Byte at `addr`, or the erased value past the end of the image
    pub fn byte_or_erased(&self, addr: usize) -> u8 {
        self.data.get(addr).copied().unwrap_or(ERASED_VALUE)
    }

    fn write(&mut self, addr: usize, bytes: &[u8]) {
        let end = addr + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, ERASED_VALUE);
        }
        self.data[addr..end].copy_from_slice(bytes);
    }
}

fn hex_byte(s: &[u8], pos: usize) -> Option<u8> {
    let pair = s.get(pos..pos + 2)?;
    let hi = (pair[0] as char).to_digit(16)?;
    let lo = (pair[1] as char).to_digit(16)?;
    Some((hi << 4 | lo) as u8)
}

/// Parse Intel HEX text into a flash image
///
/// Lines that do not start with `:` are ignored. A malformed record header,
/// or a malformed or mismatching data record, fails the whole parse.
pub fn parse(text: &str) -> Result<FlashImage, IhexError> {
    let mut image = FlashImage::default();
    let mut data = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = idx + 1;
        let Some(record) = raw_line.trim_end().strip_prefix(RECORD_MARK) else {
            continue;
        };
        let record = record.as_bytes();
        let invalid = || IhexError::InvalidRecord { line };

        let count = hex_byte(record, 0).ok_or_else(invalid)?;
        let addr_hi = hex_byte(record, 2).ok_or_else(invalid)?;
        let addr_lo = hex_byte(record, 4).ok_or_else(invalid)?;
        let kind = hex_byte(record, 6).ok_or_else(invalid)?;
        if kind != RECORD_DATA {
            log::trace!("ihex: line {}: skipping record type {:02X}", line, kind);
            continue;
        }

        data.clear();
        for i in 0..count as usize {
            data.push(hex_byte(record, 8 + i * 2).ok_or_else(invalid)?);
        }
        let found = hex_byte(record, 8 + count as usize * 2).ok_or_else(invalid)?;

        let sum = data
            .iter()
            .fold(
                count
                    .wrapping_add(addr_hi)
                    .wrapping_add(addr_lo)
                    .wrapping_add(kind),
                |acc, &b| acc.wrapping_add(b),
            );
        let expected = sum.wrapping_neg();
        if expected != found {
            return Err(IhexError::Checksum {
                line,
                expected,
                found,
            });
        }

        let addr = u16::from_be_bytes([addr_hi, addr_lo]) as usize;
        image.write(addr, &data);
    }

    Ok(image)
}

/// Read and parse an Intel HEX file
#[cfg(feature = "std")]
pub fn load_file<P: AsRef<std::path::Path>>(path: P) -> Result<FlashImage, IhexError> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::String;
    use alloc::vec;

    /// Build a record line with a correct checksum
    fn record(addr: u16, kind: u8, data: &[u8]) -> String {
        let mut bytes = vec![data.len() as u8, (addr >> 8) as u8, addr as u8, kind];
        bytes.extend_from_slice(data);
        let sum = bytes.iter().fold(0u8, |a, &b| a.wrapping_add(b));
        bytes.push(sum.wrapping_neg());
        let mut line = String::from(":");
        for b in bytes {
            line.push_str(&format!("{:02X}", b));
        }
        line
    }

    #[test]
    fn test_known_record() {
        let image = parse(":0400000001020304F2\n:00000001FF\n").unwrap();
        assert_eq!(image.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_size_is_highest_address_plus_count() {
        let text = format!(
            "{}\n{}\n{}\n",
            record(0x0010, 0, &[0xAA; 16]),
            record(0x0100, 0, &[0x55; 3]),
            record(0x0000, 0, &[0x11; 2]),
        );
        let image = parse(&text).unwrap();
        assert_eq!(image.len(), 0x0103);
        assert_eq!(image.byte_or_erased(0x0001), 0x11);
        assert_eq!(image.byte_or_erased(0x0002), 0xFF);
        assert_eq!(image.byte_or_erased(0x001F), 0xAA);
        assert_eq!(image.byte_or_erased(0x0020), 0xFF);
        assert_eq!(image.byte_or_erased(0x0102), 0x55);
        assert_eq!(image.byte_or_erased(0x0103), 0xFF);
    }

    #[test]
    fn test_checksum_mutation_rejects_image() {
        let good = record(0x0000, 0, &[0xDE, 0xAD, 0xBE, 0xEF]);
        let cut = good.len() - 2;
        let stored = u8::from_str_radix(&good[cut..], 16).unwrap();

        for delta in [1u8, 0x10, 0x80, 0xFF] {
            let bad = format!("{}{:02X}", &good[..cut], stored.wrapping_add(delta));
            let text = format!("{}\n{}\n", record(0x0010, 0, &[1, 2]), bad);
            match parse(&text) {
                Err(IhexError::Checksum { line, found, .. }) => {
                    assert_eq!(line, 2);
                    assert_eq!(found, stored.wrapping_add(delta));
                }
                other => panic!("expected checksum error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_non_data_records_skipped() {
        let text = format!(
            "{}\n{}\n{}\n{}\n",
            record(0x0000, 0x04, &[0x00, 0x01]),
            record(0x0000, 0, &[0x42]),
            record(0x0000, 0x03, &[0, 0, 0, 0]),
            record(0x0000, 0x01, &[]),
        );
        let image = parse(&text).unwrap();
        assert_eq!(image.as_bytes(), &[0x42]);
    }

    #[test]
    fn test_skipped_record_checksum_not_checked() {
        let image = parse(":0400000001020304F2\n:00000001FE\n").unwrap();
        assert_eq!(image.as_bytes(), &[1, 2, 3, 4]);

        let image = parse(":020000040001F0\n:0100000042BD\n").unwrap();
        assert_eq!(image.as_bytes(), &[0x42]);
    }

    #[test]
    fn test_non_record_lines_ignored() {
        let text = format!("# comment\n\n{}\r\nS00600004844521B\n", record(2, 0, &[7]));
        let image = parse(&text).unwrap();
        assert_eq!(image.as_bytes(), &[0xFF, 0xFF, 7]);
    }

    #[test]
    fn test_truncated_record() {
        assert!(matches!(
            parse(":0400000001020304\n"),
            Err(IhexError::InvalidRecord { line: 1 })
        ));
        assert!(matches!(
            parse(":04000000010G0304F2\n"),
            Err(IhexError::InvalidRecord { line: 1 })
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").unwrap().is_empty());
    }
}
