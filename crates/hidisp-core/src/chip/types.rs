//! AVR device and fuse type definitions

use alloc::{string::String, vec::Vec};

/// Which of the target's fuse bytes a field lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum FuseByte {
    /// Low fuse byte
    Low,
    /// High fuse byte
    High,
    /// Extended fuse byte
    Extended,
}

impl FuseByte {
    /// Byte index (0 = low, 1 = high, 2 = extended)
    pub const fn index(self) -> u8 {
        match self {
            FuseByte::Low => 0,
            FuseByte::High => 1,
            FuseByte::Extended => 2,
        }
    }

    /// Look up a fuse byte by index
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(FuseByte::Low),
            1 => Some(FuseByte::High),
            2 => Some(FuseByte::Extended),
            _ => None,
        }
    }

    /// Human readable name
    pub const fn name(self) -> &'static str {
        match self {
            FuseByte::Low => "low",
            FuseByte::High => "high",
            FuseByte::Extended => "extended",
        }
    }
}

impl core::fmt::Display for FuseByte {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A named bit-field inside one fuse byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuseField {
    /// Field name as in the datasheet (e.g. "CKSEL")
    pub name: String,
    /// Fuse byte holding the field
    pub byte: FuseByte,
    /// Bit mask within the byte
    pub mask: u8,
    /// Labels indexed by the decoded value; empty strings mark reserved
    /// values. Empty when the field has no labels.
    pub labels: Vec<String>,
}

impl FuseField {
    /// Number of bits the raw byte is shifted right before masking
    pub const fn shift(&self) -> u32 {
        if self.mask == 0 {
            0
        } else {
            self.mask.trailing_zeros()
        }
    }

    /// Decode this field from a raw fuse byte
    pub fn decode(&self, raw: u8) -> FuseValue<'_> {
        decode_fuse_field(raw, self)
    }
}

/// A decoded fuse field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseValue<'a> {
    /// Field value, shifted down to bit 0
    pub value: u8,
    /// Label for the value, if the field has a label table covering it
    pub label: Option<&'a str>,
}

/// Decode a fuse field from a raw fuse byte
///
/// The raw byte is shifted right until the lowest set bit of the mask sits
/// at bit 0, then masked. The label, if any, is looked up by the resulting
/// value and may be empty for reserved values.
pub fn decode_fuse_field(raw: u8, field: &FuseField) -> FuseValue<'_> {
    let shift = field.shift();
    let value = (raw >> shift) & (field.mask >> shift);
    let label = field.labels.get(value as usize).map(String::as_str);
    FuseValue { value, label }
}

/// AVR device descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvrDevice {
    /// Part name
    pub name: String,
    /// Signature bytes 1 and 2 (byte 0 is the vendor code)
    pub signature: [u8; 2],
    /// Flash size in 16-bit words
    pub flash_words: u32,
    /// Page size in 16-bit words
    pub page_words: u16,
    /// Fuse fields in declaration order
    pub fuses: Vec<FuseField>,
}

impl AvrDevice {
    /// Flash size in bytes
    pub const fn flash_bytes(&self) -> usize {
        self.flash_words as usize * 2
    }

    /// Page size in bytes
    pub const fn page_bytes(&self) -> usize {
        self.page_words as usize * 2
    }

    /// Number of pages in flash
    pub const fn page_count(&self) -> u32 {
        self.flash_words / self.page_words as u32
    }

    /// Check whether this device carries the given signature
    pub fn matches_signature(&self, signature: [u8; 2]) -> bool {
        self.signature == signature
    }

    /// Whether fuse fields are known for this device
    pub fn has_fuses(&self) -> bool {
        !self.fuses.is_empty()
    }

    /// Group fuse fields by byte
    ///
    /// Groups appear in the order their byte is first used, and fields keep
    /// their declaration order within a group.
    pub fn fuse_groups(&self) -> Vec<(FuseByte, Vec<&FuseField>)> {
        let mut groups: Vec<(FuseByte, Vec<&FuseField>)> = Vec::new();
        for field in &self.fuses {
            match groups.iter_mut().find(|(byte, _)| *byte == field.byte) {
                Some((_, fields)) => fields.push(field),
                None => groups.push((field.byte, alloc::vec![field])),
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    fn field(name: &str, byte: FuseByte, mask: u8, labels: &[&str]) -> FuseField {
        FuseField {
            name: name.to_string(),
            byte,
            mask,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn test_decode_shifts_to_lowest_mask_bit() {
        let bootsz = field(
            "BOOTSZ",
            FuseByte::High,
            0x06,
            &["1024 words", "512 words", "256 words", "128 words"],
        );
        let v = decode_fuse_field(0b1101_1001, &bootsz);
        assert_eq!(v.value, 0);
        assert_eq!(v.label, Some("1024 words"));

        let v = decode_fuse_field(0b1101_1100, &bootsz);
        assert_eq!(v.value, 2);
        assert_eq!(v.label, Some("256 words"));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let cksel = field("CKSEL", FuseByte::Low, 0x0F, &[]);
        for raw in [0x00u8, 0x5A, 0xE1, 0xFF] {
            assert_eq!(decode_fuse_field(raw, &cksel), decode_fuse_field(raw, &cksel));
            assert_eq!(decode_fuse_field(raw, &cksel).value, raw & 0x0F);
            assert_eq!(decode_fuse_field(raw, &cksel).label, None);
        }
    }

    #[test]
    fn test_decode_reserved_label_is_empty() {
        let bod = field(
            "BODLEVEL",
            FuseByte::High,
            0x07,
            &["", "", "", "", "4.3v", "2.7v", "1.8v", "disabled"],
        );
        assert_eq!(decode_fuse_field(0xF9, &bod).label, Some(""));
        assert_eq!(decode_fuse_field(0xFF, &bod).label, Some("disabled"));
    }

    #[test]
    fn test_fuse_groups_keep_order() {
        let device = AvrDevice {
            name: "test".to_string(),
            signature: [0x93, 0x0A],
            flash_words: 4096,
            page_words: 32,
            fuses: vec![
                field("BOOTSZ", FuseByte::Extended, 0x06, &[]),
                field("RSTDISBL", FuseByte::High, 0x80, &[]),
                field("BOOTRST", FuseByte::Extended, 0x01, &[]),
                field("CKSEL", FuseByte::Low, 0x0F, &[]),
                field("SPIEN", FuseByte::High, 0x20, &[]),
            ],
        };
        let groups = device.fuse_groups();
        let keys: Vec<FuseByte> = groups.iter().map(|(b, _)| *b).collect();
        assert_eq!(keys, [FuseByte::Extended, FuseByte::High, FuseByte::Low]);
        let high: Vec<&str> = groups[1].1.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(high, ["RSTDISBL", "SPIEN"]);
    }

    #[test]
    fn test_sizes() {
        let device = AvrDevice {
            name: "ATMega8".to_string(),
            signature: [0x93, 0x07],
            flash_words: 4096,
            page_words: 32,
            fuses: Vec::new(),
        };
        assert_eq!(device.flash_bytes(), 8192);
        assert_eq!(device.page_bytes(), 64);
        assert_eq!(device.page_count(), 128);
        assert!(!device.has_fuses());
    }
}
