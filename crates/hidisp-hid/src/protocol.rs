//! HID bridge protocol constants
//!
//! The report layouts themselves live in [`hidisp_core::hid`] since the
//! programmer side needs them too.

/// USB vendor id (shared V-USB id)
pub const USB_VENDOR_ID: u16 = 0x16c0;
/// USB manufacturer string
pub const USB_VENDOR_STRING: &str = "obdev.at";
/// USB product id
pub const USB_PRODUCT_ID: u16 = 1503;
/// USB product string
pub const USB_PRODUCT_STRING: &str = "HIDBoot";

/// First sequence number used after opening the device
pub const INITIAL_SEQUENCE: u8 = 0x3a;

/// HID class request: GET_REPORT
pub const HID_GET_REPORT: u8 = 0x01;
/// HID class request: SET_REPORT
pub const HID_SET_REPORT: u8 = 0x09;
/// HID report type for feature reports (high byte of wValue)
pub const HID_REPORT_TYPE_FEATURE: u8 = 0x03;

/// Status report length as returned by GET_REPORT, including the
/// trailing padding byte the firmware sends
pub const STATUS_TRANSFER_LEN: usize = hidisp_core::hid::STATUS_REPORT_LEN + 1;

/// wValue for a feature report request
pub const fn feature_report_value(report_id: u8) -> u16 {
    (HID_REPORT_TYPE_FEATURE as u16) << 8 | report_id as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_report_value() {
        assert_eq!(feature_report_value(1), 0x0301);
        assert_eq!(feature_report_value(3), 0x0303);
    }
}
