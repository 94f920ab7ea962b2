//! USB HID transport using nusb
//!
//! Feature reports are exchanged with HID class control requests on
//! interface 0, so no HID driver stack is involved. The kernel HID driver
//! is detached when the interface is claimed.

use std::time::Duration;

use nusb::transfer::{ControlIn, ControlOut, ControlType, Recipient};
use nusb::MaybeFuture;

use crate::error::{HidError, Result};
use crate::protocol::{
    feature_report_value, HID_GET_REPORT, HID_SET_REPORT, USB_PRODUCT_ID, USB_PRODUCT_STRING,
    USB_VENDOR_ID, USB_VENDOR_STRING,
};
use crate::transport::FeatureTransport;

/// Interface carrying the HID reports
const HID_INTERFACE: u8 = 0;

/// Timeout for a single control transfer
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

/// Feature report transport over a USB HID interface
pub struct UsbHidTransport {
    interface: nusb::Interface,
}

impl UsbHidTransport {
    /// Open the first device matching both numeric ids and both strings
    pub fn open(vendor_id: u16, vendor: &str, product_id: u16, product: &str) -> Result<Self> {
        let device_info = nusb::list_devices()
            .wait()?
            .filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
            .find(|d| {
                let matches = d.manufacturer_string() == Some(vendor)
                    && d.product_string() == Some(product);
                if !matches {
                    log::debug!(
                        "skipping {:04x}:{:04x} ({:?} / {:?})",
                        vendor_id,
                        product_id,
                        d.manufacturer_string(),
                        d.product_string()
                    );
                }
                matches
            })
            .ok_or(HidError::NotFound)?;

        log::info!(
            "Opening {} ({:04x}:{:04x}) at address {}",
            product,
            vendor_id,
            product_id,
            device_info.device_address()
        );

        let device = device_info.open().wait()?;
        let interface = device.detach_and_claim_interface(HID_INTERFACE).wait()?;

        Ok(Self { interface })
    }

    /// Open the HIDBoot ISP programmer
    pub fn open_hidboot() -> Result<Self> {
        Self::open(
            USB_VENDOR_ID,
            USB_VENDOR_STRING,
            USB_PRODUCT_ID,
            USB_PRODUCT_STRING,
        )
    }
}

impl FeatureTransport for UsbHidTransport {
    fn set_feature_report(&mut self, data: &[u8]) -> Result<()> {
        let report_id = *data.first().ok_or(HidError::Core(hidisp_core::Error::InvalidFrame))?;
        self.interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: HID_SET_REPORT,
                    value: feature_report_value(report_id),
                    index: HID_INTERFACE as u16,
                    data,
                },
                TRANSFER_TIMEOUT,
            )
            .wait()?;
        Ok(())
    }

    fn get_feature_report(&mut self, report_id: u8, buf: &mut [u8]) -> Result<usize> {
        let data = self
            .interface
            .control_in(
                ControlIn {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: HID_GET_REPORT,
                    value: feature_report_value(report_id),
                    index: HID_INTERFACE as u16,
                    length: buf.len() as u16,
                },
                TRANSFER_TIMEOUT,
            )
            .wait()?;

        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }
}
