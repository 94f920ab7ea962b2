//! Feature report transport abstraction
//!
//! The client needs exactly two primitives from the USB stack. Keeping them
//! behind a trait lets the protocol run against an in-process bridge in
//! tests.

use crate::error::Result;

/// Transport trait for HID feature reports
pub trait FeatureTransport {
    /// Send a feature report
    ///
    /// `data[0]` is the report id; the whole buffer, id included, is the
    /// data stage of the SET_REPORT request.
    fn set_feature_report(&mut self, data: &[u8]) -> Result<()>;

    /// Read a feature report into `buf`
    ///
    /// Returns the number of bytes received.
    fn get_feature_report(&mut self, report_id: u8, buf: &mut [u8]) -> Result<usize>;
}

impl<T: FeatureTransport + ?Sized> FeatureTransport for &mut T {
    fn set_feature_report(&mut self, data: &[u8]) -> Result<()> {
        (**self).set_feature_report(data)
    }

    fn get_feature_report(&mut self, report_id: u8, buf: &mut [u8]) -> Result<usize> {
        (**self).get_feature_report(report_id, buf)
    }
}

impl<T: FeatureTransport + ?Sized> FeatureTransport for Box<T> {
    fn set_feature_report(&mut self, data: &[u8]) -> Result<()> {
        (**self).set_feature_report(data)
    }

    fn get_feature_report(&mut self, report_id: u8, buf: &mut [u8]) -> Result<usize> {
        (**self).get_feature_report(report_id, buf)
    }
}
