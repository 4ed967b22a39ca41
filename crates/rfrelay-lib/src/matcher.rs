//! Device discovery: serial/model pattern matching over a lazy scan.
//!
//! [`find_devices`] returns a [`DeviceScan`] iterator. Each call to `next()`
//! opens candidates one at a time, queries serial and model, and either
//! yields the match (handing its handle to the caller) or drops the handle
//! before touching the next candidate. The scan itself never holds a device
//! between calls, so an early `break` leaks nothing.

use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::frame;
use crate::protocol::{
    MINICIRCUITS_RELAY_PID, MINICIRCUITS_VID, OP_GET_MODEL, OP_GET_SERIAL, USB_TIMEOUT_MS,
};
use crate::transport::{Endpoints, Transport, UsbHandle};

/// Pattern value that matches anything.
pub const WILDCARD: &str = "*";

/// Serial/model pattern pair.
///
/// Serial matches on suffix, model on case-sensitive substring; `"*"`
/// matches anything. Both fields must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchPattern {
    pub serial: String,
    pub model: String,
}

impl Default for MatchPattern {
    fn default() -> Self {
        MatchPattern::any()
    }
}

impl MatchPattern {
    pub fn new(serial: impl Into<String>, model: impl Into<String>) -> Self {
        MatchPattern {
            serial: serial.into(),
            model: model.into(),
        }
    }

    /// Match every device.
    pub fn any() -> Self {
        MatchPattern::new(WILDCARD, WILDCARD)
    }

    pub fn matches(&self, serial: &str, model: &str) -> bool {
        (self.serial == WILDCARD || serial.ends_with(self.serial.as_str()))
            && (self.model == WILDCARD || model.contains(self.model.as_str()))
    }
}

/// USB ids and per-transfer timeout used while scanning.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub vendor_id: u16,
    pub product_id: u16,
    pub timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            vendor_id: MINICIRCUITS_VID,
            product_id: MINICIRCUITS_RELAY_PID,
            timeout: Duration::from_millis(USB_TIMEOUT_MS),
        }
    }
}

/// A device that matched, still open and claimed.
///
/// Dropping it disposes the device.
pub struct DeviceMatch<H> {
    pub serial: String,
    pub model: String,
    pub handle: H,
    pub endpoints: Endpoints,
}

impl<H> DeviceMatch<H> {
    /// Serial and model only; the handle is released here.
    pub fn into_listing(self) -> DeviceListing {
        DeviceListing {
            serial: self.serial,
            model: self.model,
        }
    }
}

/// Serial/model pair reported by a "list devices" scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceListing {
    pub serial: String,
    pub model: String,
}

/// Lazy, finite, non-restartable walk over candidate devices.
///
/// `None` from `next()` is the exhausted condition: no (further) candidate
/// matched. `Some(Err(_))` is a unit that was configured but failed its
/// serial/model query; its handle is already released.
pub struct DeviceScan<'t, T: Transport> {
    transport: &'t T,
    candidates: std::vec::IntoIter<T::Candidate>,
    pattern: MatchPattern,
    timeout: Duration,
}

/// Start a scan of every device with the given USB ids.
///
/// Only the enumeration itself can fail here. During iteration, candidates
/// that cannot be opened, configured or claimed are skipped; query errors
/// are yielded.
pub fn find_devices<'t, T: Transport>(
    transport: &'t T,
    options: &ScanOptions,
    pattern: &MatchPattern,
) -> Result<DeviceScan<'t, T>> {
    let candidates = transport.enumerate(options.vendor_id, options.product_id)?;
    log::debug!(
        "scan {:04x}:{:04x}: {} candidate(s)",
        options.vendor_id,
        options.product_id,
        candidates.len()
    );
    Ok(DeviceScan {
        transport,
        candidates: candidates.into_iter(),
        pattern: pattern.clone(),
        timeout: options.timeout,
    })
}

impl<T: Transport> DeviceScan<'_, T> {
    /// Open one candidate and test it. The handle is dropped on every path
    /// that does not return `Some(Ok(_))`.
    fn inspect_candidate(
        &self,
        candidate: T::Candidate,
    ) -> Option<Result<DeviceMatch<T::Handle>>> {
        let mut handle = match self.transport.open(candidate) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("skipping candidate: {e}");
                return None;
            }
        };

        // Best-effort only: most units have no kernel driver bound.
        if let Err(e) = handle.detach_kernel_driver() {
            log::debug!("kernel driver detach ignored: {e}");
        }

        // Usually means another process already has this unit open.
        if let Err(e) = handle.set_configuration() {
            log::debug!("skipping candidate, set_configuration failed: {e}");
            return None;
        }

        let endpoints = match handle.claim() {
            Ok(eps) => eps,
            Err(e) => {
                log::debug!("skipping candidate: {e}");
                return None;
            }
        };

        let identity = frame::query_string(
            &mut handle,
            endpoints,
            OP_GET_SERIAL,
            "serial number",
            self.timeout,
            "scan",
        )
        .and_then(|serial| {
            let model = frame::query_string(
                &mut handle,
                endpoints,
                OP_GET_MODEL,
                "model",
                self.timeout,
                "scan",
            )?;
            Ok((serial, model))
        });
        let (serial, model) = match identity {
            Ok(pair) => pair,
            Err(e) => {
                drop(handle);
                log::warn!("identity query failed: {e}");
                return Some(Err(e));
            }
        };

        if !self.pattern.matches(&serial, &model) {
            log::debug!("{model} S/N {serial} does not match {:?}", self.pattern);
            return None;
        }

        log::debug!("{model} S/N {serial} matches");
        Some(Ok(DeviceMatch {
            serial,
            model,
            handle,
            endpoints,
        }))
    }
}

impl<T: Transport> Iterator for DeviceScan<'_, T> {
    type Item = Result<DeviceMatch<T::Handle>>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(candidate) = self.candidates.next() {
            if let Some(item) = self.inspect_candidate(candidate) {
                return Some(item);
            }
        }
        None
    }
}
