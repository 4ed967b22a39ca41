//! nusb-backed transport.
//!
//! Transfers are submitted as nusb futures and driven to completion on a
//! per-handle current-thread tokio runtime, with `tokio::time::timeout`
//! bounding each one. Dropping the timed-out future cancels the transfer.

use std::future::Future;
use std::time::Duration;

use nusb::transfer::{Direction, EndpointType, RequestBuffer, TransferError};

use crate::protocol::RELAY_INTERFACE;
use crate::transport::{Endpoints, Result, Transport, TransportError, UsbHandle};

/// Real USB devices via `nusb`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NusbTransport;

impl NusbTransport {
    pub fn new() -> Self {
        NusbTransport
    }
}

impl Transport for NusbTransport {
    type Candidate = nusb::DeviceInfo;
    type Handle = NusbHandle;

    fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<nusb::DeviceInfo>> {
        let devices = nusb::list_devices()
            .map_err(|e| TransportError::Failed(format!("USB enumeration: {e}")))?
            .filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
            .collect::<Vec<_>>();
        log::debug!(
            "{} candidate(s) with id {vendor_id:04x}:{product_id:04x}",
            devices.len()
        );
        Ok(devices)
    }

    fn open(&self, candidate: nusb::DeviceInfo) -> Result<NusbHandle> {
        let location = format!(
            "usb:{:03}/{:03}",
            candidate.bus_number(),
            candidate.device_address()
        );
        let device = candidate
            .open()
            .map_err(|e| TransportError::Failed(format!("USB open {location}: {e}")))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| TransportError::Failed(format!("timer runtime: {e}")))?;
        Ok(NusbHandle {
            interface: None,
            device,
            location,
            out_type: EndpointType::Interrupt,
            in_type: EndpointType::Interrupt,
            runtime,
        })
    }
}

/// One opened relay unit. Dropping it releases the interface, then the device.
pub struct NusbHandle {
    interface: Option<nusb::Interface>,
    device: nusb::Device,
    location: String,
    out_type: EndpointType,
    in_type: EndpointType,
    runtime: tokio::runtime::Runtime,
}

fn transfer_error(context: String, e: TransferError) -> TransportError {
    match e {
        TransferError::Disconnected => TransportError::Disconnected(context),
        other => TransportError::Failed(format!("{context}: {other}")),
    }
}

impl NusbHandle {
    fn interface(&self) -> Result<&nusb::Interface> {
        self.interface.as_ref().ok_or_else(|| {
            TransportError::Failed(format!(
                "{}: interface {RELAY_INTERFACE} not claimed",
                self.location
            ))
        })
    }

    fn run<F: Future>(&self, timeout: Duration, what: String, fut: F) -> Result<F::Output> {
        self.runtime
            .block_on(async { tokio::time::timeout(timeout, fut).await })
            .map_err(|_| {
                TransportError::Timeout(format!("{what} after {} ms", timeout.as_millis()))
            })
    }
}

impl UsbHandle for NusbHandle {
    fn detach_kernel_driver(&mut self) -> Result<()> {
        #[cfg(target_os = "linux")]
        {
            self.device
                .detach_kernel_driver(RELAY_INTERFACE)
                .map_err(|e| TransportError::Failed(format!("detach kernel driver: {e}")))
        }
        #[cfg(not(target_os = "linux"))]
        {
            Ok(())
        }
    }

    fn set_configuration(&mut self) -> Result<()> {
        let value = self
            .device
            .configurations()
            .next()
            .map(|c| c.configuration_value())
            .ok_or_else(|| {
                TransportError::Failed(format!("{}: no configuration", self.location))
            })?;
        self.device
            .set_configuration(value)
            .map_err(|e| TransportError::Failed(format!("set configuration {value}: {e}")))
    }

    fn claim(&mut self) -> Result<Endpoints> {
        let mut out_ep = None;
        let mut in_ep = None;
        if let Some(config) = self.device.configurations().next() {
            for alt in config
                .interface_alt_settings()
                .filter(|a| a.interface_number() == RELAY_INTERFACE && a.alternate_setting() == 0)
            {
                for ep in alt.endpoints() {
                    let slot = match ep.direction() {
                        Direction::Out => &mut out_ep,
                        Direction::In => &mut in_ep,
                    };
                    if slot.is_none() {
                        *slot = Some((ep.address(), ep.transfer_type()));
                    }
                }
            }
        }
        let (Some((out_addr, out_type)), Some((in_addr, in_type))) = (out_ep, in_ep) else {
            return Err(TransportError::Failed(format!(
                "{}: interface {RELAY_INTERFACE} lacks an OUT/IN endpoint pair",
                self.location
            )));
        };

        let interface = self.device.claim_interface(RELAY_INTERFACE).map_err(|e| {
            TransportError::Failed(format!("claim interface {RELAY_INTERFACE}: {e}"))
        })?;
        self.interface = Some(interface);
        self.out_type = out_type;
        self.in_type = in_type;
        log::debug!(
            "{}: claimed, OUT 0x{out_addr:02X} ({out_type:?}), IN 0x{in_addr:02X} ({in_type:?})",
            self.location
        );
        Ok(Endpoints { out_addr, in_addr })
    }

    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        let iface = self.interface()?;
        let buf = data.to_vec();
        let fut = match self.out_type {
            EndpointType::Bulk => iface.bulk_out(endpoint, buf),
            _ => iface.interrupt_out(endpoint, buf),
        };
        let what = format!("write to endpoint 0x{endpoint:02X}");
        let completion = self.run(timeout, what.clone(), fut)?;
        let sent = completion
            .into_result()
            .map_err(|e| transfer_error(what, e))?
            .actual_length();
        Ok(sent)
    }

    fn read(&mut self, endpoint: u8, max_len: usize, timeout: Duration) -> Result<Vec<u8>> {
        let iface = self.interface()?;
        let buf = RequestBuffer::new(max_len);
        let fut = match self.in_type {
            EndpointType::Bulk => iface.bulk_in(endpoint, buf),
            _ => iface.interrupt_in(endpoint, buf),
        };
        let what = format!("read from endpoint 0x{endpoint:02X}");
        let completion = self.run(timeout, what.clone(), fut)?;
        completion.into_result().map_err(|e| transfer_error(what, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_disconnect_maps_to_disconnected() {
        let e = transfer_error("read from endpoint 0x81".into(), TransferError::Disconnected);
        assert!(matches!(e, TransportError::Disconnected(ref c) if c.contains("0x81")));
    }

    #[test]
    fn transfer_stall_maps_to_failed() {
        let e = transfer_error("write to endpoint 0x01".into(), TransferError::Stall);
        assert!(
            matches!(e, TransportError::Failed(ref c) if c.starts_with("write to endpoint 0x01"))
        );
    }
}
