//! Bound relay device: raw frame exchange plus the built-in opcodes.
//!
//! A [`RelayDevice`] owns one matched, claimed unit. All exchanges go through
//! a mutex that is held for the whole command sequence, including the
//! discard read, so several logical switches can share one device.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::frame::{self, Frame};
use crate::matcher::{self, DeviceListing, DeviceMatch, MatchPattern, ScanOptions};
use crate::models;
use crate::protocol::*;
use crate::transport::{Endpoints, Transport, UsbHandle};

// ── Backend selection ──

/// Relay hardware vendor, selected by a short address string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    MiniCircuits,
}

impl Backend {
    /// `"mc"` or `"minicircuits"`, case-insensitive.
    pub fn parse(addr: &str) -> Result<Self> {
        match addr.trim().to_ascii_lowercase().as_str() {
            "mc" | "minicircuits" => Ok(Backend::MiniCircuits),
            _ => Err(RelayError::InvalidArgument(format!(
                "cannot determine relay to open from {addr:?}"
            ))),
        }
    }

    pub fn scan_options(self, timeout: Duration) -> ScanOptions {
        match self {
            Backend::MiniCircuits => ScanOptions {
                vendor_id: MINICIRCUITS_VID,
                product_id: MINICIRCUITS_RELAY_PID,
                timeout,
            },
        }
    }
}

// ── Generic relay bank ──

/// Anything that exposes numbered on/off relays.
///
/// The provided bulk methods loop over `0..relay_count()`, so a bank that
/// reports zero relays turns them into no-ops.
pub trait RelayBank {
    fn relay_count(&self) -> u8;
    fn set_relay_state(&self, relay: u8, engaged: bool) -> Result<()>;
    fn get_relay_state(&self, relay: u8) -> Result<bool>;

    /// Set every relay from a bitmask (bit k = relay k).
    fn set_all_relays(&self, mask: u16) -> Result<()> {
        for k in 0..self.relay_count() {
            self.set_relay_state(k, mask & (1 << k) != 0)?;
        }
        Ok(())
    }

    /// Read every relay into a bitmask.
    fn get_all_relays(&self) -> Result<u16> {
        let mut mask = 0u16;
        for k in 0..self.relay_count() {
            if self.get_relay_state(k)? {
                mask |= 1 << k;
            }
        }
        Ok(mask)
    }
}

// ── Device ──

struct Link<H> {
    handle: H,
    endpoints: Endpoints,
}

impl<H: UsbHandle> Link<H> {
    fn exchange(&mut self, payload: &[u8], timeout: Duration) -> Result<Frame> {
        frame::write_frame(&mut self.handle, self.endpoints, payload, timeout)
    }

    /// Absorb the acknowledgement the firmware queues after some commands.
    fn discard_read(&mut self, timeout: Duration) -> Result<()> {
        self.exchange(&[OP_GET_SERIAL], timeout)?;
        Ok(())
    }

    fn read_mask(&mut self, timeout: Duration) -> Result<u16> {
        let reply = self.exchange(&[OP_GET_ALL_RELAYS], timeout)?;
        self.discard_read(timeout)?;
        Ok(u16::from(reply[REPLY_PAYLOAD_OFFSET]))
    }
}

/// One opened relay/switch unit.
///
/// Closed explicitly with [`close`](Self::close) or implicitly on drop;
/// every operation after close fails with `DeviceClosed`.
pub struct RelayDevice<H: UsbHandle> {
    name: String,
    serial: String,
    model: String,
    relay_count: u8,
    timeout: Duration,
    link: Mutex<Option<Link<H>>>,
}

impl<H: UsbHandle> RelayDevice<H> {
    /// Open the first unit matching `pattern`.
    ///
    /// `name` prefixes this device's log lines.
    pub fn open<T>(
        transport: &T,
        options: &ScanOptions,
        pattern: &MatchPattern,
        name: impl Into<String>,
    ) -> Result<Self>
    where
        T: Transport<Handle = H>,
    {
        let found = match matcher::find_devices(transport, options, pattern)?.next() {
            Some(found) => found?,
            None => return Err(RelayError::NotFound),
        };
        let dev = Self::from_match(found, name, options.timeout);
        log::info!(
            "{}: opened {} S/N {} ({} relays)",
            dev.name,
            dev.model,
            dev.serial,
            dev.relay_count
        );
        Ok(dev)
    }

    /// Bind an already matched unit.
    pub fn from_match(found: DeviceMatch<H>, name: impl Into<String>, timeout: Duration) -> Self {
        let relay_count = models::relay_count_from_model(&found.model);
        RelayDevice {
            name: name.into(),
            serial: found.serial,
            model: found.model,
            relay_count,
            timeout,
            link: Mutex::new(Some(Link {
                handle: found.handle,
                endpoints: found.endpoints,
            })),
        }
    }

    /// Serial/model of every matching unit. No unit stays open afterwards,
    /// and at most one is open at any moment. Stops at the first unit whose
    /// identity query fails.
    pub fn list_matches<T>(
        transport: &T,
        options: &ScanOptions,
        pattern: &MatchPattern,
    ) -> Result<Vec<DeviceListing>>
    where
        T: Transport<Handle = H>,
    {
        matcher::find_devices(transport, options, pattern)?
            .map(|found| found.map(DeviceMatch::into_listing))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serial number read at open time.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Model string read at open time.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Relays encoded in the model string; 0 when the model has no count.
    pub fn relay_count(&self) -> u8 {
        self.relay_count
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Release the USB device. Idempotent.
    pub fn close(&self) {
        if self.lock().take().is_some() {
            log::info!("{}: closed", self.name);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Link<H>>> {
        // The guarded value is only the link; a panic mid-exchange leaves
        // nothing half-written in it.
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one complete command sequence with the device locked.
    fn with_link<R>(&self, f: impl FnOnce(&mut Link<H>, Duration) -> Result<R>) -> Result<R> {
        let mut guard = self.lock();
        let link = guard.as_mut().ok_or(RelayError::DeviceClosed)?;
        f(link, self.timeout)
    }

    fn check_relay(&self, relay: u8) -> Result<()> {
        // Per-relay opcodes stop short of OP_SET_ALL_RELAYS.
        if relay >= OP_SET_ALL_RELAYS - 1 {
            return Err(RelayError::InvalidArgument(format!(
                "relay index {relay} out of range (0..8)"
            )));
        }
        Ok(())
    }

    /// Send a raw payload (at most 63 bytes) and return the 64-byte reply.
    pub fn write_frame(&self, payload: &[u8]) -> Result<Frame> {
        self.with_link(|link, t| link.exchange(payload, t))
    }

    pub fn query_serial_number(&self) -> Result<String> {
        let label = &self.name;
        self.with_link(|link, t| {
            let reply = link.exchange(&[OP_GET_SERIAL], t)?;
            Ok(frame::decode_string_or_empty(&reply, "serial number", label))
        })
    }

    pub fn query_model(&self) -> Result<String> {
        let label = &self.name;
        self.with_link(|link, t| {
            let reply = link.exchange(&[OP_GET_MODEL], t)?;
            Ok(frame::decode_string_or_empty(&reply, "model", label))
        })
    }

    /// SCPI passthrough; returns the reply text.
    pub fn send_scpi(&self, command: &str) -> Result<String> {
        let mut payload = Vec::with_capacity(1 + command.len());
        payload.push(OP_SCPI);
        payload.extend_from_slice(command.as_bytes());
        let label = &self.name;
        let reply = self.with_link(|link, t| {
            let reply = link.exchange(&payload, t)?;
            Ok(frame::decode_string_or_empty(&reply, "SCPI reply", label))
        })?;
        log::debug!("{}: {command} -> {reply:?}", self.name);
        Ok(reply)
    }

    /// Engage or release one relay (0-based).
    pub fn set_relay_state(&self, relay: u8, engaged: bool) -> Result<()> {
        self.check_relay(relay)?;
        log::info!("{}: setting relay {relay} to {}", self.name, u8::from(engaged));
        self.with_link(|link, t| {
            link.exchange(&[op_set_relay(relay), u8::from(engaged)], t)?;
            link.discard_read(t)
        })
    }

    /// Set all relays from a mask in one command.
    pub fn set_all_relays(&self, mask: u16) -> Result<()> {
        let byte = u8::try_from(mask).map_err(|_| {
            RelayError::InvalidArgument(format!("relay mask 0x{mask:X} wider than 8 bits"))
        })?;
        if self.relay_count == 0 {
            log::warn!(
                "{}: relay count unknown for {}, ignoring mask 0x{byte:02X}",
                self.name,
                self.model
            );
            return Ok(());
        }
        log::info!("{}: setting relay mask to 0x{byte:02X}", self.name);
        self.with_link(|link, t| {
            link.exchange(&[OP_SET_ALL_RELAYS, byte], t)?;
            link.discard_read(t)
        })
    }

    /// Current relay mask. Zero-relay models report 0 without I/O.
    pub fn get_all_relays(&self) -> Result<u16> {
        if self.relay_count == 0 {
            return Ok(0);
        }
        self.with_link(|link, t| link.read_mask(t))
    }

    /// Whether relay `relay` (0-based) is engaged.
    pub fn get_relay_state(&self, relay: u8) -> Result<bool> {
        self.check_relay(relay)?;
        if self.relay_count == 0 {
            return Ok(false);
        }
        self.with_link(|link, t| {
            let mask = link.read_mask(t)?;
            link.discard_read(t)?;
            Ok(mask & (1 << relay) != 0)
        })
    }

    /// Send a bare opcode and return the first 10 reply bytes.
    ///
    /// For poking at undocumented firmware functions; no discard read is
    /// issued, so follow up with a serial query if the opcode mutates state.
    pub fn probe(&self, opcode: u8) -> Result<[u8; 10]> {
        let reply = self.write_frame(&[opcode])?;
        let mut head = [0u8; 10];
        head.copy_from_slice(&reply[..10]);
        Ok(head)
    }
}

impl<H: UsbHandle> RelayBank for RelayDevice<H> {
    fn relay_count(&self) -> u8 {
        self.relay_count
    }

    fn set_relay_state(&self, relay: u8, engaged: bool) -> Result<()> {
        RelayDevice::set_relay_state(self, relay, engaged)
    }

    fn get_relay_state(&self, relay: u8) -> Result<bool> {
        RelayDevice::get_relay_state(self, relay)
    }

    fn set_all_relays(&self, mask: u16) -> Result<()> {
        RelayDevice::set_all_relays(self, mask)
    }

    fn get_all_relays(&self) -> Result<u16> {
        RelayDevice::get_all_relays(self)
    }
}
