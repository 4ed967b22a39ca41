//! Logical switches on top of a [`RelayDevice`].
//!
//! A [`RelaySwitch`] borrows its device; any number of switches can share
//! one device, and closing the device makes every switch fail with
//! `DeviceClosed`.

use crate::error::{RelayError, Result};
use crate::models::{self, SwitchKind};
use crate::relay::{RelayBank, RelayDevice};
use crate::transport::UsbHandle;

/// One addressable output of a relay/switch unit.
pub struct RelaySwitch<'d, H: UsbHandle> {
    name: String,
    kind: SwitchKind,
    device: &'d RelayDevice<H>,
}

impl<'d, H: UsbHandle> RelaySwitch<'d, H> {
    /// Bind output `selector` (a letter, case-insensitive) of `device`.
    pub fn new(device: &'d RelayDevice<H>, selector: char) -> Result<Self> {
        let kind = models::resolve_switch_kind(device.model(), selector)?;
        let name = format!("{}{}", device.name(), selector.to_ascii_uppercase());
        log::debug!("{name}: {kind:?}");
        Ok(RelaySwitch { name, kind, device })
    }

    /// Device name followed by the switch letter, e.g. `relayA`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &SwitchKind {
        &self.kind
    }

    pub fn device(&self) -> &'d RelayDevice<H> {
        self.device
    }

    /// Move the switch to position `n` (1-based).
    pub fn set_position(&self, n: u32) -> Result<()> {
        log::info!("{}: setting position {n}", self.name);
        match &self.kind {
            SwitchKind::SolidState { command_root } => {
                let ack = self.device.send_scpi(&format!("{command_root}:{n}"))?;
                if ack != "1" {
                    log::debug!("{}: position {n} acknowledged with {ack:?}", self.name);
                }
                Ok(())
            }
            SwitchKind::Mechanical { relay_index } => {
                if n == 0 {
                    return Err(RelayError::InvalidArgument(format!(
                        "{}: positions start at 1",
                        self.name
                    )));
                }
                self.device.set_relay_state(*relay_index, n - 1 != 0)
            }
        }
    }

    /// Current position (1-based).
    pub fn get_position(&self) -> Result<u32> {
        match &self.kind {
            SwitchKind::SolidState { command_root } => {
                let reply = self.device.send_scpi(&format!("{command_root}?"))?;
                reply.trim().parse::<u32>().map_err(|_| {
                    RelayError::UnexpectedReply(format!(
                        "{}: position {reply:?} is not a number",
                        self.name
                    ))
                })
            }
            SwitchKind::Mechanical { relay_index } => {
                let engaged = self.device.get_relay_state(*relay_index)?;
                Ok(u32::from(engaged) + 1)
            }
        }
    }
}

// ── Whole-box switch ──

/// The whole relay bank treated as one switch whose position is the mask.
pub struct SwitchBox<'d, B: RelayBank + ?Sized> {
    name: String,
    bank: &'d B,
}

impl<'d, B: RelayBank + ?Sized> SwitchBox<'d, B> {
    pub fn new(bank: &'d B, name: impl Into<String>) -> Self {
        SwitchBox {
            name: name.into(),
            bank,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_position(&self, mask: u16) -> Result<()> {
        log::info!("{}: setting mask 0x{mask:X}", self.name);
        self.bank.set_all_relays(mask)
    }

    pub fn get_position(&self) -> Result<u16> {
        self.bank.get_all_relays()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{MatchPattern, ScanOptions};
    use crate::protocol::{OP_GET_ALL_RELAYS, OP_GET_SERIAL};
    use crate::transport::mock::{MockHandle, MockTransport, MockUnit};

    fn open(model: &str) -> (MockTransport, RelayDevice<MockHandle>) {
        let transport = MockTransport::new(vec![MockUnit::new("11405130032", model)]);
        let dev = RelayDevice::open(
            &transport,
            &ScanOptions::default(),
            &MatchPattern::any(),
            "relay",
        )
        .unwrap();
        transport.clear_io();
        (transport, dev)
    }

    // ── solid state ──

    #[test]
    fn solid_state_set_sends_scpi() {
        let (transport, dev) = open("USB-1SP8T-63H");
        let sw = RelaySwitch::new(&dev, 'A').unwrap();
        sw.set_position(4).unwrap();
        assert_eq!(transport.scpi_log(0), vec![":SP8T:STATE:4"]);
        assert_eq!(sw.get_position().unwrap(), 4);
    }

    #[test]
    fn solid_state_get_parses_reply() {
        let (transport, dev) = open("USB-1SP8T-63H");
        transport.set_scpi_value(0, ":SP8T:STATE", "7");
        let sw = RelaySwitch::new(&dev, 'a').unwrap();
        assert_eq!(sw.get_position().unwrap(), 7);
        assert_eq!(transport.scpi_log(0), vec![":SP8T:STATE?"]);
    }

    #[test]
    fn solid_state_non_numeric_reply() {
        let (transport, dev) = open("USB-1SP8T-63H");
        transport.set_scpi_value(0, ":SP8T:STATE", "ERR");
        let sw = RelaySwitch::new(&dev, 'A').unwrap();
        let err = sw.get_position().unwrap_err();
        assert!(matches!(err, RelayError::UnexpectedReply(_)), "got {err:?}");
    }

    #[test]
    fn dual_output_switches_are_independent() {
        let (transport, dev) = open("USB-2SP4T-63H");
        let a = RelaySwitch::new(&dev, 'A').unwrap();
        let b = RelaySwitch::new(&dev, 'b').unwrap();
        a.set_position(2).unwrap();
        b.set_position(3).unwrap();
        assert_eq!(
            transport.scpi_log(0),
            vec![":SP4T:A:STATE:2", ":SP4T:B:STATE:3"]
        );
        assert_eq!(a.get_position().unwrap(), 2);
        assert_eq!(b.get_position().unwrap(), 3);
    }

    #[test]
    fn switch_name_is_device_name_plus_letter() {
        let (_t, dev) = open("USB-2SP4T-63H");
        assert_eq!(RelaySwitch::new(&dev, 'b').unwrap().name(), "relayB");
    }

    // ── mechanical ──

    #[test]
    fn mechanical_position_two_engages_relay() {
        let (transport, dev) = open("RC-2SPDT-A18");
        let sw = RelaySwitch::new(&dev, 'C').unwrap();
        sw.set_position(2).unwrap();
        let stats = transport.stats();
        assert_eq!(&stats.writes[0][..2], &[3, 1], "relay 2 engaged");
        assert_eq!(stats.writes_with_opcode(OP_GET_SERIAL), 1);
        assert_eq!(transport.relay_mask(0), 0b100);
    }

    #[test]
    fn mechanical_get_position_reads_relay() {
        let (transport, dev) = open("RC-2SPDT-A18");
        transport.set_relay_mask(0, 0b100);
        let sw = RelaySwitch::new(&dev, 'C').unwrap();
        assert_eq!(sw.get_position().unwrap(), 2);
        transport.set_relay_mask(0, 0);
        assert_eq!(sw.get_position().unwrap(), 1);
        assert_eq!(transport.stats().writes_with_opcode(OP_GET_ALL_RELAYS), 2);
    }

    #[test]
    fn mechanical_position_one_releases_relay() {
        let (transport, dev) = open("RC-2SPDT-A18");
        transport.set_relay_mask(0, 0b11);
        let sw = RelaySwitch::new(&dev, 'A').unwrap();
        sw.set_position(1).unwrap();
        assert_eq!(transport.relay_mask(0), 0b10);
    }

    #[test]
    fn mechanical_position_zero_rejected() {
        let (transport, dev) = open("RC-2SPDT-A18");
        let sw = RelaySwitch::new(&dev, 'A').unwrap();
        assert!(matches!(
            sw.set_position(0),
            Err(RelayError::InvalidArgument(_))
        ));
        assert!(transport.stats().writes.is_empty());
    }

    // ── errors ──

    #[test]
    fn unknown_model_cannot_build_switch() {
        let (_t, dev) = open("ZTVX-8-12-S+");
        assert!(matches!(
            RelaySwitch::new(&dev, 'A'),
            Err(RelayError::UnknownModel(_))
        ));
    }

    #[test]
    fn switch_fails_after_device_close() {
        let (_t, dev) = open("USB-1SP8T-63H");
        let sw = RelaySwitch::new(&dev, 'A').unwrap();
        dev.close();
        assert!(matches!(sw.set_position(1), Err(RelayError::DeviceClosed)));
        assert!(matches!(sw.get_position(), Err(RelayError::DeviceClosed)));
    }

    // ── SwitchBox ──

    #[test]
    fn switch_box_position_is_mask() {
        let (transport, dev) = open("RC-2SPDT-A18");
        let bx = SwitchBox::new(&dev, "box");
        bx.set_position(0b10).unwrap();
        assert_eq!(transport.relay_mask(0), 0b10);
        assert_eq!(bx.get_position().unwrap(), 0b10);
    }

    #[test]
    fn switch_box_over_trait_object() {
        let (transport, dev) = open("RC-2SPDT-A18");
        let bank: &dyn RelayBank = &dev;
        let bx = SwitchBox::new(bank, "box");
        bx.set_position(0b01).unwrap();
        assert_eq!(transport.relay_mask(0), 0b01);
    }
}
