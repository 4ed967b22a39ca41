//! `read` / `set` subcommands: whole-bank relay mask.

use rfrelay_lib::SwitchBox;

use super::{
    Config, ReadOutput, RelayDevice, Result, Transport, UsbHandle, format_mask, kv, kv_width,
    open_relay, print_json,
};

pub(super) fn read_output<H: UsbHandle>(dev: &RelayDevice<H>) -> Result<ReadOutput> {
    let mask = SwitchBox::new(dev, dev.name()).get_position()?;
    let relays = (0..dev.relay_count()).map(|k| mask & (1 << k) != 0).collect();
    Ok(ReadOutput {
        serial: dev.serial().to_string(),
        relay_count: dev.relay_count(),
        mask,
        relays,
    })
}

pub(super) fn cmd_read<T: Transport>(transport: &T, config: &Config, json: bool) -> Result<()> {
    let dev = open_relay(transport, config)?;
    if dev.relay_count() == 0 {
        log::warn!("{} does not report a relay count; mask reads as 0", dev.model());
    }
    let output = read_output(&dev)?;
    dev.close();

    if json {
        return print_json(&output);
    }

    let w = kv_width(&["Mask:", "Relay 0:"]);
    kv("Mask:", format_mask(output.mask, output.relay_count), w);
    for (k, on) in output.relays.iter().enumerate() {
        kv(&format!("Relay {k}:"), if *on { "engaged" } else { "released" }, w);
    }
    Ok(())
}

pub(super) fn set_mask<H: UsbHandle>(dev: &RelayDevice<H>, mask: u16) -> Result<u16> {
    let bank = SwitchBox::new(dev, dev.name());
    bank.set_position(mask)?;
    bank.get_position()
}

pub(super) fn cmd_set<T: Transport>(transport: &T, config: &Config, mask: u16) -> Result<()> {
    let dev = open_relay(transport, config)?;
    let now = set_mask(&dev, mask)?;
    dev.close();
    println!("Relay mask set to {}", format_mask(now, dev.relay_count()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfrelay_lib::transport::mock::{MockTransport, MockUnit};

    fn mechanical() -> MockTransport {
        MockTransport::new(vec![MockUnit::new("11908220007", "RC-2SPDT-A18")])
    }

    #[test]
    fn read_reports_each_relay() {
        let transport = mechanical();
        transport.set_relay_mask(0, 0b10);
        let dev = open_relay(&transport, &Config::default()).unwrap();
        let output = read_output(&dev).unwrap();
        assert_eq!(output.mask, 0b10);
        assert_eq!(output.relays, vec![false, true]);
    }

    #[test]
    fn set_then_read_back() {
        let transport = mechanical();
        let dev = open_relay(&transport, &Config::default()).unwrap();
        assert_eq!(set_mask(&dev, 0b11).unwrap(), 0b11);
        assert_eq!(transport.relay_mask(0), 0b11);
    }

    #[test]
    fn zero_relay_model_reads_empty() {
        let transport = MockTransport::new(vec![MockUnit::new("1", "USB-1SP8T-63H")]);
        let dev = open_relay(&transport, &Config::default()).unwrap();
        let output = read_output(&dev).unwrap();
        assert_eq!(output.mask, 0);
        assert!(output.relays.is_empty());
    }
}
