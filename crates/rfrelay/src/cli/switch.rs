//! `switch` subcommand: read or move one logical switch.

use super::{
    Config, RelayDevice, RelaySwitch, Result, SwitchOutput, Transport, UsbHandle, open_relay,
    print_json,
};

/// Move the switch if `position` is given, then read its position back.
pub(super) fn switch_output<H: UsbHandle>(
    dev: &RelayDevice<H>,
    selector: char,
    position: Option<u32>,
) -> Result<SwitchOutput> {
    let sw = RelaySwitch::new(dev, selector)?;
    if let Some(n) = position {
        sw.set_position(n)?;
    }
    Ok(SwitchOutput {
        switch: sw.name().to_string(),
        model: dev.model().to_string(),
        position: sw.get_position()?,
    })
}

pub(super) fn cmd_switch<T: Transport>(
    transport: &T,
    config: &Config,
    selector: char,
    position: Option<u32>,
    json: bool,
) -> Result<()> {
    let dev = open_relay(transport, config)?;
    let output = switch_output(&dev, selector, position)?;
    dev.close();

    if json {
        return print_json(&output);
    }
    println!("{}: position {}", output.switch, output.position);
    Ok(())
}
