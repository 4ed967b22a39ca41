//! `info` subcommand: identity, model profile and relay state of one unit.

use super::{
    Config, InfoOutput, RelayDevice, Result, Transport, UsbHandle, format_mask, kv, kv_width,
    models, open_relay, print_json,
};

fn family_label(model: &str) -> String {
    match models::detect_model(model).map(|p| p.family) {
        Some(models::ModelFamily::SolidState { command_root }) => {
            format!("solid-state ({command_root})")
        }
        Some(models::ModelFamily::Mechanical) => "mechanical".to_string(),
        None => "unknown".to_string(),
    }
}

pub(super) fn info_output<H: UsbHandle>(dev: &RelayDevice<H>) -> Result<InfoOutput> {
    let relay_mask = if dev.relay_count() > 0 {
        Some(dev.get_all_relays()?)
    } else {
        None
    };
    Ok(InfoOutput {
        name: dev.name().to_string(),
        serial: dev.serial().to_string(),
        model: dev.model().to_string(),
        family: family_label(dev.model()),
        relay_count: dev.relay_count(),
        relay_mask,
    })
}

pub(super) fn cmd_info<T: Transport>(transport: &T, config: &Config, json: bool) -> Result<()> {
    let dev = open_relay(transport, config)?;
    let output = info_output(&dev)?;
    dev.close();

    if json {
        return print_json(&output);
    }

    let w = kv_width(&["Name:", "Model:", "Serial:", "Family:", "Relays:", "Relay mask:"]);
    kv("Name:", &output.name, w);
    kv("Model:", &output.model, w);
    kv("Serial:", &output.serial, w);
    kv("Family:", &output.family, w);
    kv("Relays:", output.relay_count, w);
    match output.relay_mask {
        Some(mask) => kv("Relay mask:", format_mask(mask, output.relay_count), w),
        None => kv("Relay mask:", "(not reported by this model)", w),
    }
    Ok(())
}
