//! `list` subcommand: enumerate matching relay units.

use super::{Config, ListOutput, RelayDevice, Result, Transport, check_config, print_json};

pub(super) fn list_output<T: Transport>(transport: &T, config: &Config) -> Result<ListOutput> {
    check_config(config)?;
    let devices = RelayDevice::<T::Handle>::list_matches(
        transport,
        &config.scan_options()?,
        &config.pattern(),
    )?;
    Ok(ListOutput {
        count: devices.len(),
        devices,
    })
}

pub(super) fn cmd_list<T: Transport>(transport: &T, config: &Config, json: bool) -> Result<()> {
    let output = list_output(transport, config)?;

    if json {
        return print_json(&output);
    }

    if output.devices.is_empty() {
        println!("No relay units found.");
        return Ok(());
    }

    println!(
        "Found {} relay unit{}:",
        output.count,
        if output.count == 1 { "" } else { "s" }
    );
    println!();
    for (i, dev) in output.devices.iter().enumerate() {
        println!("  [{}] {}", i + 1, dev.model);
        println!("      Serial: {}", dev.serial);
    }
    Ok(())
}
