//! `probe` subcommand: send a bare opcode and dump the reply head.

use super::{Config, Result, Transport, open_relay};

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn ascii_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
        .collect()
}

pub(super) fn cmd_probe<T: Transport>(transport: &T, config: &Config, opcode: u8) -> Result<()> {
    let dev = open_relay(transport, config)?;
    let head = dev.probe(opcode)?;
    dev.close();
    println!("0x{opcode:02X} -> {}  |{}|", hex_dump(&head), ascii_dump(&head));
    Ok(())
}
