//! CLI subcommands: discovery, relay state, logical switches, raw probing.

mod config_cmd;
mod info;
mod list;
mod probe;
mod state;
mod switch;

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use serde::Serialize;

pub(super) use rfrelay_lib::config::Config;
pub(super) use rfrelay_lib::error::{RelayError, Result};
pub(super) use rfrelay_lib::matcher::DeviceListing;
pub(super) use rfrelay_lib::models;
pub(super) use rfrelay_lib::transport::{Transport, UsbHandle};
pub(super) use rfrelay_lib::usb::NusbTransport;
pub(super) use rfrelay_lib::{RelayDevice, RelaySwitch};

const PADDING: usize = 2;

/// Alignment width for key-value output: longest key plus padding.
pub(super) fn kv_width(keys: &[&str]) -> usize {
    keys.iter().map(|k| k.len()).max().map_or(0, |m| m + PADDING)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| RelayError::Config(format!("JSON output: {e}")))?;
    println!("{text}");
    Ok(())
}

/// Relay mask as a binary string, relay 0 rightmost.
pub(super) fn format_mask(mask: u16, relay_count: u8) -> String {
    let width = usize::from(relay_count.max(1));
    format!("0b{mask:0width$b}")
}

/// Accepts decimal, `0x` hex or `0b` binary.
pub(super) fn parse_number(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2)
    } else {
        s.parse::<u64>()
    };
    parsed.map_err(|e| format!("invalid number {s:?}: {e}"))
}

fn parse_mask(s: &str) -> std::result::Result<u16, String> {
    let n = parse_number(s)?;
    u8::try_from(n)
        .map(u16::from)
        .map_err(|_| format!("mask {s} does not fit in 8 relays"))
}

fn parse_opcode(s: &str) -> std::result::Result<u8, String> {
    let n = parse_number(s)?;
    u8::try_from(n).map_err(|_| format!("opcode {s} is not a byte"))
}

// ── Global options ──

/// Device selection flags; each overrides the matching config value.
#[derive(Args, Debug, Default, Clone)]
pub struct DeviceArgs {
    /// Serial number suffix to match ("*" for any)
    #[arg(long, global = true, value_name = "SERIAL")]
    pub sn: Option<String>,

    /// Model substring to match ("*" for any)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// USB transfer timeout in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Relay backend ("mc" / "minicircuits")
    #[arg(long, global = true)]
    pub backend: Option<String>,
}

pub struct GlobalOpts {
    pub json: bool,
    pub config_path: Option<PathBuf>,
    pub device: DeviceArgs,
}

/// Config file contents, or defaults, with any parse warning logged.
pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    match custom_path {
        Some(path) => {
            let (config, warnings) = Config::load_from(path);
            for w in &warnings {
                log::warn!("{w}");
            }
            config
        }
        None => Config::load(),
    }
}

/// Config with command-line overrides applied.
pub(super) fn effective_config(opts: &GlobalOpts) -> Config {
    apply_overrides(load_config(opts.config_path.as_deref()), &opts.device)
}

fn apply_overrides(mut config: Config, args: &DeviceArgs) -> Config {
    if let Some(sn) = &args.sn {
        config.serial = sn.clone();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(ms) = args.timeout {
        config.timeout_ms = ms;
    }
    if let Some(backend) = &args.backend {
        config.backend = backend.clone();
    }
    config
}

/// Reject a config that cannot be used to talk to a device.
pub(super) fn check_config(config: &Config) -> Result<()> {
    config.validate().map_err(|errors| {
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        RelayError::Config(msgs.join("; "))
    })
}

/// Open the first unit selected by `config`.
pub(super) fn open_relay<T: Transport>(
    transport: &T,
    config: &Config,
) -> Result<RelayDevice<T::Handle>> {
    check_config(config)?;
    RelayDevice::open(
        transport,
        &config.scan_options()?,
        &config.pattern(),
        config.name.as_str(),
    )
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct ListOutput {
    pub count: usize,
    pub devices: Vec<DeviceListing>,
}

#[derive(Serialize)]
pub(super) struct InfoOutput {
    pub name: String,
    pub serial: String,
    pub model: String,
    pub family: String,
    pub relay_count: u8,
    pub relay_mask: Option<u16>,
}

#[derive(Serialize)]
pub(super) struct ReadOutput {
    pub serial: String,
    pub relay_count: u8,
    pub mask: u16,
    pub relays: Vec<bool>,
}

#[derive(Serialize)]
pub(super) struct SwitchOutput {
    pub switch: String,
    pub model: String,
    pub position: u32,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub problems: Vec<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List connected relay units matching --sn / --model
    List,

    /// Show identity and state of the selected unit
    Info,

    /// Read the relay mask of the selected unit
    Read,

    /// Set every relay from a mask (bit k = relay k)
    Set {
        /// Relay mask: decimal, 0x hex or 0b binary
        #[arg(value_parser = parse_mask)]
        mask: u16,
    },

    /// Read or move a logical switch
    Switch {
        /// Switch letter (A, B, ...)
        selector: char,
        /// Position to move to (1-based); omit to read
        position: Option<u32>,
    },

    /// Send a bare opcode and dump the first 10 reply bytes
    Probe {
        /// Opcode: decimal or 0x hex
        #[arg(value_parser = parse_opcode)]
        opcode: u8,
    },

    /// Show effective configuration and file path
    Config {
        /// Write the effective settings (including flags) to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, opts: &GlobalOpts) -> Result<()> {
    let transport = NusbTransport::new();
    match cmd {
        Command::List => list::cmd_list(&transport, &effective_config(opts), opts.json),
        Command::Info => info::cmd_info(&transport, &effective_config(opts), opts.json),
        Command::Read => state::cmd_read(&transport, &effective_config(opts), opts.json),
        Command::Set { mask } => {
            if opts.json {
                warn_json_unsupported("set");
            }
            state::cmd_set(&transport, &effective_config(opts), mask)
        }
        Command::Switch { selector, position } => switch::cmd_switch(
            &transport,
            &effective_config(opts),
            selector,
            position,
            opts.json,
        ),
        Command::Probe { opcode } => {
            if opts.json {
                warn_json_unsupported("probe");
            }
            probe::cmd_probe(&transport, &effective_config(opts), opcode)
        }
        Command::Config { save } => config_cmd::cmd_config(opts, save),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_width_uses_longest_key() {
        assert_eq!(kv_width(&["Serial:", "Relay count:"]), 14);
        assert_eq!(kv_width(&[]), 0);
    }

    #[test]
    fn format_kv_pads() {
        assert_eq!(format_kv("Key:", "value", 10), "Key:      value");
        assert_eq!(format_kv("ExactWidth:", "val", 10), "ExactWidth:val");
    }

    #[test]
    fn mask_formatting() {
        assert_eq!(format_mask(0b01, 2), "0b01");
        assert_eq!(format_mask(0b101, 8), "0b00000101");
        assert_eq!(format_mask(0, 0), "0b0");
    }

    #[test]
    fn number_parsing() {
        assert_eq!(parse_number("15"), Ok(15));
        assert_eq!(parse_number("0x28"), Ok(40));
        assert_eq!(parse_number("0b101"), Ok(5));
        assert!(parse_number("abc").is_err());
    }

    #[test]
    fn mask_parsing_limits() {
        assert_eq!(parse_mask("0xFF"), Ok(255));
        assert!(parse_mask("256").is_err());
        assert_eq!(parse_opcode("0x29"), Ok(41));
        assert!(parse_opcode("300").is_err());
    }

    #[test]
    fn overrides_replace_config_values() {
        let args = DeviceArgs {
            sn: Some("032".into()),
            model: None,
            timeout: Some(250),
            backend: Some("minicircuits".into()),
        };
        let config = apply_overrides(Config::default(), &args);
        assert_eq!(config.serial, "032");
        assert_eq!(config.model, "*");
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.backend, "minicircuits");
    }

    #[test]
    fn load_config_from_custom_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = \"SP8T\"\n").unwrap();
        let config = load_config(Some(&path));
        assert_eq!(config.model, "SP8T");
        assert_eq!(config.serial, "*");
    }

    #[test]
    fn check_config_joins_problems() {
        let config = Config {
            timeout_ms: 0,
            backend: "x".into(),
            ..Config::default()
        };
        let err = check_config(&config).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("timeout_ms"), "{msg}");
        assert!(msg.contains("backend"), "{msg}");
    }
}
