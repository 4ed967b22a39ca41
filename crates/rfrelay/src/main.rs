//! rfrelay: command-line control for USB RF relay and switch units.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

mod cli;

#[derive(Parser)]
#[command(
    name = "rfrelay",
    version,
    about = "Command-line control for USB RF relay and switch units"
)]
struct Args {
    /// Output as JSON (for list, info, read, switch, config)
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(flatten)]
    device: cli::DeviceArgs,

    #[command(subcommand)]
    command: cli::Command,
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(args.verbose)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    let opts = cli::GlobalOpts {
        json: args.json,
        config_path: args.config,
        device: args.device,
    };
    if let Err(e) = cli::run(args.command, &opts) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
