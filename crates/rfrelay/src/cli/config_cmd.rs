//! `config` subcommand: show effective configuration and file path.

use super::{
    Config, ConfigOutput, GlobalOpts, RelayError, Result, effective_config, kv, kv_width,
    print_json,
};

pub(super) fn cmd_config(opts: &GlobalOpts, save: bool) -> Result<()> {
    let config = effective_config(opts);
    let config_path = opts.config_path.clone().or_else(Config::path);

    if save {
        let path = config_path
            .as_ref()
            .ok_or_else(|| RelayError::Config("no config directory".into()))?;
        config.save_to(path)?;
        log::info!("saved {}", path.display());
    }

    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let problems: Vec<String> = match config.validate() {
        Ok(()) => vec![],
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };

    if opts.json {
        return print_json(&ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            problems,
        });
    }

    let w = kv_width(&["Config file:", "  timeout_ms:"]);
    match &config_path {
        Some(p) if config_exists => {
            kv("Config file:", format_args!("{} (loaded)", p.display()), w)
        }
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    kv("  serial:", &config.serial, w);
    kv("  model:", &config.model, w);
    kv("  backend:", &config.backend, w);
    kv("  timeout_ms:", config.timeout_ms, w);
    kv("  name:", &config.name, w);

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}
