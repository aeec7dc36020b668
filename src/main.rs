//! CLI entry point.

use anyhow::Context;
use clap::Parser;
use log::info;
use std::{fs, path::PathBuf};

use mail_detach::{Config, Detacher, Mode};

/// Detach oversized attachments from IMAP mailboxes.
#[derive(Parser)]
#[command(name = "mail-detach", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "MAIL_DETACH_CONFIG"
    )]
    config: PathBuf,

    /// Overrides the operating mode from the configuration file.
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();

    let raw = fs::read_to_string(&cli.config)
        .with_context(|| format!("cannot read configuration file {}", cli.config.display()))?;
    let mut config: Config = toml::from_str(&raw)
        .with_context(|| format!("cannot parse configuration file {}", cli.config.display()))?;

    if let Some(mode) = cli.mode {
        config.detach.mode = mode;
    }

    let export_dir = config.detach.export_path()?;
    fs::create_dir_all(&export_dir)
        .with_context(|| format!("cannot create export directory {}", export_dir.display()))?;

    let detacher = Detacher::new(config.imap, config.detach);
    let report = detacher.run()?;
    info!("{}", report);

    Ok(())
}
