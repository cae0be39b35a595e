//! # Lattice - Wayland shared-memory client
//!
//! Shows either a layer-shell panel (with a popup and a sub-surface) or a
//! plain top-level window, each filled with a checkerboard. Exits with 0
//! when the compositor closes the primary surface and 1 on a fatal error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use lattice::config::{LatticeConfig, SceneKind};
use lattice::logging::{self, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "lattice")]
#[command(about = "A shared-memory Wayland client driving the configure/ack/commit handshake")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = LatticeConfig::default_path())]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Scene to show: panel or window (overrides the config file)
    #[arg(short, long)]
    role: Option<SceneKind>,

    /// Write the effective configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    dump_config: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> LatticeConfig {
    let mut config = match LatticeConfig::load(&cli.config) {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            info!("📝 Using default configuration ({:#})", e);
            LatticeConfig::default()
        }
    };

    if let Some(role) = cli.role {
        config.general.role = role;
    }
    if cli.debug {
        config.general.debug = true;
    }
    config
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli);

    if let Some(path) = &cli.dump_config {
        config.save(path)?;
        info!("💾 Configuration written to {}", path.display());
        return Ok(());
    }

    info!("🚀 Starting Lattice v{}", lattice::VERSION);
    if let Some(commit) = option_env!("GIT_COMMIT") {
        info!("📄 Build {} ({})", env!("BUILD_DATE"), commit);
    }

    lattice::client::run(config)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Only the level is taken from the file here; load errors are reported
    // once the logger is up.
    let level = if cli.debug {
        LogLevel::Debug
    } else {
        LatticeConfig::load(&cli.config)
            .ok()
            .map(|config| {
                if config.general.debug {
                    LogLevel::Debug
                } else {
                    config.general.log_level.parse().unwrap_or_default()
                }
            })
            .unwrap_or_default()
    };
    logging::init(level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {:#}", e);
            eprintln!("lattice: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
