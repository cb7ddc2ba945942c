//! The daemon binary: reads the configuration and starts the server.
//! Nothing to test here, everything it calls lives in the `tunedir_daemon` library crate.

use std::path::PathBuf;

use clap::Parser;
use tunedir_core::config::{Overrides, Settings};
use tunedir_daemon::start_daemon;

#[cfg(not(feature = "cli"))]
compile_error!("The cli feature is required to build the daemon binary");

/// Options configurable via the CLI.
#[derive(Parser)]
#[clap(version, about)]
struct Flags {
    /// Sets the port number to listen on.
    #[clap(long)]
    port: Option<u16>,
    /// config file path
    #[clap(long)]
    config: Option<PathBuf>,
    /// log level
    #[clap(long)]
    log_level: Option<log::LevelFilter>,
    /// The directory to index, overrides `library.music_dir`
    #[clap(long)]
    music_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let flags = Flags::parse();

    let config_file = match flags.config {
        Some(config) => config,
        None => Settings::get_config_path()?,
    };

    let settings = Settings::init(
        config_file,
        Overrides {
            port: flags.port,
            log_level: flags.log_level,
            music_dir: flags.music_dir,
        },
    )?;

    start_daemon(settings).await
}
