//! Handles the configuration of the server.
//!
//! this module is responsible for parsing the Tunedir.toml file and layering environment
//! variables and cli arguments on top of it.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use std::{path::PathBuf, str::FromStr};

pub static DEFAULT_CONFIG: &str = include_str!("../Tunedir.toml");

/// The name of the config file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "Tunedir.toml";

#[derive(Clone, Debug, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Where the music lives and how it is scanned
    #[serde(default)]
    pub library: LibrarySettings,
}

/// Values given on the command line, these win over the config file and the environment.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub log_level: Option<log::LevelFilter>,
    pub music_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the config file, environment variables, and CLI arguments.
    ///
    /// The environment variables are prefixed with `TUNEDIR_`, and nested keys are separated
    /// with `__` (e.g. `TUNEDIR_SERVER__PORT=8080`).
    ///
    /// # Errors
    ///
    /// This function will return an error if the config file is not found or if the config file is
    /// invalid.
    #[inline]
    pub fn init(config: PathBuf, overrides: Overrides) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from(config))
            .add_source(environment())
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        if let Some(port) = overrides.port {
            settings.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            settings.server.log_level = log_level;
        }
        if let Some(music_dir) = overrides.music_dir {
            settings.library.music_dir = music_dir;
        }

        settings.library.music_dir = expand_tilde(&settings.library.music_dir);

        Ok(settings)
    }

    /// Get the (default) path to the config file.
    /// If the config file does not exist at this path, it will be created with the default config.
    ///
    /// See [`crate::get_config_dir`] for more information about where this default path is located.
    ///
    /// # Errors
    ///
    /// This function will return an error if the system config directory (e.g., `~/.config` on linux) could not be found, or if the config file was missing and could not be created.
    #[inline]
    pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
        let config_dir = crate::get_config_dir()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e))?;

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir)?;
        }
        let config_file = config_dir.join(CONFIG_FILE_NAME);

        if !config_file.exists() {
            std::fs::write(&config_file, DEFAULT_CONFIG)?;
        }

        Ok(config_file)
    }

    /// The base URL that track URLs are built from.
    ///
    /// `public_url` if one is configured, otherwise `http://localhost:<port>`.
    /// Never ends with a `/`.
    #[must_use]
    #[inline]
    pub fn base_url(&self) -> String {
        self.server
            .public_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map_or_else(
                || format!("http://localhost:{}", self.server.port),
                |url| url.trim_end_matches('/').to_owned(),
            )
    }
}

/// `TUNEDIR_<SECTION>__<KEY>` variables, lists are comma separated.
fn environment() -> Environment {
    Environment::with_prefix("TUNEDIR")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("library.ignored_extensions")
        .try_parsing(true)
}

fn expand_tilde(path: &std::path::Path) -> PathBuf {
    shellexpand::tilde(&path.to_string_lossy())
        .into_owned()
        .into()
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ServerSettings {
    /// The port to listen on for HTTP requests.
    /// Default is 13525.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The address to bind to.
    /// Default is "127.0.0.1", the server is meant for the local machine.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// The URL clients should use to reach the server, used as the prefix of every
    /// `icon` and `audioUrl` in the track listing.
    /// Defaults to `http://localhost:<port>`.
    #[serde(default)]
    pub public_url: Option<String>,
    /// What level of logging to use.
    /// Default is "info".
    #[serde(default = "default_log_level")]
    #[serde(deserialize_with = "de_log_level")]
    pub log_level: log::LevelFilter,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct LibrarySettings {
    /// The root of the music library.
    /// Default is "~/Music".
    #[serde(default = "default_music_dir")]
    pub music_dir: PathBuf,
    /// The file name of a directory-level cover image,
    /// used for tracks without embedded art.
    /// Default is "cover.jpg".
    #[serde(default = "default_cover_file_name")]
    pub cover_file_name: String,
    /// Extensions (without the dot, case-insensitive) of files that are never tracks,
    /// even when their content looks like audio.
    /// Default is `["ini"]`.
    #[serde(default = "default_ignored_extensions")]
    pub ignored_extensions: Vec<String>,
    /// How many files have their metadata read at once while building a listing.
    /// Default is 4, values below 1 are treated as 1.
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,
}

fn de_log_level<'de, D>(deserializer: D) -> Result<log::LevelFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(log::LevelFilter::from_str(&s).unwrap_or_else(|_| default_log_level()))
}

const fn default_port() -> u16 {
    13525
}

fn default_bind_address() -> String {
    "127.0.0.1".to_owned()
}

const fn default_log_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

fn default_music_dir() -> PathBuf {
    shellexpand::tilde("~/Music").into_owned().into()
}

fn default_cover_file_name() -> String {
    "cover.jpg".to_owned()
}

fn default_ignored_extensions() -> Vec<String> {
    vec!["ini".to_owned()]
}

const fn default_scan_concurrency() -> usize {
    4
}

impl Default for ServerSettings {
    #[inline]
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            public_url: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for LibrarySettings {
    #[inline]
    fn default() -> Self {
        Self {
            music_dir: default_music_dir(),
            cover_file_name: default_cover_file_name(),
            ignored_extensions: default_ignored_extensions(),
            scan_concurrency: default_scan_concurrency(),
        }
    }
}
