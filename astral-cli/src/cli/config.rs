//! Resolved client configuration from parsed arguments.

use std::fmt;
use std::path::PathBuf;

use astral_lib::audio::{AudioMode, Channel};
use clap::ArgMatches;

#[derive(Debug)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub cache_dir: PathBuf,
    pub mode: AudioMode,
    pub volumes: Vec<(Channel, f32)>,
    pub no_audio: bool,
    pub quiet: bool,
}

impl ClientConfig {
    pub fn from_matches(args: &ArgMatches) -> Result<Self, ConfigError> {
        let server = args
            .get_one::<String>("server")
            .cloned()
            .unwrap_or_else(|| astral_lib::constants::DEFAULT_SERVER.to_string());

        let cache_dir = match args.get_one::<String>("cache-dir") {
            Some(dir) => PathBuf::from(dir),
            None => default_cache_dir(),
        };

        let mode = match args.get_one::<String>("mode") {
            Some(mode) => mode.parse::<AudioMode>().map_err(ConfigError)?,
            None => AudioMode::Full,
        };

        let volumes = args
            .get_many::<String>("volume")
            .into_iter()
            .flatten()
            .map(|spec| parse_volume(spec))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            server,
            cache_dir,
            mode,
            volumes,
            no_audio: args.get_flag("no-audio"),
            quiet: args.get_flag("quiet"),
        })
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("astral"))
        .unwrap_or_else(|| PathBuf::from(".astral-cache"))
}

/// Parse `channel=level` with a level in `0.0..=1.0`.
pub fn parse_volume(spec: &str) -> Result<(Channel, f32), ConfigError> {
    let (channel, level) = spec
        .split_once('=')
        .ok_or_else(|| ConfigError(format!("expected CHANNEL=LEVEL, got '{}'", spec)))?;
    let channel = channel.parse::<Channel>().map_err(ConfigError)?;
    let level = parse_level(level)?;
    Ok((channel, level))
}

pub fn parse_level(level: &str) -> Result<f32, ConfigError> {
    let value = level
        .trim()
        .parse::<f32>()
        .map_err(|_| ConfigError(format!("'{}' is not a number", level)))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError(format!("volume {} is outside 0..1", value)));
    }
    Ok(value)
}
