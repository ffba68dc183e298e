use std::path::Path;
use std::{env, fs, io};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_PREFIX: &str = "!";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Expected a token in the environment (DISCORD_TOKEN)")]
    MissingToken,

    #[error("Could not read config file: {0}")]
    Read(#[from] io::Error),

    #[error("Could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Command prefix must not be empty")]
    EmptyPrefix,
}

/// The optional `config.json` next to the binary.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
struct FileConfig {
    prefix: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig { prefix: DEFAULT_PREFIX.to_string() }
    }
}

pub struct Config {
    pub token: String,
    pub prefix: String,
}

impl Config {
    /// Token from `DISCORD_TOKEN`, prefix from `COMMAND_PREFIX` or the
    /// config file (`BOT_CONFIG`, default `config.json`).
    pub fn load() -> Result<Config, ConfigError> {
        let token = env::var("DISCORD_TOKEN").map_err(|_| ConfigError::MissingToken)?;

        let path = env::var("BOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let file = read_file_config(Path::new(&path))?;

        let prefix = env::var("COMMAND_PREFIX").unwrap_or(file.prefix);

        let config = Config::new(token, prefix)?;
        info!("Using command prefix {}", config.prefix);

        Ok(config)
    }

    fn new(token: String, prefix: String) -> Result<Config, ConfigError> {
        let token = token.trim().to_string();
        let prefix = prefix.trim().to_string();

        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }

        if prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }

        Ok(Config { token, prefix })
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => parse_file_config(&content),
        Err(why) if why.kind() == io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(why) => Err(ConfigError::Read(why)),
    }
}

fn parse_file_config(content: &str) -> Result<FileConfig, ConfigError> {
    Ok(serde_json::from_str(content)?)
}
