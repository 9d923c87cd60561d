use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use tracing::warn;

macro_rules! const_str {
    ($name:ident) => {
        pub const $name: &str = stringify!($name);
    };
}

const_str!(DISCORD_TOKEN);
const_str!(DATABASE_URL);
const_str!(DATA_DIRECTORY);
const_str!(CONFIG_PATH);
const_str!(OWNERS);
const_str!(COMMAND_DISABLE_LIST);

const_str!(GITHUB_TOKEN);
const_str!(GITHUB_API_URL);
const_str!(PISTON_API_URL);
const_str!(DISCORD_API_URL);
const_str!(CONTRIBUTOR_SYNC_INTERVAL_SECS);

const_str!(LOG_LEVEL);
const_str!(LOG_STYLE);
const_str!(LOG_PATH);
const_str!(LOG_DIRECTORY);

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_PISTON_API_URL: &str = "https://emkc.org/api/v2/piston";
pub const DEFAULT_DISCORD_API_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_CONTRIBUTOR_SYNC_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Reads a required environment variable, naming it in the error when missing.
pub fn env_var_with_context(name: &str) -> anyhow::Result<String> {
    std::env::var(name).context(format!("missing environment variable {}", name))
}

/// Reads an optional environment variable, treating empty values as unset.
pub fn optional_env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Parses an optional environment variable, logging and ignoring values that fail to parse.
pub fn parse_env_var<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = optional_env_var(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring invalid value for {}: {}", name, e);
            None
        }
    }
}

pub fn get_data_directory() -> PathBuf {
    optional_env_var(DATA_DIRECTORY)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

pub fn get_config_path() -> PathBuf {
    optional_env_var(CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|| get_data_directory().join("config.json"))
}

pub fn get_contributor_sync_interval() -> Duration {
    parse_env_var::<u64>(CONTRIBUTOR_SYNC_INTERVAL_SECS)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CONTRIBUTOR_SYNC_INTERVAL)
}

pub fn get_github_api_url() -> String {
    optional_env_var(GITHUB_API_URL).unwrap_or_else(|| DEFAULT_GITHUB_API_URL.into())
}

pub fn get_piston_api_url() -> String {
    optional_env_var(PISTON_API_URL).unwrap_or_else(|| DEFAULT_PISTON_API_URL.into())
}

pub fn get_discord_api_url() -> String {
    optional_env_var(DISCORD_API_URL).unwrap_or_else(|| DEFAULT_DISCORD_API_URL.into())
}
