use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::ollama::{DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProfileConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub stream: Option<bool>,
    pub chat: Option<bool>,
    pub timeout: Option<u64>,
    /// Extra request fields, forwarded verbatim.
    pub params: Option<toml::Table>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    profiles: Option<HashMap<String, ProfileConfig>>,
}

/// Values given on the command line; `None` means "not passed".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub no_stream: bool,
    pub chat: bool,
    pub timeout: Option<u64>,
    pub params: Vec<(String, Value)>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub model: String,
    pub stream: bool,
    pub chat: bool,
    pub timeout: Option<Duration>,
    pub params: Map<String, Value>,
}

pub fn load_profile(name: &str) -> Result<ProfileConfig, String> {
    let (path, config) = read_config()?;

    let profiles = config.profiles.ok_or_else(|| {
        format!(
            "Config file '{}' does not contain a [profiles] section.",
            path.display()
        )
    })?;

    profiles.get(name).cloned().ok_or_else(|| {
        format!(
            "Profile '{}' not found in config file '{}'.",
            name,
            path.display()
        )
    })
}

/// Checks that the config file parses and, if given, that the profile exists.
pub fn validate_config(profile: Option<&str>) -> Result<PathBuf, String> {
    let (path, _) = read_config()?;
    if let Some(name) = profile {
        let profile = load_profile(name)?;
        profile_params(&profile)?;
    }
    Ok(path)
}

fn read_config() -> Result<(PathBuf, ConfigFile), String> {
    let path = config_path()?;
    let raw = fs::read_to_string(&path)
        .map_err(|err| format!("Failed to read config file '{}': {err}", path.display()))?;

    let config: ConfigFile = toml::from_str(&raw)
        .map_err(|err| format!("Failed to parse config file '{}': {err}", path.display()))?;
    Ok((path, config))
}

fn config_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var("OTK_CONFIG") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed)
                .join("ollama-toolkit")
                .join("config.toml"));
        }
    }

    let home = env::var("HOME").map_err(|_| {
        "Cannot resolve config path: set OTK_CONFIG or HOME/XDG_CONFIG_HOME.".to_string()
    })?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("ollama-toolkit")
        .join("config.toml"))
}

/// Resolves settings from the process environment and the named profile.
pub fn resolve(cli: Overrides, profile: Option<&str>) -> Result<Settings, String> {
    let profile = profile.map(load_profile).transpose()?.unwrap_or_default();
    resolve_with(cli, profile, |key| env::var(key).ok())
}

/// Precedence: command line, then environment, then profile, then defaults.
pub fn resolve_with<F>(cli: Overrides, profile: ProfileConfig, env_var: F) -> Result<Settings, String>
where
    F: Fn(&str) -> Option<String>,
{
    let env_var = |key: &str| env_var(key).filter(|value| !value.trim().is_empty());

    let model = cli
        .model
        .or_else(|| env_var("OTK_MODEL"))
        .or_else(|| profile.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let base_url = cli
        .base_url
        .or_else(|| env_var("OLLAMA_HOST"))
        .or_else(|| profile.base_url.clone())
        .map(|url| normalize_base_url(&url))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let env_timeout = env_var("OTK_TIMEOUT")
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|_| {
                format!("Invalid OTK_TIMEOUT '{raw}'. Expected a whole number of seconds.")
            })
        })
        .transpose()?;
    let timeout = cli
        .timeout
        .or(env_timeout)
        .or(profile.timeout)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    let stream = !cli.no_stream && profile.stream.unwrap_or(true);
    let chat = cli.chat || profile.chat.unwrap_or(false);

    let mut params = profile_params(&profile)?;
    params.extend(cli.params);

    Ok(Settings {
        base_url,
        model,
        stream,
        chat,
        timeout,
        params,
    })
}

fn profile_params(profile: &ProfileConfig) -> Result<Map<String, Value>, String> {
    let Some(table) = &profile.params else {
        return Ok(Map::new());
    };
    match serde_json::to_value(table) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Profile params must be a table.".to_string()),
        Err(err) => Err(format!("Invalid profile params: {err}")),
    }
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Parses a `KEY=VALUE` request field. VALUE is read as JSON when possible
/// and kept as a string otherwise.
pub fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Invalid param '{raw}'. Expected KEY=VALUE."))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Invalid param '{raw}'. Key must not be empty."));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
