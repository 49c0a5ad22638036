use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::Result;

pub const BASE_URL_ENV_VAR: &str = "OPSDECK_BASE_URL";
pub const API_KEY_ENV_VAR: &str = "OPSDECK_API_KEY";
pub const OPSDECK_HOME_ENV_VAR: &str = "OPSDECK_HOME";

pub const DEFAULT_BASE_URL: &str = "http://localhost:4000/";
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(30);
const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolved client configuration. Environment variables win over the
/// optional `$OPSDECK_HOME/config.toml`; defaults fill the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: Url,
    pub api_key: Option<String>,
    /// Keep viewer output across invocations instead of clearing on start.
    pub persist_output: bool,
    /// How often the session guard re-validates the backend session.
    pub status_interval: Duration,
    /// Argument names the interactive input may not override.
    pub read_only_args: BTreeSet<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigToml {
    base_url: Option<String>,
    api_key: Option<String>,
    persist_output: Option<bool>,
    status_interval_secs: Option<u64>,
    read_only_args: Option<Vec<String>>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let file = read_config_file(&find_opsdeck_home())?;
        Self::from_sources(file, |name| std::env::var(name).ok())
    }

    fn from_sources(file: ConfigToml, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url_raw = env(BASE_URL_ENV_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&base_url_raw)?;

        let api_key = env(API_KEY_ENV_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or(file.api_key);

        let status_interval = file
            .status_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_STATUS_INTERVAL);

        Ok(Self {
            base_url,
            api_key,
            persist_output: file.persist_output.unwrap_or(false),
            status_interval,
            read_only_args: file
                .read_only_args
                .unwrap_or_default()
                .into_iter()
                .collect(),
        })
    }
}

/// `$OPSDECK_HOME`, or `~/.opsdeck` when unset.
pub fn find_opsdeck_home() -> PathBuf {
    match std::env::var(OPSDECK_HOME_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".opsdeck"),
    }
}

fn read_config_file(opsdeck_home: &Path) -> Result<ConfigToml> {
    let path = opsdeck_home.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(ConfigToml::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    Ok(toml::from_str(&contents)?)
}

/// The base URL is always joined with relative endpoint paths, so it must
/// end with a slash for `Url::join` to keep any path prefix.
fn parse_base_url(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Ok(Url::parse(&normalized)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let config = Config::from_sources(ConfigToml::default(), no_env).unwrap();
        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.api_key, None);
        assert!(!config.persist_output);
        assert_eq!(config.status_interval, DEFAULT_STATUS_INTERVAL);
        assert!(config.read_only_args.is_empty());
    }

    #[test]
    fn env_wins_over_config_file() {
        let file = ConfigToml {
            base_url: Some("http://file-host:1234".to_string()),
            api_key: Some("file-key".to_string()),
            ..ConfigToml::default()
        };
        let config = Config::from_sources(file, |name| match name {
            BASE_URL_ENV_VAR => Some("http://env-host:4000".to_string()),
            API_KEY_ENV_VAR => Some("env-key".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.base_url.as_str(), "http://env-host:4000/");
        assert_eq!(config.api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn blank_env_values_fall_through() {
        let file = ConfigToml {
            api_key: Some("file-key".to_string()),
            ..ConfigToml::default()
        };
        let config = Config::from_sources(file, |name| match name {
            API_KEY_ENV_VAR => Some("   ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let file = ConfigToml {
            base_url: Some("http://host:4000/ops".to_string()),
            ..ConfigToml::default()
        };
        let config = Config::from_sources(file, no_env).unwrap();
        assert_eq!(config.base_url.as_str(), "http://host:4000/ops/");
        let joined = config.base_url.join("auth-status").unwrap();
        assert_eq!(joined.as_str(), "http://host:4000/ops/auth-status");
    }

    #[test]
    fn config_file_values_are_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
base_url = "http://deploy-box:9000"
api_key = "ops-key"
persist_output = true
status_interval_secs = 5
read_only_args = ["registry", "env"]
"#,
        )
        .unwrap();

        let file = read_config_file(dir.path()).unwrap();
        let config = Config::from_sources(file, no_env).unwrap();
        assert_eq!(config.base_url.as_str(), "http://deploy-box:9000/");
        assert_eq!(config.api_key.as_deref(), Some("ops-key"));
        assert!(config.persist_output);
        assert_eq!(config.status_interval, Duration::from_secs(5));
        assert!(config.read_only_args.contains("registry"));
        assert!(config.read_only_args.contains("env"));
    }

    #[test]
    fn missing_config_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let file = read_config_file(dir.path()).unwrap();
        assert!(file.base_url.is_none());
    }
}
