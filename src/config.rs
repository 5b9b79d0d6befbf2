//! Configuration for the group sender
//!
//! Loads configuration from config.yml file, environment variables win.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default constants (fallback if config.yml not found)
pub const ACCOUNTS_FILE: &str = "accounts.json";
pub const SESSION_FILE_PREFIX: &str = "group_sender_session_";
pub const DEFAULT_DELAY_SECS: u64 = 60;
pub const FAILURE_COOLDOWN_SECS: u64 = 5;

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    accounts_file: Option<String>,
    sessions: Option<SessionsConfig>,
    sending: Option<SendingConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionsConfig {
    dir: Option<String>,
    prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SendingConfig {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    delay_secs: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    failure_cooldown_secs: Option<String>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Main configuration struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub accounts_file: PathBuf,
    pub session_dir: PathBuf,
    pub session_prefix: String,
    pub default_delay_secs: u64,
    pub failure_cooldown_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| Self::from_yaml(YamlConfig::default()))
    }

    /// If value from YAML looks like ${VAR}, return the variable name
    fn placeholder(value: &str) -> Option<&str> {
        if value.starts_with("${") && value.ends_with('}') {
            Some(&value[2..value.len() - 1])
        } else {
            None
        }
    }

    /// Resolve a value: explicit env_key first, then ${VAR} placeholder, then the raw value
    fn resolve_env_string(value: Option<String>, env_key: &str, default: &str) -> String {
        if let Ok(env_val) = std::env::var(env_key) {
            return env_val;
        }
        if let Some(ref v) = value {
            if let Some(var_name) = Self::placeholder(v) {
                return std::env::var(var_name).unwrap_or_else(|_| default.to_string());
            }
        }
        value.unwrap_or_else(|| default.to_string())
    }

    /// Resolve an unsigned value from string config or env var
    fn resolve_env_u64(value: Option<String>, env_key: &str, default: u64) -> u64 {
        if let Ok(env_val) = std::env::var(env_key) {
            if let Ok(parsed) = env_val.trim().parse::<u64>() {
                return parsed;
            }
        }
        if let Some(ref v) = value {
            if let Some(var_name) = Self::placeholder(v) {
                if let Ok(env_val) = std::env::var(var_name) {
                    if let Ok(parsed) = env_val.trim().parse::<u64>() {
                        return parsed;
                    }
                }
            }
            if let Ok(parsed) = v.trim().parse::<u64>() {
                return parsed;
            }
        }
        default
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let sessions = yaml.sessions.unwrap_or_default();
        let sending = yaml.sending.unwrap_or_default();

        Self {
            accounts_file: PathBuf::from(Self::resolve_env_string(
                yaml.accounts_file,
                "GROUP_SENDER_ACCOUNTS_FILE",
                ACCOUNTS_FILE,
            )),
            session_dir: PathBuf::from(Self::resolve_env_string(
                sessions.dir,
                "GROUP_SENDER_SESSION_DIR",
                ".",
            )),
            session_prefix: Self::resolve_env_string(
                sessions.prefix,
                "GROUP_SENDER_SESSION_PREFIX",
                SESSION_FILE_PREFIX,
            ),
            default_delay_secs: Self::resolve_env_u64(
                sending.delay_secs,
                "GROUP_SENDER_DELAY_SECS",
                DEFAULT_DELAY_SECS,
            ),
            failure_cooldown_secs: Self::resolve_env_u64(
                sending.failure_cooldown_secs,
                "GROUP_SENDER_FAILURE_COOLDOWN_SECS",
                FAILURE_COOLDOWN_SECS,
            ),
        }
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_secs(self.failure_cooldown_secs)
    }
}
