#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::env;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    ApiKey,
    BackendHealthCheckTimeout,
    BackendURL,
    ConfigFile,
    SessionID,
    SessionsRefreshInterval,
    StoreFile,
}

impl ConfigKey {
    /// Keys holding a duration in milliseconds.
    fn is_millis(&self) -> bool {
        return *self == ConfigKey::BackendHealthCheckTimeout
            || *self == ConfigKey::SessionsRefreshInterval;
    }
}

fn app_dir() -> path::PathBuf {
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();
    #[cfg(target_os = "macos")]
    let base = env::var("HOME")
        .ok()
        .map(|home| return path::PathBuf::from(home).join(".config"));

    return base
        .unwrap_or_else(|| return path::PathBuf::from("."))
        .join("ragchat");
}

fn validate_millis(key: ConfigKey, val: &str) -> Result<()> {
    match val.parse::<u64>() {
        Ok(millis) if millis > 0 => return Ok(()),
        _ => bail!("invalid value for key '{key}': {val}\nExpected a positive number of milliseconds"),
    }
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    /// Reads a millisecond key, falling back to its default when unset.
    pub fn get_millis(key: ConfigKey) -> Result<u64> {
        let mut val = Config::get(key);
        if val.is_empty() {
            val = Config::default(key);
        }
        validate_millis(key, &val)?;

        return Ok(val.parse::<u64>()?);
    }

    pub fn default(key: ConfigKey) -> String {
        let config_path = app_dir().join("config.toml");
        let store_path = app_dir().join("active-session.yaml");

        let res = match key {
            ConfigKey::ApiKey => "".to_string(),
            ConfigKey::BackendHealthCheckTimeout => "1000".to_string(),
            ConfigKey::BackendURL => "http://localhost:8000/api".to_string(),
            ConfigKey::SessionsRefreshInterval => "10000".to_string(),
            ConfigKey::StoreFile => store_path.to_string_lossy().to_string(),

            // Special
            ConfigKey::ConfigFile => config_path.to_string_lossy().to_string(),
            ConfigKey::SessionID => "".to_string(),
        };

        return res;
    }

    pub async fn load(clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                if key == ConfigKey::ConfigFile || key == ConfigKey::SessionID {
                    continue;
                }
                if let Some(val) = doc.get(&key.to_string()) {
                    if let Some(val_int) = val.as_integer() {
                        if key.is_millis() {
                            validate_millis(key, &val_int.to_string())?;
                        }
                        Config::set(key, &val_int.to_string());
                    } else if let Some(val_str) = val.as_str() {
                        if val_str.is_empty() {
                            continue;
                        }
                        if key.is_millis() {
                            validate_millis(key, val_str)?;
                        }
                        Config::set(key, val_str);
                    } else {
                        bail!("config.toml has an invalid value for key '{key}'");
                    }
                }
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    if key.is_millis() {
                        validate_millis(key, val)?;
                    }
                    Config::set(key, val)
                }
            }
        }

        tracing::debug!(
            backend_url = Config::get(ConfigKey::BackendURL),
            store_file = Config::get(ConfigKey::StoreFile),
            sessions_refresh_interval = Config::get(ConfigKey::SessionsRefreshInterval),
            authenticated = !Config::get(ConfigKey::ApiKey).is_empty(),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::SessionID || key == ConfigKey::ConfigFile {
                    return None;
                }

                let key_str = key.to_string();
                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key_str.as_str()))?;

                let description = arg
                    .get_help()
                    .map(|help| return help.to_string())
                    .unwrap_or_default()
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<i64>().is_ok() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = \"{val}\"");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}

/// Environment variable used to override where debug logs are written.
pub fn log_dir() -> String {
    return env::var("RAGCHAT_LOG_DIR")
        .unwrap_or_else(|_| return app_dir().to_string_lossy().to_string());
}
