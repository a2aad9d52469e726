use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Configuration file consulted when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "gacha-sim.toml";
/// State file used when neither the config file nor `--state` names one.
pub(crate) const DEFAULT_STATE_FILE: &str = "gacha-sim.json";
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Optional settings read from the TOML configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    state_path: Option<PathBuf>,
    seed: Option<u64>,
    log_level: Option<String>,
}

impl Config {
    /// Reads the configuration. An explicitly requested file must exist; the
    /// default file is optional.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read config file at {}", path.display()));
            }
        };
        Self::parse(&contents)
            .with_context(|| format!("invalid config file at {}", path.display()))
    }

    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("failed to parse config toml")?;
        if let Some(level) = &config.log_level {
            if level.trim().is_empty() {
                bail!("log_level must not be blank");
            }
        }
        Ok(config)
    }

    /// Merges command-line overrides on top of the file values.
    pub(crate) fn resolve(self, state_path: Option<PathBuf>, seed: Option<u64>) -> Settings {
        Settings {
            state_path: state_path
                .or(self.state_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            seed: seed.or(self.seed),
            log_level: self
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
        }
    }
}

/// Effective settings for one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) state_path: PathBuf,
    pub(crate) seed: Option<u64>,
    pub(crate) log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_falls_back_to_defaults() {
        let settings = Config::parse("").expect("empty config parses").resolve(None, None);
        assert_eq!(settings.state_path, PathBuf::from(DEFAULT_STATE_FILE));
        assert_eq!(settings.seed, None);
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn flags_override_file_values() {
        let config = Config::parse(
            r#"
                state_path = "saves/stream.json"
                seed = 42
                log_level = "debug"
            "#,
        )
        .expect("config parses");

        let from_file = config.clone().resolve(None, None);
        assert_eq!(from_file.state_path, PathBuf::from("saves/stream.json"));
        assert_eq!(from_file.seed, Some(42));
        assert_eq!(from_file.log_level, "debug");

        let overridden = config.resolve(Some(PathBuf::from("other.json")), Some(7));
        assert_eq!(overridden.state_path, PathBuf::from("other.json"));
        assert_eq!(overridden.seed, Some(7));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("seeed = 1").is_err());
        assert!(Config::parse("log_level = \" \"").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let missing = std::env::temp_dir().join(format!("{}.toml", uuid::Uuid::new_v4()));
        assert!(Config::load(Some(&missing)).is_err());
    }
}
