use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::cli::{Cli, LogFormat};
use crate::config as rules_config;

fn default_database() -> PathBuf {
    PathBuf::from("kproxy.redb")
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default)]
    pub rules: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub log: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: default_database(),
            rules: None,
            log: default_log_format(),
        }
    }
}

impl Settings {
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::load_from(resolve_config_path(cli).as_deref())
    }

    /// Layers an optional settings file under `KPROXY__*` environment variables.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("KPROXY")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().map_err(to_anyhow)?;
        let mut settings: Settings = cfg.try_deserialize().map_err(to_anyhow)?;
        if let Some(path) = config_path {
            settings.apply_base_dir(path);
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Loads the rules file when one is configured, otherwise the built-in tables.
    pub fn load_rules(&self) -> Result<rules_config::ValidatedRules> {
        match &self.rules {
            Some(path) => rules_config::load_rules(path),
            None => Ok(rules_config::ValidatedRules::builtin()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.database.as_os_str().is_empty(),
            "database path must not be empty"
        );
        if let Some(rules) = &self.rules {
            ensure!(
                !rules.as_os_str().is_empty(),
                "rules path must not be empty when set"
            );
        }
        Ok(())
    }

    fn apply_base_dir(&mut self, config_path: &Path) {
        let base_dir = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        self.database = absolutize(&self.database, base_dir);
        self.rules = self.rules.as_ref().map(|path| absolutize(path, base_dir));
    }
}

fn to_anyhow(err: ConfigError) -> anyhow::Error {
    anyhow::anyhow!(err)
}

impl Cli {
    pub fn config_path(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

fn resolve_config_path(cli: &Cli) -> Option<PathBuf> {
    if let Some(path) = cli.config_path() {
        return Some(path.to_path_buf());
    }

    default_config_candidates()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn default_config_candidates() -> [PathBuf; 2] {
    [
        PathBuf::from("/etc/kproxy/kproxy.toml"),
        PathBuf::from("kproxy.toml"),
    ]
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.database, PathBuf::from("kproxy.redb"));
        assert_eq!(settings.log, LogFormat::Json);
    }

    #[test]
    fn empty_database_path_is_rejected() {
        let settings = Settings {
            database: PathBuf::new(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn file_paths_resolve_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("kproxy.toml");
        std::fs::write(
            &config_path,
            "database = \"state/metadata.redb\"\nrules = \"rules.toml\"\nlog = \"text\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(Some(&config_path)).expect("load settings");
        assert_eq!(settings.database, dir.path().join("state/metadata.redb"));
        assert_eq!(settings.rules, Some(dir.path().join("rules.toml")));
        assert_eq!(settings.log, LogFormat::Text);
    }

    #[test]
    fn missing_rules_path_uses_builtin_tables() {
        let rules = Settings::default().load_rules().expect("builtin rules");
        assert_eq!(rules.deny.len(), 1);
        assert_eq!(rules.allow.len(), 1);
    }
}
