#![allow(dead_code)]

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use kproxy_cache::{
    cli::LogFormat,
    metadata::MetadataStore,
    policy::AdmissionEngine,
    settings::Settings,
};

pub use logging::capture_logs;

pub struct TestDirs {
    _temp: TempDir,
    pub config_dir: PathBuf,
    pub rules_path: PathBuf,
    pub database_path: PathBuf,
}

impl TestDirs {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let config_dir = temp.path().join("config");
        std::fs::create_dir_all(&config_dir)?;

        let rules_path = config_dir.join("rules.toml");
        let database_path = temp.path().join("data").join("metadata.redb");

        Ok(Self {
            _temp: temp,
            config_dir,
            rules_path,
            database_path,
        })
    }

    pub fn write_rules(&self, rules: &str) -> Result<()> {
        std::fs::write(&self.rules_path, rules)?;
        Ok(())
    }

    pub fn settings(&self, with_rules: bool) -> Settings {
        Settings {
            database: self.database_path.clone(),
            rules: with_rules.then(|| self.rules_path.clone()),
            log: LogFormat::Text,
        }
    }

    pub fn engine(&self) -> Result<AdmissionEngine> {
        kproxy_cache::build_engine(&self.settings(true))
    }

    pub fn store(&self) -> Result<Arc<MetadataStore>> {
        kproxy_cache::open_store(&self.settings(false))
    }
}
