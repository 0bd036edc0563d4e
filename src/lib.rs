pub mod cli;
pub mod config;
pub mod logging;
pub mod metadata;
pub mod metrics;
pub mod policy;
pub mod settings;
pub mod speedtest;

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    cli::Command,
    metadata::MetadataStore,
    policy::{AdmissionEngine, compile::compile_rules},
    settings::Settings,
    speedtest::SpeedTestRequest,
};

pub fn build_engine(settings: &Settings) -> Result<AdmissionEngine> {
    let rules = settings.load_rules()?;
    let compiled = compile_rules(&rules)?;
    info!(
        deny_rules = compiled.deny.len(),
        allow_rules = compiled.allow.len(),
        content_types = compiled.content_types.len(),
        retained_headers = compiled.headers.len(),
        "cache admission rules loaded"
    );
    Ok(AdmissionEngine::new(Arc::new(compiled)))
}

/// Opens the metadata store. Callers at startup should treat an error here as fatal.
pub fn open_store(settings: &Settings) -> Result<Arc<MetadataStore>> {
    let store = MetadataStore::open(&settings.database).with_context(|| {
        format!(
            "metadata store unavailable at {}",
            settings.database.display()
        )
    })?;
    Ok(Arc::new(store))
}

pub fn run(settings: Settings, command: Command) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Command::Evaluate { url, content_type } => {
            let engine = build_engine(&settings)?;
            let verdict = engine
                .evaluate_url(&url, &content_type)
                .with_context(|| format!("invalid url '{}'", url))?;
            let cache = engine.resolve(verdict, &content_type);
            writeln!(out, "verdict={} cache={}", verdict, cache)?;
        }
        Command::Show { name } => {
            let store = open_store(&settings)?;
            let resource = store.get(&name);
            writeln!(out, "{}", serde_json::to_string_pretty(&resource)?)?;
        }
        Command::Visit {
            name,
            mime_type,
            ttl,
        } => {
            let store = open_store(&settings)?;
            let mut resource = store.get(&name);
            if let Some(mime_type) = mime_type {
                resource.mime_type = mime_type;
            }
            if let Some(ttl) = ttl {
                resource.set_expiry_after(SystemTime::now(), Duration::from_secs(ttl));
            }
            store.increment_visits(&mut resource);
            writeln!(out, "{} visits={}", resource.name(), resource.visits)?;
        }
        Command::DownloadStatus { name, status } => {
            let store = open_store(&settings)?;
            let mut resource = store.get(&name);
            store.update_download(&mut resource, &status);
            writeln!(out, "{} status={:?}", resource.name(), resource.download_status)?;
        }
        Command::Speedtest { mb } => {
            let request = SpeedTestRequest::from_megabytes(mb)?;
            out.write_all(&request.payload())?;
        }
        Command::Metrics => {
            write!(out, "{}", metrics::render()?)?;
        }
    }

    out.flush()?;
    Ok(())
}
