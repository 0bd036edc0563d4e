use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kproxy-cache",
    about = "Cache admission rules and resource metadata for the caching proxy"
)]
pub struct Cli {
    /// Path to the settings file (defaults to ./kproxy.toml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a URL and content type through the admission rules.
    Evaluate {
        url: String,
        #[arg(long)]
        content_type: String,
    },
    /// Print the stored metadata for a resource as JSON.
    Show { name: String },
    /// Record a cache hit for a resource.
    Visit {
        name: String,
        #[arg(long)]
        mime_type: Option<String>,
        /// Seconds from now until the entry goes stale.
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Set the background download status of a resource.
    DownloadStatus { name: String, status: String },
    /// Write a random bandwidth-test payload to stdout.
    Speedtest {
        #[arg(long)]
        mb: f64,
    },
    /// Print counters in the Prometheus text format.
    Metrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_evaluate_with_global_config() {
        let cli = Cli::try_parse_from([
            "kproxy-cache",
            "evaluate",
            "https://en.wikipedia.org/wiki/Go",
            "--content-type",
            "text/html",
            "--config",
            "/tmp/kproxy.toml",
        ])
        .expect("parse cli");
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/kproxy.toml")));
        match cli.command {
            Command::Evaluate { url, content_type } => {
                assert_eq!(url, "https://en.wikipedia.org/wiki/Go");
                assert_eq!(content_type, "text/html");
            }
            other => panic!("expected evaluate, got {:?}", other),
        }
    }

    #[test]
    fn parse_download_status() {
        let cli = Cli::try_parse_from(["kproxy-cache", "download-status", "a", "done"])
            .expect("parse cli");
        assert!(matches!(
            cli.command,
            Command::DownloadStatus { ref name, ref status } if name == "a" && status == "done"
        ));
    }
}
