use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::policy::Verdict;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static ADMISSION_VERDICTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "admission_verdicts_total",
        "Cache admission evaluations by verdict",
    );
    let vec = IntCounterVec::new(opts, &["verdict"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register admission_verdicts_total");
    vec
});

static METADATA_READS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("metadata_reads_total", "Resource metadata reads by outcome");
    let vec = IntCounterVec::new(opts, &["outcome"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register metadata_reads_total");
    vec
});

static METADATA_WRITES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("metadata_writes_total", "Resource metadata writes by outcome");
    let vec = IntCounterVec::new(opts, &["outcome"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register metadata_writes_total");
    vec
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Hit,
    Miss,
    Error,
}

impl ReadOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            ReadOutcome::Hit => "hit",
            ReadOutcome::Miss => "miss",
            ReadOutcome::Error => "error",
        }
    }
}

pub fn record_verdict(verdict: Verdict) {
    ADMISSION_VERDICTS_TOTAL
        .with_label_values(&[verdict.as_str()])
        .inc();
}

pub fn record_metadata_read(outcome: ReadOutcome) {
    METADATA_READS_TOTAL
        .with_label_values(&[outcome.as_str()])
        .inc();
}

pub fn record_metadata_write(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    METADATA_WRITES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn verdict_count(verdict: Verdict) -> u64 {
    ADMISSION_VERDICTS_TOTAL
        .with_label_values(&[verdict.as_str()])
        .get()
}

/// Prometheus text exposition of every registered counter.
pub fn render() -> Result<String> {
    Lazy::force(&ADMISSION_VERDICTS_TOTAL);
    Lazy::force(&METADATA_READS_TOTAL);
    Lazy::force(&METADATA_WRITES_TOTAL);

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .context("failed to encode metrics")?;
    String::from_utf8(buffer).context("metrics output was not UTF-8")
}
