use std::fmt;

pub mod allowlist;
pub mod compile;
pub mod matcher;
pub mod model;

pub use matcher::AdmissionEngine;

/// Outcome of running a URL and content type through the deny and allow rule lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// An allow rule fired; cache even if the content type is not allowlisted.
    ForceCache,
    /// A deny rule fired; never cache.
    ForceNoCache,
    /// No rule fired; the content-type allowlist decides.
    NoRule,
}

impl Verdict {
    pub const fn as_str(self) -> &'static str {
        match self {
            Verdict::ForceCache => "force_cache",
            Verdict::ForceNoCache => "force_no_cache",
            Verdict::NoRule => "no_rule",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
