use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{
    ValidatedRules,
    model::{RuleSpec, RulesConfig},
};

/// Reads a rules file. Every table the file defines replaces the matching built-in table;
/// tables it leaves out keep their defaults.
pub fn load_rules<P: AsRef<Path>>(path: P) -> Result<ValidatedRules> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read rules config at {}", path.display()))?;
    parse_rules(&data).with_context(|| format!("invalid rules config at {}", path.display()))
}

pub fn parse_rules(data: &str) -> Result<ValidatedRules> {
    let doc: RulesDoc = toml::from_str(data).context("failed to parse rules config")?;
    let mut config = RulesConfig::builtin();

    if let Some(deny) = doc.deny {
        config.deny = deny.into_iter().map(RawRule::into_spec).collect();
    }
    if let Some(allow) = doc.allow {
        config.allow = allow.into_iter().map(RawRule::into_spec).collect();
    }
    if let Some(types) = doc.content_types {
        config.content_types = types.into_iter().map(Arc::<str>::from).collect();
    }
    if let Some(headers) = doc.headers {
        config.headers = headers.into_iter().map(Arc::<str>::from).collect();
    }

    ValidatedRules::new(config)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesDoc {
    #[serde(default)]
    deny: Option<Vec<RawRule>>,
    #[serde(default)]
    allow: Option<Vec<RawRule>>,
    #[serde(default)]
    content_types: Option<Vec<String>>,
    #[serde(default)]
    headers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    pattern: String,
    #[serde(default)]
    only_types: Option<Vec<String>>,
}

impl RawRule {
    fn into_spec(self) -> RuleSpec {
        RuleSpec {
            pattern: Arc::<str>::from(self.pattern),
            only_types: self.only_types.map(|types| {
                let types: Vec<Arc<str>> = types.into_iter().map(Arc::<str>::from).collect();
                Arc::from(types.into_boxed_slice())
            }),
        }
    }
}
