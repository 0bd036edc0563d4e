mod defaults;
mod loader;
pub mod model;

use std::collections::HashSet;
use std::ops::Deref;

use anyhow::{Result, bail, ensure};
use http::HeaderName;

pub use defaults::{CACHEABLE_CONTENT_TYPES, RETAINED_HEADERS};
pub use loader::{load_rules, parse_rules};
pub use model::{RuleList, RuleSpec, RulesConfig};

/// Checks the invariants the compiler and the admission engine rely on. This is shared by the
/// file loader and programmatic configs so both get identical guarantees.
pub fn validate_rules(config: &RulesConfig) -> Result<()> {
    for list in [RuleList::Deny, RuleList::Allow] {
        for (idx, rule) in config.rules(list).iter().enumerate() {
            ensure!(
                !rule.pattern.trim().is_empty(),
                "{} rule {} has an empty pattern",
                list,
                idx
            );
            if let Some(types) = &rule.only_types {
                ensure!(
                    !types.is_empty(),
                    "{} rule {} ('{}'): only_types must not be empty; omit it to match any type",
                    list,
                    idx,
                    rule.pattern
                );
                if types.iter().any(|prefix| prefix.trim().is_empty()) {
                    bail!(
                        "{} rule {} ('{}'): only_types entries must not be empty",
                        list,
                        idx,
                        rule.pattern
                    );
                }
            }
        }
    }

    if config
        .content_types
        .iter()
        .any(|prefix| prefix.trim().is_empty())
    {
        bail!("content_types entries must not be empty");
    }

    let mut seen = HashSet::new();
    for name in &config.headers {
        if name.as_ref() != name.to_ascii_lowercase() {
            bail!("header '{}' must be lowercase", name);
        }
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| anyhow::anyhow!("header '{}' is not a valid header name", name))?;
        if !seen.insert(name.clone()) {
            bail!("duplicate header '{}'", name);
        }
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub struct ValidatedRules {
    inner: RulesConfig,
}

impl ValidatedRules {
    pub fn new(config: RulesConfig) -> Result<Self> {
        validate_rules(&config)?;
        Ok(Self { inner: config })
    }

    pub fn builtin() -> Self {
        Self {
            inner: RulesConfig::builtin(),
        }
    }

    pub fn into_inner(self) -> RulesConfig {
        self.inner
    }
}

impl AsRef<RulesConfig> for ValidatedRules {
    fn as_ref(&self) -> &RulesConfig {
        &self.inner
    }
}

impl Deref for ValidatedRules {
    type Target = RulesConfig;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn builtin_rules_are_valid() {
        validate_rules(&RulesConfig::builtin()).expect("builtin rules validate");
    }

    #[test]
    fn reject_empty_only_types() {
        let mut config = RulesConfig::builtin();
        config.allow.push(RuleSpec {
            pattern: Arc::from("example.com/*"),
            only_types: Some(Arc::from(Vec::<Arc<str>>::new().into_boxed_slice())),
        });
        let err = ValidatedRules::new(config).unwrap_err();
        assert!(err.to_string().contains("only_types must not be empty"));
    }

    #[test]
    fn reject_blank_pattern() {
        let mut config = RulesConfig::builtin();
        config.deny.push(RuleSpec::any_type("  "));
        let err = ValidatedRules::new(config).unwrap_err();
        assert!(err.to_string().contains("deny rule 1 has an empty pattern"));
    }

    #[test]
    fn reject_uppercase_and_duplicate_headers() {
        let mut config = RulesConfig::builtin();
        config.headers.push(Arc::from("Age"));
        let err = ValidatedRules::new(config).unwrap_err();
        assert!(err.to_string().contains("must be lowercase"));

        let mut config = RulesConfig::builtin();
        config.headers.push(Arc::from("age"));
        let err = ValidatedRules::new(config).unwrap_err();
        assert!(err.to_string().contains("duplicate header 'age'"));
    }

    #[test]
    fn reject_invalid_header_name() {
        let mut config = RulesConfig::builtin();
        config.headers.push(Arc::from("bad header"));
        let err = ValidatedRules::new(config).unwrap_err();
        assert!(err.to_string().contains("not a valid header name"));
    }
}
