use std::fmt;
use std::sync::Arc;

use super::defaults;

#[derive(Debug, Clone)]
pub struct RulesConfig {
    pub deny: Vec<RuleSpec>,
    pub allow: Vec<RuleSpec>,
    pub content_types: Vec<Arc<str>>,
    pub headers: Vec<Arc<str>>,
}

impl RulesConfig {
    /// The rule tables compiled into the binary.
    pub fn builtin() -> Self {
        Self {
            deny: defaults::deny_rules(),
            allow: defaults::allow_rules(),
            content_types: to_arcs(defaults::CACHEABLE_CONTENT_TYPES),
            headers: to_arcs(defaults::RETAINED_HEADERS),
        }
    }

    pub fn rules(&self, list: RuleList) -> &[RuleSpec] {
        match list {
            RuleList::Deny => &self.deny,
            RuleList::Allow => &self.allow,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub pattern: Arc<str>,
    /// `None` means the pattern alone decides; `Some` is never empty once validated.
    pub only_types: Option<Arc<[Arc<str>]>>,
}

impl RuleSpec {
    pub fn any_type(pattern: &str) -> Self {
        Self {
            pattern: Arc::from(pattern),
            only_types: None,
        }
    }

    pub fn only_types(pattern: &str, types: &[&str]) -> Self {
        Self {
            pattern: Arc::from(pattern),
            only_types: Some(Arc::from(to_arcs(types).into_boxed_slice())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleList {
    Deny,
    Allow,
}

impl RuleList {
    pub const fn as_str(self) -> &'static str {
        match self {
            RuleList::Deny => "deny",
            RuleList::Allow => "allow",
        }
    }
}

impl fmt::Display for RuleList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn to_arcs(values: &[&str]) -> Vec<Arc<str>> {
    values.iter().map(|value| Arc::<str>::from(*value)).collect()
}
