use std::sync::Arc;

use glob::Pattern;
use http::HeaderName;

#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub deny: Arc<[CompiledRule]>,
    pub allow: Arc<[CompiledRule]>,
    pub content_types: Arc<[Arc<str>]>,
    pub headers: Arc<[HeaderName]>,
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: Arc<str>,
    pub matcher: UrlGlob,
    pub types: TypeFilter,
}

impl CompiledRule {
    /// Whether this rule fires for the target. A type mismatch after a pattern match is reported
    /// as "not fired" so evaluation can move on to later rules in the same list.
    pub fn fires(&self, target: &str, content_type: &str) -> bool {
        self.matcher.matches(target) && self.types.allows(content_type)
    }
}

/// A compiled rule pattern. Brace alternatives are expanded at compile time, so one rule may
/// hold several globs; the rule matches when any of them does.
#[derive(Debug, Clone)]
pub struct UrlGlob {
    patterns: Arc<[Pattern]>,
    original: Arc<str>,
}

impl UrlGlob {
    pub fn new(patterns: Vec<Pattern>, original: Arc<str>) -> Self {
        Self {
            patterns: Arc::from(patterns.into_boxed_slice()),
            original,
        }
    }

    pub fn matches(&self, target: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(target))
    }

    pub fn alternatives(&self) -> usize {
        self.patterns.len()
    }

    pub fn original(&self) -> &Arc<str> {
        &self.original
    }
}

#[derive(Debug, Clone)]
pub enum TypeFilter {
    Any,
    Only(Arc<[Arc<str>]>),
}

impl TypeFilter {
    pub fn allows(&self, content_type: &str) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::Only(prefixes) => has_prefix(prefixes, content_type),
        }
    }
}

pub(crate) fn has_prefix(prefixes: &[Arc<str>], content_type: &str) -> bool {
    prefixes
        .iter()
        .any(|prefix| content_type.starts_with(prefix.as_ref()))
}
