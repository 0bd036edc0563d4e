use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use http::uri::InvalidUri;
use http::{HeaderMap, HeaderName, Uri};
use percent_encoding::percent_decode_str;
use tracing::trace;

use super::Verdict;
use super::allowlist;
use super::model::{CompiledRule, CompiledRules, has_prefix};

/// The admission decision for fetched resources.
///
/// Evaluation is two-phase. The deny list runs first and any firing deny rule is final. Only
/// then does the allow list run. Within a list, rules are tried in declaration order and the
/// first rule whose pattern and content-type filter both accept the request wins.
///
/// The engine holds only immutable compiled tables and can be shared freely across threads.
#[derive(Debug, Clone)]
pub struct AdmissionEngine {
    rules: Arc<CompiledRules>,
}

impl AdmissionEngine {
    pub fn new(rules: Arc<CompiledRules>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    pub fn evaluate(&self, uri: &Uri, content_type: &str) -> Verdict {
        let target = Target::from_uri(uri);
        self.evaluate_target(&target, content_type)
    }

    pub fn evaluate_target(&self, target: &Target<'_>, content_type: &str) -> Verdict {
        let simple = target.simple_url();
        let verdict = if let Some(rule) = first_firing(&self.rules.deny, &simple, content_type) {
            trace!(url = %simple, rule = %rule.id, "deny rule fired");
            Verdict::ForceNoCache
        } else if let Some(rule) = first_firing(&self.rules.allow, &simple, content_type) {
            trace!(url = %simple, rule = %rule.id, "allow rule fired");
            Verdict::ForceCache
        } else {
            Verdict::NoRule
        };
        crate::metrics::record_verdict(verdict);
        verdict
    }

    /// Evaluates URL text; see [`Target::parse`] for how the path is taken.
    pub fn evaluate_url(&self, url: &str, content_type: &str) -> Result<Verdict, InvalidUri> {
        let target = Target::parse(url)?;
        Ok(self.evaluate_target(&target, content_type))
    }

    /// The final cache decision: rule verdicts win, otherwise the content-type allowlist decides.
    pub fn should_cache(&self, uri: &Uri, content_type: &str) -> bool {
        let verdict = self.evaluate(uri, content_type);
        self.resolve(verdict, content_type)
    }

    pub fn resolve(&self, verdict: Verdict, content_type: &str) -> bool {
        match verdict {
            Verdict::ForceNoCache => false,
            Verdict::ForceCache => true,
            Verdict::NoRule => self.is_cacheable_type(content_type),
        }
    }

    pub fn is_cacheable_type(&self, content_type: &str) -> bool {
        has_prefix(&self.rules.content_types, content_type)
    }

    pub fn retained_headers(&self) -> &[HeaderName] {
        &self.rules.headers
    }

    pub fn retain_headers(&self, headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
        allowlist::retain_headers(&self.rules.headers, headers)
    }
}

fn first_firing<'a>(
    rules: &'a [CompiledRule],
    target: &str,
    content_type: &str,
) -> Option<&'a CompiledRule> {
    rules.iter().find(|rule| rule.fires(target, content_type))
}

/// The part of a URL the rules see: hostname and percent-decoded path. Scheme, port, and query
/// are ignored.
#[derive(Debug, Clone)]
pub struct Target<'a> {
    pub host: Cow<'a, str>,
    pub path: Cow<'a, str>,
}

impl<'a> Target<'a> {
    /// Uses `host` and `path` exactly as given.
    pub fn new(host: &'a str, path: &'a str) -> Self {
        Self {
            host: Cow::Borrowed(host),
            path: Cow::Borrowed(path),
        }
    }

    /// `http::Uri` reports a missing path as `/`, so `https://host` and `https://host/` look
    /// the same here. Use [`Target::parse`] when the URL text is at hand.
    pub fn from_uri(uri: &'a Uri) -> Self {
        let host = uri
            .host()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .unwrap_or("");
        Self {
            host: Cow::Borrowed(host),
            path: percent_decode_str(uri.path()).decode_utf8_lossy(),
        }
    }

    /// Parses URL text. An absolute URL without a path gets an empty path.
    pub fn parse(url: &str) -> Result<Target<'static>, InvalidUri> {
        let uri: Uri = url.parse()?;
        let target = Target::from_uri(&uri);
        let path = if uri.scheme().is_some() && !has_explicit_path(url) {
            String::new()
        } else {
            target.path.into_owned()
        };
        Ok(Target {
            host: Cow::Owned(target.host.into_owned()),
            path: Cow::Owned(path),
        })
    }

    pub fn simple_url(&self) -> String {
        let mut simple = String::with_capacity(self.host.len() + self.path.len());
        simple.push_str(&self.host.to_ascii_lowercase());
        simple.push_str(&self.path);
        simple
    }
}

fn has_explicit_path(url: &str) -> bool {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.find(['/', '?', '#'])
        .is_some_and(|idx| rest[idx..].starts_with('/'))
}
