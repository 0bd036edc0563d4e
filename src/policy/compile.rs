use std::sync::Arc;

use anyhow::{Context, Result, anyhow, ensure};
use glob::Pattern;
use http::HeaderName;

use crate::config::{RuleList, RuleSpec, ValidatedRules};

use super::model::{CompiledRule, CompiledRules, TypeFilter, UrlGlob};

/// Turns validated rule tables into matchers that can be evaluated without further parsing.
///
/// Every glob is compiled exactly once here; a pattern that fails to compile aborts the whole
/// compilation, so a proxy can never start with a partially applied rule set.
pub fn compile_rules(config: &ValidatedRules) -> Result<CompiledRules> {
    let config = config.as_ref();

    let deny = compile_list(RuleList::Deny, &config.deny)?;
    let allow = compile_list(RuleList::Allow, &config.allow)?;

    let mut headers = Vec::with_capacity(config.headers.len());
    for name in &config.headers {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| anyhow!("invalid retained header '{}'", name))?;
        headers.push(header);
    }

    Ok(CompiledRules {
        deny,
        allow,
        content_types: Arc::from(config.content_types.clone().into_boxed_slice()),
        headers: Arc::from(headers.into_boxed_slice()),
    })
}

fn compile_list(list: RuleList, rules: &[RuleSpec]) -> Result<Arc<[CompiledRule]>> {
    let mut compiled = Vec::with_capacity(rules.len());
    for (idx, rule) in rules.iter().enumerate() {
        let matcher = compile_url_glob(&rule.pattern)
            .with_context(|| format!("failed to compile {} rule {} '{}'", list, idx, rule.pattern))?;
        let types = match &rule.only_types {
            Some(types) => TypeFilter::Only(types.clone()),
            None => TypeFilter::Any,
        };
        compiled.push(CompiledRule {
            id: Arc::<str>::from(format!("{}#{}", list, idx)),
            matcher,
            types,
        });
    }
    Ok(Arc::from(compiled.into_boxed_slice()))
}

/// Most alternatives a single rule may expand to.
const MAX_ALTERNATIVES: usize = 256;

/// Patterns match against `host + path` with no separator semantics, so a run of stars is
/// equivalent to a single star. The glob crate only accepts `**` as a whole path component,
/// so runs are collapsed before compiling. It also has no `{a,b}` syntax; each alternative
/// becomes its own glob.
pub fn compile_url_glob(pattern: &Arc<str>) -> Result<UrlGlob> {
    let mut compiled = Vec::new();
    for alternative in expand_braces(pattern)? {
        let normalized = collapse_stars(&alternative);
        compiled.push(
            Pattern::new(&normalized).with_context(|| format!("invalid glob '{}'", pattern))?,
        );
    }
    Ok(UrlGlob::new(compiled, pattern.clone()))
}

fn expand_braces(pattern: &str) -> Result<Vec<String>> {
    let Some((open, close)) = find_brace_group(pattern)? else {
        return Ok(vec![pattern.to_string()]);
    };
    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];

    let mut expanded = Vec::new();
    for alternative in split_alternatives(&pattern[open + 1..close]) {
        for tail in expand_braces(&format!("{}{}", alternative, suffix))? {
            expanded.push(format!("{}{}", prefix, tail));
            ensure!(
                expanded.len() <= MAX_ALTERNATIVES,
                "pattern '{}' expands to more than {} alternatives",
                pattern,
                MAX_ALTERNATIVES
            );
        }
    }
    Ok(expanded)
}

/// Byte offsets of the first top-level `{` and its matching `}`. Braces inside `[...]` are
/// literal.
fn find_brace_group(pattern: &str) -> Result<Option<(usize, usize)>> {
    let mut in_class = false;
    let mut depth = 0usize;
    let mut open = None;
    for (idx, ch) in pattern.char_indices() {
        match ch {
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '{' if !in_class => {
                if depth == 0 {
                    open = Some(idx);
                }
                depth += 1;
            }
            '}' if !in_class => {
                ensure!(depth > 0, "unmatched '}}' in pattern '{}'", pattern);
                depth -= 1;
                if depth == 0
                    && let Some(open) = open
                {
                    return Ok(Some((open, idx)));
                }
            }
            _ => {}
        }
    }
    ensure!(depth == 0, "unclosed '{{' in pattern '{}'", pattern);
    Ok(None)
}

fn split_alternatives(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_class = false;
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in body.char_indices() {
        match ch {
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '{' if !in_class => depth += 1,
            '}' if !in_class => depth = depth.saturating_sub(1),
            ',' if !in_class && depth == 0 => {
                parts.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn collapse_stars(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut prev_star = false;
    for ch in pattern.chars() {
        match ch {
            '[' if !in_class => {
                in_class = true;
                prev_star = false;
            }
            ']' if in_class => in_class = false,
            '*' if !in_class => {
                if prev_star {
                    continue;
                }
                prev_star = true;
                out.push(ch);
                continue;
            }
            _ => {}
        }
        prev_star = false;
        out.push(ch);
    }
    out
}
