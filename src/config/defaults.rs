use super::model::RuleSpec;

/// Lowercase names of the response headers copied into a resource record.
/// `access-control-allow-origin` is deliberately absent; the proxy sets it per request.
pub const RETAINED_HEADERS: &[&str] = &[
    "access-control-allow-methods",
    "access-control-allow-credentials",
    "age",
    "expires",
    "accept-ranges",
];

/// Content-type prefixes cached when no rule forces a decision.
pub const CACHEABLE_CONTENT_TYPES: &[&str] = &[
    "text/html",
    "text/css",
    "application/javascript",
    // some servers still send the obsolete type
    "text/javascript",
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
    "image/gif",
    "image/svg+xml",
    // favicon.ico
    "image/x-icon",
    "application/pdf",
    "font/ttf",
    "font/woff",
    "font/woff2",
    "application/font-woff2",
    "font/otf",
    "audio/mpeg",
    "video/mp4",
    "video/mpeg",
];

pub fn deny_rules() -> Vec<RuleSpec> {
    vec![RuleSpec::any_type("**cloud.google.com/*")]
}

pub fn allow_rules() -> Vec<RuleSpec> {
    vec![RuleSpec::only_types("*.wikipedia.org/*", &["text/html"])]
}
