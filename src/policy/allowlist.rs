use std::collections::BTreeMap;

use http::{HeaderMap, HeaderName};
use tracing::trace;

/// Copies the allowlisted headers out of a response, keyed by lowercase name.
///
/// Repeated headers keep every value in arrival order. Values that are not visible ASCII are
/// dropped rather than lossily converted.
pub fn retain_headers(
    allowlist: &[HeaderName],
    headers: &HeaderMap,
) -> BTreeMap<String, Vec<String>> {
    let mut retained = BTreeMap::new();
    for name in allowlist {
        let mut values = Vec::new();
        for value in headers.get_all(name) {
            match value.to_str() {
                Ok(value) => values.push(value.to_string()),
                Err(_) => trace!(header = %name, "dropping non-ASCII header value"),
            }
        }
        if !values.is_empty() {
            retained.insert(name.as_str().to_string(), values);
        }
    }
    retained
}
