use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use http::{HeaderMap, HeaderName};
use serde::{Deserialize, Deserializer, Serialize};

use crate::policy::allowlist;

/// Persisted metadata for one cached resource.
///
/// Field names on disk are PascalCase (`Name`, `Expiry`, `MimeType`, `Visits`, `Headers`,
/// `DownloadStatus`) so existing databases keep decoding. Missing fields decode as zero values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Resource {
    name: String,
    /// Unix seconds after which the entry is stale; 0 means it was never computed.
    pub expiry: i64,
    pub mime_type: String,
    pub visits: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub headers: BTreeMap<String, Vec<String>>,
    /// Progress of a background download; empty when none is running.
    pub download_status: String,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn set_name(&mut self, name: &str) {
        if self.name != name {
            self.name = name.to_string();
        }
    }

    pub fn is_stale(&self, now: SystemTime) -> bool {
        self.expiry <= 0 || unix_seconds(now) >= self.expiry
    }

    pub fn set_expiry_after(&mut self, now: SystemTime, ttl: Duration) {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        self.expiry = unix_seconds(now).saturating_add(ttl);
    }

    /// Replaces the stored headers with the allowlisted subset of `headers`.
    pub fn retain_headers(&mut self, allowlist: &[HeaderName], headers: &HeaderMap) {
        self.headers = allowlist::retain_headers(allowlist, headers);
    }
}

fn unix_seconds(time: SystemTime) -> i64 {
    let secs = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    i64::try_from(secs).unwrap_or(i64::MAX)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http::header::{AGE, CONTENT_TYPE, EXPIRES};

    #[test]
    fn serializes_with_stored_field_names() {
        let mut resource = Resource::new("example.com/index.html");
        resource.visits = 3;
        resource.mime_type = "text/html".to_string();
        let value = serde_json::to_value(&resource).unwrap();
        let object = value.as_object().unwrap();
        for field in [
            "Name",
            "Expiry",
            "MimeType",
            "Visits",
            "Headers",
            "DownloadStatus",
        ] {
            assert!(object.contains_key(field), "missing field {field}");
        }
        assert_eq!(object["Name"], "example.com/index.html");
    }

    #[test]
    fn decodes_null_headers_and_missing_fields() {
        let resource: Resource =
            serde_json::from_str(r#"{"Name":"a","Expiry":10,"Headers":null}"#).unwrap();
        assert_eq!(resource.name(), "a");
        assert_eq!(resource.expiry, 10);
        assert!(resource.headers.is_empty());
        assert_eq!(resource.visits, 0);
        assert_eq!(resource.download_status, "");
    }

    #[test]
    fn decodes_multi_valued_headers() {
        let resource: Resource = serde_json::from_str(
            r#"{"Name":"a","Headers":{"accept-ranges":["bytes"],"age":["1","2"]}}"#,
        )
        .unwrap();
        assert_eq!(resource.headers["age"], vec!["1", "2"]);
    }

    #[test]
    fn staleness() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut resource = Resource::new("a");
        assert!(resource.is_stale(now), "unset expiry is stale");

        resource.set_expiry_after(now, Duration::from_secs(60));
        assert_eq!(resource.expiry, 1_060);
        assert!(!resource.is_stale(now));
        assert!(resource.is_stale(now + Duration::from_secs(60)));
    }

    #[test]
    fn retain_headers_replaces_previous_set() {
        let mut resource = Resource::new("a");
        resource
            .headers
            .insert("expires".to_string(), vec!["old".to_string()]);

        let mut headers = HeaderMap::new();
        headers.insert(AGE, HeaderValue::from_static("5"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/css"));
        resource.retain_headers(&[AGE, EXPIRES], &headers);

        assert_eq!(resource.headers.len(), 1);
        assert_eq!(resource.headers["age"], vec!["5"]);
    }
}
