use http::header::{CACHE_CONTROL, CONTENT_LENGTH};
use http::{HeaderMap, HeaderValue, StatusCode};
use rand::RngCore;
use thiserror::Error;
use url::form_urlencoded;

/// Largest payload a client may request, in megabytes.
pub const MAX_MEGABYTES: f64 = 500.0;

const BYTES_PER_MEGABYTE: f64 = 1_000_000.0;

#[derive(Debug, Error, PartialEq)]
pub enum SpeedTestError {
    #[error("missing 'mb' parameter")]
    Missing,
    #[error("'mb' must be a number, got '{0}'")]
    Invalid(String),
    #[error("'mb' must be greater than 0 and at most 500, got {0}")]
    OutOfRange(f64),
}

impl SpeedTestError {
    pub fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// A validated bandwidth-test download of random bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedTestRequest {
    bytes: usize,
}

impl SpeedTestRequest {
    /// Reads the `mb` parameter from a raw query string such as `mb=2.5`. The query is
    /// form-decoded, and only the first `mb` pair counts.
    pub fn from_query(query: &str) -> Result<Self, SpeedTestError> {
        let value = form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "mb")
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
            .ok_or(SpeedTestError::Missing)?;
        let megabytes: f64 = value
            .parse()
            .map_err(|_| SpeedTestError::Invalid(value.to_string()))?;
        Self::from_megabytes(megabytes)
    }

    pub fn from_megabytes(megabytes: f64) -> Result<Self, SpeedTestError> {
        if !megabytes.is_finite() || megabytes <= 0.0 || megabytes > MAX_MEGABYTES {
            return Err(SpeedTestError::OutOfRange(megabytes));
        }
        Ok(Self {
            bytes: (megabytes * BYTES_PER_MEGABYTE) as usize,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    pub fn payload(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.bytes];
        rand::thread_rng().fill_bytes(&mut data);
        data
    }

    /// Headers for the response: exact length, and never stored by this proxy or any other.
    pub fn response_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(self.bytes));
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, private"),
        );
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fractional_megabytes() {
        let request = SpeedTestRequest::from_query("mb=1.5").expect("valid");
        assert_eq!(request.len(), 1_500_000);
        assert_eq!(request.payload().len(), 1_500_000);
    }

    #[test]
    fn finds_parameter_among_others() {
        let request = SpeedTestRequest::from_query("ts=123&mb=2").expect("valid");
        assert_eq!(request.len(), 2_000_000);
    }

    #[test]
    fn decodes_escaped_query_values() {
        let request = SpeedTestRequest::from_query("mb=1%2E5").expect("valid");
        assert_eq!(request.len(), 1_500_000);
        let request = SpeedTestRequest::from_query("m%62=3&mb=9000").expect("valid");
        assert_eq!(request.len(), 3_000_000, "first mb pair wins");
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            SpeedTestRequest::from_query(""),
            Err(SpeedTestError::Missing)
        );
        assert_eq!(
            SpeedTestRequest::from_query("mb="),
            Err(SpeedTestError::Missing)
        );
        assert_eq!(
            SpeedTestRequest::from_query("mb=lots"),
            Err(SpeedTestError::Invalid("lots".to_string()))
        );
        assert!(matches!(
            SpeedTestRequest::from_query("mb=0"),
            Err(SpeedTestError::OutOfRange(_))
        ));
        assert!(matches!(
            SpeedTestRequest::from_query("mb=-1"),
            Err(SpeedTestError::OutOfRange(_))
        ));
        assert!(matches!(
            SpeedTestRequest::from_query("mb=500.5"),
            Err(SpeedTestError::OutOfRange(_))
        ));
        assert!(matches!(
            SpeedTestRequest::from_megabytes(f64::NAN),
            Err(SpeedTestError::OutOfRange(_))
        ));
    }

    #[test]
    fn errors_map_to_bad_request() {
        let err = SpeedTestRequest::from_query("mb=9000").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upper_bound_is_inclusive() {
        let request = SpeedTestRequest::from_megabytes(MAX_MEGABYTES).expect("valid");
        assert_eq!(request.len(), 500_000_000);
    }

    #[test]
    fn headers_disable_caching() {
        let request = SpeedTestRequest::from_megabytes(0.001).expect("valid");
        let headers = request.response_headers();
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "1000");
        assert_eq!(
            headers.get(CACHE_CONTROL).unwrap(),
            "no-cache, no-store, private"
        );
    }
}
