//! Per-call options and response metadata
//!
//! Every read returns a [`QueryMeta`] and every write a [`WriteMeta`],
//! both carrying the store index the response reflects.

use crate::error::{Result, SdkError};
use reqwest::header::HeaderMap;
use std::time::Duration;

pub const HEADER_INDEX: &str = "x-nomad-index";
pub const HEADER_LAST_CONTACT: &str = "x-nomad-lastcontact";
pub const HEADER_KNOWN_LEADER: &str = "x-nomad-knownleader";

/// Options for read operations
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Target region; falls back to the client's configured region
    pub region: Option<String>,

    /// Allow any server (not only the leader) to answer
    pub allow_stale: bool,

    /// Blocking query: hold the request until the index exceeds this value
    pub wait_index: u64,

    /// Upper bound for a blocking query
    pub wait_time: Option<Duration>,

    /// Deadline for this single request
    pub timeout: Option<Duration>,
}

impl QueryOptions {
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn stale(mut self) -> Self {
        self.allow_stale = true;
        self
    }

    /// Block until the index moves past `index` or `wait` elapses
    pub fn blocking(mut self, index: u64, wait: Duration) -> Self {
        self.wait_index = index;
        self.wait_time = Some(wait);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Query-string pairs for this request
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(region) = &self.region {
            pairs.push(("region", region.clone()));
        }
        if self.allow_stale {
            pairs.push(("stale", String::new()));
        }
        if self.wait_index != 0 {
            pairs.push(("index", self.wait_index.to_string()));
        }
        if let Some(wait) = self.wait_time {
            pairs.push(("wait", format_duration(wait)));
        }
        pairs
    }
}

/// Options for write operations
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Target region; falls back to the client's configured region
    pub region: Option<String>,

    /// Deadline for this single request
    pub timeout: Option<Duration>,
}

impl WriteOptions {
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match &self.region {
            Some(region) => vec![("region", region.clone())],
            None => Vec::new(),
        }
    }
}

/// Metadata returned with every read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMeta {
    /// Store index the response reflects
    pub last_index: u64,

    /// Time since the answering server last contacted the leader
    pub last_contact: Duration,

    /// Whether the answering server knows of a leader
    pub known_leader: bool,

    /// Round-trip time measured by the client
    pub request_time: Duration,
}

impl QueryMeta {
    pub(crate) fn from_headers(headers: &HeaderMap, request_time: Duration) -> Result<Self> {
        let last_index = parse_index(headers)?;

        let last_contact = match header_str(headers, HEADER_LAST_CONTACT)? {
            Some(raw) => {
                let millis: u64 = raw.parse().map_err(|_| SdkError::InvalidHeader {
                    name: HEADER_LAST_CONTACT,
                    value: raw.to_string(),
                })?;
                Duration::from_millis(millis)
            }
            None => Duration::ZERO,
        };

        let known_leader = match header_str(headers, HEADER_KNOWN_LEADER)? {
            Some("true") => true,
            Some("false") | None => false,
            Some(other) => {
                return Err(SdkError::InvalidHeader {
                    name: HEADER_KNOWN_LEADER,
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            last_index,
            last_contact,
            known_leader,
            request_time,
        })
    }
}

/// Metadata returned with every write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteMeta {
    /// Store index of the write
    pub last_index: u64,

    /// Round-trip time measured by the client
    pub request_time: Duration,
}

impl WriteMeta {
    pub(crate) fn from_headers(headers: &HeaderMap, request_time: Duration) -> Result<Self> {
        Ok(Self {
            last_index: parse_index(headers)?,
            request_time,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<Option<&'a str>> {
    match headers.get(name) {
        Some(value) => value.to_str().map(Some).map_err(|_| SdkError::InvalidHeader {
            name,
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        }),
        None => Ok(None),
    }
}

fn parse_index(headers: &HeaderMap) -> Result<u64> {
    match header_str(headers, HEADER_INDEX)? {
        Some(raw) => raw.parse().map_err(|_| SdkError::InvalidHeader {
            name: HEADER_INDEX,
            value: raw.to_string(),
        }),
        None => Ok(0),
    }
}

/// Render a duration the way the service parses `wait` (e.g. `"5000ms"`)
fn format_duration(d: Duration) -> String {
    format!("{}ms", d.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_query_meta_from_headers() {
        let map = headers(&[
            (HEADER_INDEX, "42"),
            (HEADER_LAST_CONTACT, "150"),
            (HEADER_KNOWN_LEADER, "true"),
        ]);

        let meta = QueryMeta::from_headers(&map, Duration::from_millis(3)).unwrap();
        assert_eq!(meta.last_index, 42);
        assert_eq!(meta.last_contact, Duration::from_millis(150));
        assert!(meta.known_leader);
        assert_eq!(meta.request_time, Duration::from_millis(3));
    }

    #[test]
    fn test_missing_headers_are_zero() {
        let meta = QueryMeta::from_headers(&HeaderMap::new(), Duration::ZERO).unwrap();
        assert_eq!(meta.last_index, 0);
        assert_eq!(meta.last_contact, Duration::ZERO);
        assert!(!meta.known_leader);

        let meta = WriteMeta::from_headers(&HeaderMap::new(), Duration::ZERO).unwrap();
        assert_eq!(meta.last_index, 0);
    }

    #[test]
    fn test_malformed_index_is_error() {
        let map = headers(&[(HEADER_INDEX, "forty-two")]);

        let err = WriteMeta::from_headers(&map, Duration::ZERO).unwrap_err();
        assert!(matches!(
            err,
            SdkError::InvalidHeader { name: HEADER_INDEX, .. }
        ));
    }

    #[test]
    fn test_malformed_known_leader_is_error() {
        let map = headers(&[(HEADER_INDEX, "1"), (HEADER_KNOWN_LEADER, "maybe")]);
        assert!(QueryMeta::from_headers(&map, Duration::ZERO).is_err());
    }

    #[test]
    fn test_query_pairs() {
        let opts = QueryOptions::default()
            .region("eu-west")
            .stale()
            .blocking(17, Duration::from_secs(5));

        let pairs = opts.query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("region", "eu-west".to_string()),
                ("stale", String::new()),
                ("index", "17".to_string()),
                ("wait", "5000ms".to_string()),
            ]
        );
    }

    #[test]
    fn test_default_options_add_nothing() {
        assert!(QueryOptions::default().query_pairs().is_empty());
        assert!(WriteOptions::default().query_pairs().is_empty());
    }
}
