//! Jobsched Client Implementation

use crate::error::{Result, SdkError};
use crate::jobs::Jobs;
use crate::options::{QueryMeta, QueryOptions, WriteMeta, WriteOptions};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:4646";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How long the server holds a blocking query that names no `wait`
const DEFAULT_BLOCKING_WAIT: Duration = Duration::from_secs(300);

/// Connection configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the service (e.g. `http://127.0.0.1:4646`)
    pub address: String,

    /// Region applied to every call that does not name one
    pub region: Option<String>,

    /// Transport-level timeout for every request; blocking queries get
    /// their wait added on top
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            region: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Defaults overlaid with `JOBSCHED_ADDR`, `JOBSCHED_REGION` and
    /// `JOBSCHED_HTTP_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(address) = std::env::var("JOBSCHED_ADDR") {
            config.address = address;
        }

        config.region = std::env::var("JOBSCHED_REGION")
            .ok()
            .filter(|region| !region.is_empty());

        if let Some(secs) = std::env::var("JOBSCHED_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        config
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Job-scheduling service client
///
/// Holds only immutable configuration and a pooled HTTP transport, so it is
/// cheap to clone and safe to share between tasks.
///
/// # Example
///
/// ```no_run
/// use jobsched_sdk::{Client, Config, Job};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(Config::default())?;
///
/// let mut job = Job::new_batch("job1", "nightly-report", 50);
/// job.set_meta("owner", "reporting");
///
/// let (eval_id, meta) = client.jobs().register(&job, None).await?;
/// println!("evaluation {} at index {}", eval_id, meta.last_index);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base: Url,
    region: Option<String>,
    timeout: Duration,
}

impl Client {
    /// Build a client for the configured address
    pub fn new(config: Config) -> Result<Self> {
        let base = Url::parse(&config.address)?;
        if base.cannot_be_a_base() {
            return Err(SdkError::InvalidUrl(format!(
                "{} cannot be used as a base URL",
                config.address
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SdkError::Transport(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            http,
            base,
            region: config.region,
            timeout: config.timeout,
        })
    }

    /// Jobs endpoints
    pub fn jobs(&self) -> Jobs<'_> {
        Jobs::new(self)
    }

    /// Base address this client talks to
    pub fn address(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(
        &self,
        segments: &[&str],
        mut pairs: Vec<(&'static str, String)>,
    ) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SdkError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);

        if !pairs.iter().any(|(key, _)| *key == "region") {
            if let Some(region) = &self.region {
                pairs.insert(0, ("region", region.clone()));
            }
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        Ok(url)
    }

    /// Deadline for one read: the caller's `timeout`, or for a blocking query
    /// the transport timeout stretched by the wait the server may hold it for
    fn query_deadline(&self, opts: &QueryOptions) -> Option<Duration> {
        if opts.timeout.is_some() {
            return opts.timeout;
        }
        if opts.wait_index == 0 && opts.wait_time.is_none() {
            return None;
        }
        let wait = opts.wait_time.unwrap_or(DEFAULT_BLOCKING_WAIT);
        Some(self.timeout.saturating_add(wait))
    }

    /// GET `segments`, decode the body and the query metadata
    pub(crate) async fn query<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        opts: Option<&QueryOptions>,
    ) -> Result<(T, QueryMeta)> {
        let defaults = QueryOptions::default();
        let opts = opts.unwrap_or(&defaults);
        let url = self.endpoint(segments, opts.query_pairs())?;

        let mut request = self.http.get(url.clone());
        if let Some(timeout) = self.query_deadline(opts) {
            request = request.timeout(timeout);
        }

        let (response, elapsed) = self.send(Method::GET, &url, request).await?;
        let meta = QueryMeta::from_headers(response.headers(), elapsed)?;
        let body = response.bytes().await?;
        let out = serde_json::from_slice(&body)?;

        debug!(url = %url, index = meta.last_index, "query decoded");
        Ok((out, meta))
    }

    /// PUT `body` (if any) to `segments`, decode the body and the write metadata
    pub(crate) async fn write<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: Option<&B>,
        opts: Option<&WriteOptions>,
    ) -> Result<(T, WriteMeta)> {
        let defaults = WriteOptions::default();
        let opts = opts.unwrap_or(&defaults);
        let url = self.endpoint(segments, opts.query_pairs())?;

        let mut request = self.http.put(url.clone());
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }
        if let Some(timeout) = opts.timeout {
            request = request.timeout(timeout);
        }

        let (response, elapsed) = self.send(Method::PUT, &url, request).await?;
        let meta = WriteMeta::from_headers(response.headers(), elapsed)?;
        let body = response.bytes().await?;
        let out = serde_json::from_slice(&body)?;

        Ok((out, meta))
    }

    /// DELETE `segments`; the response body is ignored
    pub(crate) async fn delete(
        &self,
        segments: &[&str],
        opts: Option<&WriteOptions>,
    ) -> Result<WriteMeta> {
        let defaults = WriteOptions::default();
        let opts = opts.unwrap_or(&defaults);
        let url = self.endpoint(segments, opts.query_pairs())?;

        let mut request = self.http.delete(url.clone());
        if let Some(timeout) = opts.timeout {
            request = request.timeout(timeout);
        }

        let (response, elapsed) = self.send(Method::DELETE, &url, request).await?;
        WriteMeta::from_headers(response.headers(), elapsed)
    }

    /// Send one request; non-2xx responses become classified errors
    async fn send(
        &self,
        method: Method,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<(Response, Duration)> {
        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            debug!(method = %method, url = %url, error = %e, "request failed");
            SdkError::from(e)
        })?;
        let elapsed = started.elapsed();
        let status = response.status();

        debug!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "response received"
        );

        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(
                        method = %method,
                        url = %url,
                        error = %e,
                        "failed to read error body"
                    );
                    String::new()
                }
            };
            debug!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                body = %body.trim(),
                "request rejected"
            );
            return Err(SdkError::from_response(status.as_u16(), body));
        }

        Ok((response, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_path_segments() {
        let client = Client::new(Config::default()).unwrap();

        let url = client
            .endpoint(&["v1", "job", "web/frontend v2"], Vec::new())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:4646/v1/job/web%2Ffrontend%20v2"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let config = Config::default().with_address("http://proxy.local:8080/scheduler/");
        let client = Client::new(config).unwrap();

        let url = client.endpoint(&["v1", "jobs"], Vec::new()).unwrap();
        assert_eq!(url.as_str(), "http://proxy.local:8080/scheduler/v1/jobs");
    }

    #[test]
    fn test_default_region_applies_unless_overridden() {
        let client = Client::new(Config::default().with_region("global")).unwrap();

        let url = client.endpoint(&["v1", "jobs"], Vec::new()).unwrap();
        assert_eq!(url.query(), Some("region=global"));

        let url = client
            .endpoint(&["v1", "jobs"], vec![("region", "eu-west".to_string())])
            .unwrap();
        assert_eq!(url.query(), Some("region=eu-west"));
    }

    #[test]
    fn test_no_query_string_without_pairs() {
        let client = Client::new(Config::default()).unwrap();

        let url = client.endpoint(&["v1", "jobs"], Vec::new()).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_query_deadline_covers_blocking_wait() {
        let config = Config {
            timeout: Duration::from_secs(1),
            ..Config::default()
        };
        let client = Client::new(config).unwrap();

        // Plain reads keep the transport timeout
        assert_eq!(client.query_deadline(&QueryOptions::default()), None);

        let opts = QueryOptions::default().blocking(7, Duration::from_secs(60));
        assert_eq!(client.query_deadline(&opts), Some(Duration::from_secs(61)));

        let opts = QueryOptions {
            wait_index: 7,
            ..QueryOptions::default()
        };
        assert_eq!(client.query_deadline(&opts), Some(Duration::from_secs(301)));

        // An explicit deadline always wins
        let opts = QueryOptions::default()
            .blocking(7, Duration::from_secs(60))
            .timeout(Duration::from_millis(200));
        assert_eq!(client.query_deadline(&opts), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let err = Client::new(Config::default().with_address("not a url")).unwrap_err();
        assert!(matches!(err, SdkError::InvalidUrl(_)));

        let config = Config::default().with_address("mailto:ops@example.com");
        let err = Client::new(config).unwrap_err();
        assert!(matches!(err, SdkError::InvalidUrl(_)));
    }
}
