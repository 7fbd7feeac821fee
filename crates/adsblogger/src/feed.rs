//! Aircraft feed: fetching and decoding `aircraft.json` snapshots.
//!
//! The feed is the JSON document published by readsb / tar1090 and refreshed
//! about once per second. It carries an embedded clock (`now`) and one entry
//! per currently visible aircraft.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::flight::{Clock, Flight, Identity};
use crate::metrics::{MetricKey, Metrics};

/// One decoded feed document.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Feed clock when the document was written.
    pub now: Clock,
    /// Every aircraft in the document, each observed at `now`.
    pub observations: Vec<Flight>,
}

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    now: f64,
    #[serde(default)]
    aircraft: Vec<Map<String, Value>>,
}

impl Snapshot {
    /// Decode a feed document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not JSON, lacks `now`, or `now`
    /// is not a finite number.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: RawSnapshot =
            serde_json::from_slice(bytes).map_err(|e| Error::feed_decode(e.to_string()))?;
        let now = clock_from_seconds(raw.now)?;
        let observations = raw
            .aircraft
            .iter()
            .map(|entry| decode_observation(entry, now))
            .collect();
        Ok(Self { now, observations })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn clock_from_seconds(seconds: f64) -> Result<Clock> {
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(seconds.floor() as Clock)
    } else {
        Err(Error::feed_decode(format!("invalid feed clock: {seconds}")))
    }
}

/// Decode one `aircraft` entry.
///
/// Missing or non-numeric metric values (`"alt_baro": "ground"`) stay unset.
fn decode_observation(entry: &Map<String, Value>, now: Clock) -> Flight {
    let identity = Identity {
        hex: text_field(entry, "hex"),
        callsign: text_field(entry, "flight"),
        registration: text_field(entry, "r"),
        aircraft_type: text_field(entry, "t"),
    };

    let mut metrics = Metrics::default();
    for key in MetricKey::ALL {
        metrics.set(key, entry.get(key.as_str()).and_then(Value::as_f64));
    }

    Flight::observed(identity, metrics, now)
}

/// Callsigns are space padded to eight characters; blanks mean unknown.
fn text_field(entry: &Map<String, Value>, name: &str) -> Option<String> {
    entry
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// A source of feed snapshots.
#[async_trait]
pub trait FeedSource: Send + Sync + std::fmt::Debug {
    /// Where the feed is read from, for logging.
    fn location(&self) -> &str;

    /// Fetch and decode the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be read or decoded.
    async fn fetch(&self) -> Result<Snapshot>;
}

/// Feed served over HTTP, usually by the tar1090 web server.
#[derive(Debug)]
pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpFeed {
    /// Create a feed client with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| Error::FeedRequest {
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url })
    }

    fn request_error(&self, source: reqwest::Error) -> Error {
        Error::FeedRequest {
            url: self.url.clone(),
            source,
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    fn location(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Snapshot> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.request_error(e))?;
        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        trace!("Fetched {} bytes from {}", body.len(), self.url);
        Snapshot::from_slice(&body)
    }
}

/// Feed written to the local file system by readsb.
#[derive(Debug)]
pub struct FileFeed {
    path: PathBuf,
    location: String,
}

impl FileFeed {
    /// Read snapshots from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let location = path.display().to_string();
        Self { path, location }
    }
}

#[async_trait]
impl FeedSource for FileFeed {
    fn location(&self) -> &str {
        &self.location
    }

    async fn fetch(&self) -> Result<Snapshot> {
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|source| Error::FeedRead {
                path: self.path.clone(),
                source,
            })?;
        Snapshot::from_slice(&body)
    }
}

/// Build the feed source for a configured URL.
///
/// `http://` and `https://` URLs are fetched over HTTP; `file://` URLs and
/// plain paths are read from disk.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn from_config(config: &FeedConfig) -> Result<Box<dyn FeedSource>> {
    let url = config.url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(Box::new(HttpFeed::new(url, config.timeout())?))
    } else {
        let path = url.strip_prefix("file://").unwrap_or(url);
        Ok(Box::new(FileFeed::new(path)))
    }
}
