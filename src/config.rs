use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_HOST: &str = "http://localhost/";
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} has invalid value: {1}")]
    InvalidNumeric(String, String),

    #[error("headers entry is not a name=value pair: {0}")]
    InvalidHeader(String),
}

/// Construction-time settings for a [`BufferedSender`](crate::BufferedSender).
///
/// A `max_buffer_size` of zero disables buffering: every payload goes out as
/// its own request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderOptions {
    pub host: String,
    pub headers: Vec<(String, String)>,
    pub flush_interval: Duration,
    pub max_buffer_size: usize,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            headers: Vec::new(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

impl SenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Attach a static header to every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn max_buffer_size(mut self, bytes: usize) -> Self {
        self.max_buffer_size = bytes;
        self
    }

    /// Build options from a string map, e.g. a section of a config file.
    ///
    /// Recognised keys: `host`, `headers` (`name=value,name2=value2`),
    /// `socket_timeout_ms` and `max_buffer_size`. Missing keys fall back to
    /// the defaults. The host is taken as-is; an unusable URL only shows up
    /// later as failed (and discarded) requests.
    pub fn parse(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let host = vars
            .get("host")
            .filter(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let headers = parse_headers(vars)?;
        let flush_interval =
            parse_duration_ms(vars, "socket_timeout_ms", DEFAULT_FLUSH_INTERVAL)?;
        let max_buffer_size = parse_usize(vars, "max_buffer_size", DEFAULT_MAX_BUFFER_SIZE)?;

        Ok(Self {
            host,
            headers,
            flush_interval,
            max_buffer_size,
        })
    }
}

fn parse_duration_ms(
    vars: &HashMap<String, String>,
    name: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match vars.get(name) {
        Some(val) => {
            let ms: u64 = val
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone()))?;
            Ok(Duration::from_millis(ms))
        }
        None => Ok(default),
    }
}

fn parse_usize(
    vars: &HashMap<String, String>,
    name: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match vars.get(name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone())),
        None => Ok(default),
    }
}

fn parse_headers(vars: &HashMap<String, String>) -> Result<Vec<(String, String)>, ConfigError> {
    let Some(raw) = vars.get("headers").filter(|s| !s.trim().is_empty()) else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (k, v) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidHeader(pair.to_owned()))?;
            let k = k.trim();
            if k.is_empty() {
                return Err(ConfigError::InvalidHeader(pair.to_owned()));
            }
            Ok((k.to_owned(), v.trim().to_owned()))
        })
        .collect()
}
