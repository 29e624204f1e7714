//! Buffered HTTP transport for statsd-style metric lines.
//!
//! [`BufferedSender`] joins payloads with newlines and `PUT`s them to a
//! collector in batches, either when the buffer fills up or when the flush
//! timer fires. Delivery is best effort: failed requests are dropped, never
//! retried, and never reported back to the caller.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use statsd_http_sender::{BufferedSender, SenderOptions};
//!
//! # async fn run() {
//! let sender = BufferedSender::new(
//!     SenderOptions::new()
//!         .host("https://metrics.example.com/ingest")
//!         .header("x-api-key", "secret")
//!         .flush_interval(Duration::from_millis(500)),
//! );
//! sender.send("requests.count:1|c");
//! sender.send("requests.latency:42|ms");
//! sender.shutdown().await;
//! # }
//! ```

mod buffer;
mod config;
mod sender;
mod transport;

#[cfg(test)]
mod testing;

pub use config::{
    ConfigError, DEFAULT_FLUSH_INTERVAL, DEFAULT_HOST, DEFAULT_MAX_BUFFER_SIZE, SenderOptions,
};
pub use sender::BufferedSender;
pub use transport::{Endpoint, HttpTransport, Transport, TransportError};
