use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::transport::{Transport, TransportError};

/// Records every body it is asked to send. Clones share the record.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    bodies: Arc<Mutex<Vec<Bytes>>>,
}

impl RecordingTransport {
    pub fn bodies(&self) -> Vec<String> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .map(|b| String::from_utf8(b.to_vec()).unwrap())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }
}

impl Transport for RecordingTransport {
    async fn put(&self, body: Bytes) -> Result<(), TransportError> {
        self.bodies.lock().unwrap().push(body);
        Ok(())
    }
}

/// Fails every request, as if the collector refused the connection.
#[derive(Clone, Default)]
pub struct FailingTransport {
    attempts: Arc<AtomicUsize>,
}

impl FailingTransport {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Transport for FailingTransport {
    async fn put(&self, _body: Bytes) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::InvalidEndpoint("connection refused".into()))
    }
}

/// Takes 100ms before recording the body.
#[derive(Clone, Default)]
pub struct SlowTransport {
    inner: RecordingTransport,
}

impl SlowTransport {
    pub fn bodies(&self) -> Vec<String> {
        self.inner.bodies()
    }
}

impl Transport for SlowTransport {
    async fn put(&self, body: Bytes) -> Result<(), TransportError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.inner.put(body).await
    }
}

/// Let spawned dispatch tasks run without moving the clock.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
