use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::buffer::LineBuffer;
use crate::config::SenderOptions;
use crate::transport::{Endpoint, HttpTransport, Transport};

/// Grace period between `close()` and the final teardown.
const KILL_DELAY: Duration = Duration::from_millis(10);

/// Tokio intervals reject a zero period.
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Upper bound so `Instant + period` cannot overflow.
const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

struct SenderState {
    buffer: LineBuffer,
    timer: Option<JoinHandle<()>>,
    /// Number of flush timers started so far.
    generation: u64,
}

struct Shared<T> {
    transport: Arc<T>,
    state: Mutex<SenderState>,
    dispatches: TaskTracker,
    max_buffer_size: usize,
    flush_interval: Duration,
}

impl<T: Transport> Shared<T> {
    /// The lock is never held across `.await`; a poisoned lock still guards
    /// a consistent buffer, so it is used as-is.
    fn lock(&self) -> MutexGuard<'_, SenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(self: &Arc<Self>, payload: &str) {
        debug!(payload, "enqueue");
        let mut state = self.lock();
        self.ensure_timer(&mut state);

        if !state.buffer.is_empty() && state.buffer.len_after(payload) > self.max_buffer_size {
            self.flush(&mut state);
        }

        if payload.len() > self.max_buffer_size {
            debug!(
                bytes = payload.len(),
                max = self.max_buffer_size,
                "payload larger than buffer, sending on its own"
            );
            self.dispatch(Bytes::copy_from_slice(payload.as_bytes()));
            return;
        }

        state.buffer.push(payload);
    }

    fn flush(&self, state: &mut SenderState) {
        let body = state.buffer.take();
        debug!(bytes = body.len(), "flush");
        self.dispatch(body);
    }

    /// Fire and forget: the outcome of the request never reaches the caller.
    fn dispatch(&self, body: Bytes) {
        let transport = Arc::clone(&self.transport);
        self.dispatches.spawn(async move {
            let bytes = body.len();
            if let Err(e) = transport.put(body).await {
                debug!(error = %e, bytes, "dispatch failed, batch dropped");
            }
        });
    }

    fn on_tick(&self) {
        let mut state = self.lock();
        if !state.buffer.is_empty() {
            debug!("flush timer fired with pending data");
            self.flush(&mut state);
        }
    }

    fn ensure_timer(self: &Arc<Self>, state: &mut SenderState) {
        if state.timer.is_some() {
            return;
        }

        state.generation += 1;
        let period = self
            .flush_interval
            .clamp(MIN_FLUSH_INTERVAL, MAX_FLUSH_INTERVAL);
        let start = Instant::now() + period;
        let shared: Weak<Self> = Arc::downgrade(self);

        state.timer = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.on_tick();
            }
        }));
        debug!(?period, generation = state.generation, "flush timer started");
    }

    fn kill(&self) {
        let mut state = self.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
            debug!(generation = state.generation, "flush timer stopped");
        }
    }
}

/// Coalesces metric lines into newline-joined `PUT` requests.
///
/// A payload is appended to an in-memory buffer. The buffer goes out as one
/// request when the next payload would push it past `max_buffer_size`, or
/// when the periodic flush timer finds it non-empty. Requests are spawned
/// onto the Tokio runtime and never awaited; failures are dropped.
///
/// `send`, `close` and `kill` must be called from within a Tokio runtime.
/// Call [`close`](Self::close) (or [`shutdown`](Self::shutdown)) before
/// dropping the sender: dropping only stops the timer and discards whatever
/// is still buffered.
pub struct BufferedSender<T: Transport = HttpTransport> {
    shared: Arc<Shared<T>>,
    endpoint: Endpoint,
}

impl BufferedSender<HttpTransport> {
    pub fn new(options: SenderOptions) -> Self {
        let transport = HttpTransport::new(Endpoint::parse(&options.host), &options.headers);
        let endpoint = transport.endpoint().clone();
        Self::from_parts(&options, endpoint, transport)
    }
}

impl<T: Transport> BufferedSender<T> {
    pub fn with_transport(options: &SenderOptions, transport: T) -> Self {
        Self::from_parts(options, Endpoint::parse(&options.host), transport)
    }

    fn from_parts(options: &SenderOptions, endpoint: Endpoint, transport: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport: Arc::new(transport),
                state: Mutex::new(SenderState {
                    buffer: LineBuffer::new(),
                    timer: None,
                    generation: 0,
                }),
                dispatches: TaskTracker::new(),
                max_buffer_size: options.max_buffer_size,
                flush_interval: options.flush_interval,
            }),
            endpoint,
        }
    }

    /// Queue `payload` for delivery. With a zero `max_buffer_size` it is sent
    /// right away as its own request.
    pub fn send(&self, payload: &str) {
        if self.shared.max_buffer_size == 0 {
            debug!(payload, "send unbuffered");
            self.shared.dispatch(Bytes::copy_from_slice(payload.as_bytes()));
        } else {
            self.shared.enqueue(payload);
        }
    }

    /// Flush what is buffered and stop the flush timer.
    ///
    /// A final teardown runs 10ms later so in-flight writes can leave the
    /// process first. It is skipped if a `send` has restarted the timer in
    /// the meantime.
    pub fn close(&self) {
        debug!("close");
        let closed_generation = {
            let mut state = self.shared.lock();
            if !state.buffer.is_empty() {
                self.shared.flush(&mut state);
            }
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.generation
        };

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            time::sleep(KILL_DELAY).await;
            let restarted = shared.lock().generation != closed_generation;
            if !restarted {
                shared.kill();
            }
        });
    }

    /// Stop the flush timer immediately without draining the buffer.
    /// Idempotent.
    pub fn kill(&self) {
        debug!("kill");
        self.shared.kill();
    }

    /// `close()`, then wait until every dispatched request has finished.
    pub async fn shutdown(self) {
        self.close();
        self.shared.dispatches.close();
        self.shared.dispatches.wait().await;
        self.shared.dispatches.reopen();
        self.kill();
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Bytes currently waiting for the next flush.
    pub fn buffered_len(&self) -> usize {
        self.shared.lock().buffer.len()
    }

    pub fn is_timer_running(&self) -> bool {
        self.shared.lock().timer.is_some()
    }
}

impl<T: Transport> Drop for BufferedSender<T> {
    fn drop(&mut self) {
        self.shared.kill();
    }
}
