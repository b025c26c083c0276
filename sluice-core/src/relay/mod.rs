//! Push-to-pull stream adaptation.
//!
//! A [`PushSource`] delivers [`SourceEvent`]s at its own pace through a
//! [`SourceSink`]. The [`RelaySession`] buffers them in a byte-bounded queue
//! and hands them out one at a time through [`RelaySession::next`]. When the
//! queue reaches the high-water mark the source is paused; once the consumer
//! drains it below half the mark the source is resumed.
//!
//! Session lifecycle: `Opening -> Streaming -> {Completed | Failed | Cancelled}`.
//! Terminal phases are absorbing and `next` keeps returning the same outcome.

pub mod task_source;

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use self::task_source::TaskSource;
use crate::error::{RelayFailure, classify};
use crate::media::SelectedEncoding;
use crate::progress::{Progress, ProgressTracker};
use crate::provider::{ProviderError, PushSource, SourceEvent, SourceProvider};

/// Default high-water mark for the relay buffer.
pub const DEFAULT_HIGH_WATER_MARK: usize = 8 * 1024 * 1024; // 8 MiB

/// Item returned by [`RelaySession::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Chunk(Bytes),
    End,
}

/// Terminal relay failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The push source reported an error.
    #[error("source failed: {reason}")]
    Source { reason: String },

    /// The source ignored pause requests and outran the buffer limit.
    #[error("source ignored backpressure, buffer limit of {limit} bytes exceeded")]
    BufferOverflow { limit: usize },

    /// The session was cancelled by its consumer.
    #[error("relay cancelled")]
    Cancelled,
}

/// Observable lifecycle phase of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Opening,
    Streaming,
    Completed,
    Failed(RelayError),
    Cancelled,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Completed | SessionPhase::Failed(_) | SessionPhase::Cancelled
        )
    }
}

/// Opens relay sessions with a fixed buffer policy.
#[derive(Debug, Clone)]
pub struct StreamAdapter {
    high_water_mark: usize,
}

impl Default for StreamAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_WATER_MARK)
    }
}

impl StreamAdapter {
    /// Creates an adapter. A zero high-water mark is raised to one byte.
    pub fn new(high_water_mark: usize) -> Self {
        Self {
            high_water_mark: high_water_mark.max(1),
        }
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Opens the source for `encoding` and starts it feeding a new session.
    ///
    /// Returns as soon as the provider has handed over the push source; no
    /// data has necessarily arrived yet.
    ///
    /// # Errors
    ///
    /// - `ProviderError` - The provider could not open the stream
    pub async fn open(
        &self,
        encoding: &SelectedEncoding,
        provider: &dyn SourceProvider,
    ) -> Result<RelaySession, ProviderError> {
        let source: Arc<dyn PushSource> = Arc::from(provider.open_stream(encoding.descriptor()).await?);
        let session = RelaySession::new(source.clone(), self.high_water_mark, encoding.content_length());

        info!(
            session = %session.id(),
            key = %encoding.descriptor().key,
            provider = provider.provider_name(),
            "Relay session opened"
        );

        source.start(session.sink());
        Ok(session)
    }
}

struct SessionState {
    phase: SessionPhase,
    queue: VecDeque<Bytes>,
    buffered: usize,
    peak_buffered: usize,
    /// End arrived while chunks were still queued.
    end_pending: bool,
    paused: bool,
    /// The source no longer needs `close`.
    released: bool,
    progress: ProgressTracker,
}

struct Shared {
    id: Uuid,
    state: Mutex<SessionState>,
    wake: Notify,
    source: Arc<dyn PushSource>,
    /// Serializes pause/resume delivery to the source.
    control: Mutex<()>,
    high_water_mark: usize,
}

/// Follow-up calls into the source, made after the state lock is dropped.
#[derive(Default)]
struct SourceActions {
    pause: bool,
    resume: bool,
    close: bool,
}

impl Shared {
    fn hard_limit(&self) -> usize {
        self.high_water_mark.saturating_mul(2)
    }

    fn low_water_mark(&self) -> usize {
        self.high_water_mark / 2
    }

    fn apply(&self, actions: SourceActions) {
        if actions.pause || actions.resume {
            self.signal_flow();
        }
        if actions.close {
            self.source.close();
        }
    }

    /// Sends the current pause state to the source.
    ///
    /// Producer and consumer may both get here after releasing the state
    /// lock. Whoever takes `control` last re-reads `paused`, so the source
    /// always ends in the most recent state even when a pause decided
    /// earlier is delivered later.
    fn signal_flow(&self) {
        let _control = self.control.lock();
        let paused = {
            let state = self.state.lock();
            if state.released {
                return;
            }
            state.paused
        };
        if paused {
            debug!(session = %self.id, "Buffer at high-water mark, pausing source");
            self.source.pause();
        } else {
            debug!(session = %self.id, "Buffer drained, resuming source");
            self.source.resume();
        }
    }

    fn accept(&self, event: SourceEvent) {
        let mut actions = SourceActions::default();
        {
            let mut state = self.state.lock();
            if state.phase.is_terminal() || state.end_pending {
                return;
            }
            state.phase = SessionPhase::Streaming;

            match event {
                SourceEvent::Data(chunk) => {
                    if chunk.is_empty() {
                        return;
                    }
                    let len = chunk.len();
                    if state.buffered > 0 && state.buffered + len > self.hard_limit() {
                        let limit = self.hard_limit();
                        warn!(session = %self.id, limit, "Source ignored pause, failing relay");
                        state.phase = SessionPhase::Failed(RelayError::BufferOverflow { limit });
                        state.queue.clear();
                        state.buffered = 0;
                        actions.close = !state.released;
                        state.released = true;
                    } else {
                        state.queue.push_back(chunk);
                        state.buffered += len;
                        state.peak_buffered = state.peak_buffered.max(state.buffered);
                        if state.buffered >= self.high_water_mark && !state.paused {
                            state.paused = true;
                            actions.pause = true;
                        }
                    }
                }
                SourceEvent::End => {
                    state.released = true;
                    if state.queue.is_empty() {
                        state.phase = SessionPhase::Completed;
                    } else {
                        state.end_pending = true;
                    }
                }
                SourceEvent::Error(reason) => {
                    state.phase = SessionPhase::Failed(RelayError::Source { reason });
                    state.queue.clear();
                    state.buffered = 0;
                    actions.close = !state.released;
                    state.released = true;
                }
            }
        }
        self.wake.notify_one();
        self.apply(actions);
    }
}

/// Handle given to a [`PushSource`] for delivering its events.
///
/// Holds only a weak reference to the session: once the session is gone,
/// pushes are silently dropped.
#[derive(Clone)]
pub struct SourceSink {
    shared: Weak<Shared>,
}

impl SourceSink {
    /// Delivers one event. Never blocks.
    pub fn push(&self, event: SourceEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.accept(event);
        }
    }

    /// Returns `true` once the receiving session has gone away or reached a
    /// terminal phase.
    pub fn is_closed(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.state.lock().phase.is_terminal(),
            None => true,
        }
    }
}

impl std::fmt::Debug for SourceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSink")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Per-request relay state binding one open source to one consumer.
///
/// Dropping the session cancels it.
pub struct RelaySession {
    shared: Arc<Shared>,
}

impl RelaySession {
    fn new(source: Arc<dyn PushSource>, high_water_mark: usize, total: Option<u64>) -> Self {
        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            state: Mutex::new(SessionState {
                phase: SessionPhase::Opening,
                queue: VecDeque::new(),
                buffered: 0,
                peak_buffered: 0,
                end_pending: false,
                paused: false,
                released: false,
                progress: ProgressTracker::new(total),
            }),
            wake: Notify::new(),
            source,
            control: Mutex::new(()),
            high_water_mark: high_water_mark.max(1),
        });
        Self { shared }
    }

    fn sink(&self) -> SourceSink {
        SourceSink {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.state.lock().phase.clone()
    }

    /// Bytes handed to the consumer so far.
    pub fn bytes_delivered(&self) -> u64 {
        self.shared.state.lock().progress.delivered()
    }

    pub fn progress(&self) -> Progress {
        self.shared.state.lock().progress.snapshot()
    }

    /// Bytes currently held in the buffer.
    pub fn buffered_bytes(&self) -> usize {
        self.shared.state.lock().buffered
    }

    /// Largest buffer occupancy seen over the session's life.
    pub fn peak_buffered_bytes(&self) -> usize {
        self.shared.state.lock().peak_buffered
    }

    /// Waits for the next chunk or terminal outcome.
    ///
    /// # Errors
    ///
    /// - `RelayError::Source` - The source failed
    /// - `RelayError::BufferOverflow` - The source ignored backpressure
    /// - `RelayError::Cancelled` - The session was cancelled
    pub async fn next(&self) -> Result<RelayEvent, RelayError> {
        loop {
            let mut actions = SourceActions::default();
            let outcome = {
                let mut state = self.shared.state.lock();
                match &state.phase {
                    SessionPhase::Completed => Some(Ok(RelayEvent::End)),
                    SessionPhase::Failed(e) => Some(Err(e.clone())),
                    SessionPhase::Cancelled => Some(Err(RelayError::Cancelled)),
                    SessionPhase::Opening | SessionPhase::Streaming => {
                        if let Some(chunk) = state.queue.pop_front() {
                            state.buffered -= chunk.len();
                            if state.paused && state.buffered <= self.shared.low_water_mark() {
                                state.paused = false;
                                actions.resume = true;
                            }
                            state.progress.observe(chunk.len());
                            Some(Ok(RelayEvent::Chunk(chunk)))
                        } else if state.end_pending {
                            state.end_pending = false;
                            state.phase = SessionPhase::Completed;
                            Some(Ok(RelayEvent::End))
                        } else {
                            None
                        }
                    }
                }
            };

            self.shared.apply(actions);
            if let Some(outcome) = outcome {
                return outcome;
            }
            self.shared.wake.notified().await;
        }
    }

    /// Cancels the session and closes the source.
    ///
    /// Safe to call repeatedly and after the session has finished; only the
    /// first call on a live session has any effect.
    pub fn cancel(&self) {
        let close = {
            let mut state = self.shared.state.lock();
            if state.phase.is_terminal() {
                return;
            }
            state.phase = SessionPhase::Cancelled;
            state.queue.clear();
            state.buffered = 0;
            state.end_pending = false;
            let close = !state.released;
            state.released = true;
            close
        };

        info!(
            session = %self.shared.id,
            delivered = self.bytes_delivered(),
            "Relay cancelled"
        );
        self.shared.wake.notify_one();
        self.shared.apply(SourceActions {
            close,
            ..Default::default()
        });
    }

    /// Turns the session into a byte stream suitable for an HTTP body.
    ///
    /// The stream ends cleanly on completion or cancellation. A source
    /// failure surfaces as a single `io::Error` so the transport aborts the
    /// response instead of finishing it.
    pub fn into_body_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        futures::stream::unfold(Some(self), |session| async move {
            let session = session?;
            match session.next().await {
                Ok(RelayEvent::Chunk(chunk)) => Some((Ok(chunk), Some(session))),
                Ok(RelayEvent::End) => {
                    info!(
                        session = %session.id(),
                        delivered = session.bytes_delivered(),
                        "Relay completed"
                    );
                    None
                }
                Err(RelayError::Cancelled) => None,
                Err(e) => {
                    let classified = classify(&RelayFailure::Relay(e.clone()));
                    error!(
                        session = %session.id(),
                        kind = %classified.kind,
                        delivered = session.bytes_delivered(),
                        "Relay interrupted mid-stream: {e}"
                    );
                    Some((Err(io::Error::other(e)), None))
                }
            }
        })
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for RelaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySession")
            .field("id", &self.shared.id)
            .field("phase", &self.phase())
            .finish()
    }
}
