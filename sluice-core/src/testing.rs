//! Test doubles for providers and push sources.
//!
//! Available to this crate's tests and, through the `test-utils` feature, to
//! downstream test crates.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::Mutex;

use crate::media::{EncodingDescriptor, MediaIdentifier, MediaMetadata};
use crate::provider::{ProviderError, PushSource, SourceEvent, SourceProvider};
use crate::relay::{SourceSink, TaskSource};

/// One step of a scripted source.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Chunk(Bytes),
    Delay(Duration),
    End,
    Error(String),
}

/// Counts control calls made on a source.
#[derive(Debug, Default)]
pub struct SourceStats {
    start: AtomicUsize,
    pause: AtomicUsize,
    resume: AtomicUsize,
    close: AtomicUsize,
}

impl SourceStats {
    pub fn start_calls(&self) -> usize {
        self.start.load(Ordering::SeqCst)
    }

    pub fn pause_calls(&self) -> usize {
        self.pause.load(Ordering::SeqCst)
    }

    pub fn resume_calls(&self) -> usize {
        self.resume.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close.load(Ordering::SeqCst)
    }
}

fn script_stream(steps: Vec<ScriptStep>) -> BoxStream<'static, Result<Bytes, String>> {
    futures::stream::unfold(steps.into_iter(), |mut steps| async move {
        loop {
            match steps.next()? {
                ScriptStep::Delay(delay) => tokio::time::sleep(delay).await,
                ScriptStep::Chunk(chunk) => return Some((Ok(chunk), steps)),
                ScriptStep::Error(reason) => return Some((Err(reason), steps)),
                ScriptStep::End => return None,
            }
        }
    })
    .boxed()
}

/// Source that plays a script on a tokio task and honours pause/resume.
///
/// Running out of steps counts as `End`.
pub struct ScriptedSource {
    inner: TaskSource<BoxStream<'static, Result<Bytes, String>>>,
    stats: Arc<SourceStats>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            inner: TaskSource::new("scripted", script_stream(steps)),
            stats: Arc::new(SourceStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SourceStats> {
        self.stats.clone()
    }
}

impl PushSource for ScriptedSource {
    fn start(&self, sink: SourceSink) {
        self.stats.start.fetch_add(1, Ordering::SeqCst);
        self.inner.start(sink);
    }

    fn pause(&self) {
        self.stats.pause.fetch_add(1, Ordering::SeqCst);
        self.inner.pause();
    }

    fn resume(&self) {
        self.stats.resume.fetch_add(1, Ordering::SeqCst);
        self.inner.resume();
    }

    fn close(&self) {
        self.stats.close.fetch_add(1, Ordering::SeqCst);
        self.inner.close();
    }
}

/// Source driven by the test itself; ignores pause requests.
#[derive(Default)]
pub struct ManualSource {
    sink: Mutex<Option<SourceSink>>,
    stats: Arc<SourceStats>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<SourceStats> {
        self.stats.clone()
    }

    /// Pushes an event into the started session. No-op before `start`.
    pub fn emit(&self, event: SourceEvent) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.push(event);
        }
    }

    pub fn sink_closed(&self) -> bool {
        self.sink
            .lock()
            .as_ref()
            .is_none_or(SourceSink::is_closed)
    }
}

impl PushSource for ManualSource {
    fn start(&self, sink: SourceSink) {
        self.stats.start.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock() = Some(sink);
    }

    fn pause(&self) {
        self.stats.pause.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.stats.resume.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.stats.close.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory provider with scripted sources and call counters.
#[derive(Default)]
pub struct FakeProvider {
    media: HashMap<String, Result<MediaMetadata, ProviderError>>,
    scripts: HashMap<String, Vec<ScriptStep>>,
    open_failure: Option<ProviderError>,
    metadata_delay: Option<Duration>,
    open_delay: Option<Duration>,
    resolve_calls: AtomicUsize,
    open_calls: AtomicUsize,
    opened: Mutex<Vec<(String, Arc<SourceStats>)>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers metadata and plays `script` for whichever candidate is opened.
    pub fn with_media(
        mut self,
        identifier: &str,
        candidates: Vec<EncodingDescriptor>,
        script: Vec<ScriptStep>,
    ) -> Self {
        for candidate in &candidates {
            self.scripts
                .entry(candidate.key.clone())
                .or_insert_with(|| script.clone());
        }
        self.media.insert(
            identifier.to_string(),
            Ok(MediaMetadata {
                candidates,
                total_length_hint: None,
            }),
        );
        self
    }

    pub fn with_metadata(mut self, identifier: &str, metadata: MediaMetadata) -> Self {
        self.media.insert(identifier.to_string(), Ok(metadata));
        self
    }

    /// Script played when the encoding with `key` is opened.
    pub fn with_script(mut self, key: &str, script: Vec<ScriptStep>) -> Self {
        self.scripts.insert(key.to_string(), script);
        self
    }

    /// Makes metadata resolution for `identifier` fail.
    pub fn with_failure(mut self, identifier: &str, error: ProviderError) -> Self {
        self.media.insert(identifier.to_string(), Err(error));
        self
    }

    /// Makes every `open_stream` call fail.
    pub fn with_open_failure(mut self, error: ProviderError) -> Self {
        self.open_failure = Some(error);
        self
    }

    pub fn with_metadata_delay(mut self, delay: Duration) -> Self {
        self.metadata_delay = Some(delay);
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Keys and control counters of every source opened so far.
    pub fn opened_sources(&self) -> Vec<(String, Arc<SourceStats>)> {
        self.opened.lock().clone()
    }
}

#[async_trait::async_trait]
impl SourceProvider for FakeProvider {
    async fn resolve_metadata(
        &self,
        identifier: &MediaIdentifier,
    ) -> Result<MediaMetadata, ProviderError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.metadata_delay {
            tokio::time::sleep(delay).await;
        }
        self.media
            .get(identifier.as_str())
            .cloned()
            .unwrap_or_else(|| {
                Err(ProviderError::NotFound {
                    identifier: identifier.to_string(),
                })
            })
    }

    async fn open_stream(
        &self,
        encoding: &EncodingDescriptor,
    ) -> Result<Box<dyn PushSource>, ProviderError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.open_failure {
            return Err(error.clone());
        }

        let script = self
            .scripts
            .get(&encoding.key)
            .cloned()
            .ok_or_else(|| ProviderError::Other {
                reason: format!("no script for encoding {}", encoding.key),
            })?;
        let source = ScriptedSource::new(script);
        self.opened.lock().push((encoding.key.clone(), source.stats()));
        Ok(Box::new(source))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
