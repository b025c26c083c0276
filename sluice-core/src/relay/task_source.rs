//! Push source driven by a tokio task over any fallible byte stream.

use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

use super::SourceSink;
use crate::provider::{PushSource, SourceEvent};

/// Adapts a `Stream<Item = Result<Bytes, E>>` into a [`PushSource`].
///
/// Pausing is honoured between items: the task checks the pause flag before
/// polling the next chunk. `close` aborts the task, which drops the inner
/// stream and whatever connection it holds.
pub struct TaskSource<S> {
    label: &'static str,
    stream: Mutex<Option<S>>,
    paused: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    closed: Mutex<bool>,
}

impl<S> TaskSource<S> {
    pub fn new(label: &'static str, stream: S) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            label,
            stream: Mutex::new(Some(stream)),
            paused,
            task: Mutex::new(None),
            closed: Mutex::new(false),
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }
}

impl<S, E> PushSource for TaskSource<S>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    fn start(&self, sink: SourceSink) {
        if *self.closed.lock() {
            return;
        }
        let Some(stream) = self.stream.lock().take() else {
            return;
        };

        let mut paused = self.paused.subscribe();
        let label = self.label;
        let handle = tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            loop {
                let resumed = paused.wait_for(|paused| !*paused).await.is_ok();
                if !resumed || sink.is_closed() {
                    return;
                }
                match stream.next().await {
                    Some(Ok(chunk)) => {
                        trace!(source = label, bytes = chunk.len(), "Chunk received");
                        sink.push(SourceEvent::Data(chunk));
                    }
                    Some(Err(e)) => {
                        sink.push(SourceEvent::Error(e.to_string()));
                        return;
                    }
                    None => {
                        sink.push(SourceEvent::End);
                        return;
                    }
                }
            }
        });

        // close() may have raced with the spawn above.
        let mut task = self.task.lock();
        if *self.closed.lock() {
            handle.abort();
        } else {
            *task = Some(handle);
        }
    }

    fn pause(&self) {
        self.paused.send_replace(true);
    }

    fn resume(&self) {
        self.paused.send_replace(false);
    }

    fn close(&self) {
        let mut task = self.task.lock();
        *self.closed.lock() = true;
        if let Some(handle) = task.take() {
            handle.abort();
        }
        drop(task);
        self.stream.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::relay::{RelayEvent, RelaySession};

    fn session_over<S, E>(source: Arc<TaskSource<S>>) -> RelaySession
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let session = RelaySession::new(source.clone(), 4, None);
        source.start(session.sink());
        session
    }

    #[tokio::test]
    async fn test_relays_stream_items() {
        let items: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
        let source = Arc::new(TaskSource::new("test", futures::stream::iter(items)));
        let session = session_over(source);

        assert_eq!(
            session.next().await,
            Ok(RelayEvent::Chunk(Bytes::from_static(b"ab")))
        );
        assert_eq!(
            session.next().await,
            Ok(RelayEvent::Chunk(Bytes::from_static(b"cd")))
        );
        assert_eq!(session.next().await, Ok(RelayEvent::End));
    }

    #[tokio::test]
    async fn test_pauses_at_high_water_mark() {
        let items = (0..10).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![0u8; 2])));
        let source = Arc::new(TaskSource::new("test", futures::stream::iter(items)));
        let session = session_over(source.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(source.is_paused());
        assert_eq!(session.buffered_bytes(), 4);

        // Draining to the low-water mark resumes delivery.
        session.next().await.unwrap();
        assert!(!source.is_paused());
    }

    #[tokio::test]
    async fn test_stream_error_becomes_source_error() {
        let items = vec![Err::<Bytes, _>("boom")];
        let source = Arc::new(TaskSource::new("test", futures::stream::iter(items)));
        let session = session_over(source);

        assert!(matches!(
            session.next().await,
            Err(crate::relay::RelayError::Source { reason }) if reason == "boom"
        ));
    }

    #[tokio::test]
    async fn test_close_before_start_prevents_delivery() {
        let source = Arc::new(TaskSource::new(
            "test",
            futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"x"))]),
        ));
        source.close();
        let session = RelaySession::new(source.clone(), 4, None);
        source.start(session.sink());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(session.buffered_bytes(), 0);
    }
}
