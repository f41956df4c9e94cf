//! State-checked streaming sink over the response writer.

use std::fmt::Display;

use futures::{Sink, SinkExt};
use puzzle_core::{LifecyclePhase, TimingContext};

/// Response status and headers, written before any body bytes.
///
/// Status and headers come from the primary fragment at request time, so
/// the head travels through the sink rather than being fixed up front.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHead {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in write order.
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Create a head with a status code.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Get a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One write to the response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    /// Status and headers; exactly one, before any body.
    Head(ResponseHead),
    /// Body bytes.
    Body(Vec<u8>),
}

/// Error type for streaming writes.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Response head already sent")]
    HeadAlreadySent,

    #[error("Response head not sent before body")]
    HeadNotSent,

    #[error("First flush not sent before chunks")]
    FirstFlushNotSent,

    #[error("Sink already completed")]
    Completed,

    #[error("Stream error: {0}")]
    Sink(String),
}

/// State of the streaming sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    /// Initial state, nothing sent.
    Initial,
    /// Head written, first flush pending.
    HeadSent,
    /// First flush written, chunks may stream.
    FirstFlushSent,
    /// Response completed.
    Completed,
}

/// Streaming sink enforcing the first-flush / progressive-chunk protocol.
///
/// Generic over the underlying response writer; any
/// `Sink<ResponseEvent>` works. Writes go through `&mut self`, so they are
/// serialized per response; each send flushes before returning.
pub struct StreamingSink<S, E>
where
    S: Sink<ResponseEvent, Error = E> + Unpin,
    E: Display,
{
    inner: S,
    state: SinkState,
    timing: TimingContext,
    chunks_sent: Vec<String>,
}

impl<S, E> StreamingSink<S, E>
where
    S: Sink<ResponseEvent, Error = E> + Unpin,
    E: Display,
{
    /// Create a new streaming sink.
    pub fn new(sink: S, timing: TimingContext) -> Self {
        Self {
            inner: sink,
            state: SinkState::Initial,
            timing,
            chunks_sent: Vec::new(),
        }
    }

    /// Write the response head. Must be the first write.
    pub async fn send_head(&mut self, head: ResponseHead) -> Result<(), StreamError> {
        if self.state != SinkState::Initial {
            return Err(StreamError::HeadAlreadySent);
        }

        self.inner
            .send(ResponseEvent::Head(head))
            .await
            .map_err(|e| StreamError::Sink(e.to_string()))?;
        self.timing.mark("head_sent");
        self.state = SinkState::HeadSent;

        Ok(())
    }

    /// Write the first-flush shell. Must precede every chunk.
    pub async fn send_first_flush(&mut self, html: &str) -> Result<(), StreamError> {
        match self.state {
            SinkState::Initial => return Err(StreamError::HeadNotSent),
            SinkState::HeadSent => {}
            _ => return Err(StreamError::Completed),
        }

        self.timing.mark("first_flush_start");
        self.inner
            .send(ResponseEvent::Body(html.as_bytes().to_vec()))
            .await
            .map_err(|e| StreamError::Sink(e.to_string()))?;
        self.timing.mark("first_flush_sent");
        self.state = SinkState::FirstFlushSent;

        Ok(())
    }

    /// Write one fragment chunk. First flush must be sent first.
    pub async fn send_chunk(&mut self, fragment: &str, html: &str) -> Result<(), StreamError> {
        match self.state {
            SinkState::Initial | SinkState::HeadSent => {
                return Err(StreamError::FirstFlushNotSent)
            }
            SinkState::Completed => return Err(StreamError::Completed),
            SinkState::FirstFlushSent => {}
        }

        self.timing.mark_chunk_start(fragment);
        self.inner
            .send(ResponseEvent::Body(html.as_bytes().to_vec()))
            .await
            .map_err(|e| StreamError::Sink(e.to_string()))?;
        self.timing.mark_chunk_sent(fragment);
        self.chunks_sent.push(fragment.to_string());

        Ok(())
    }

    /// Write raw bytes. Head must be sent first.
    pub async fn send_raw(&mut self, bytes: Vec<u8>) -> Result<(), StreamError> {
        match self.state {
            SinkState::Initial => return Err(StreamError::HeadNotSent),
            SinkState::Completed => return Err(StreamError::Completed),
            _ => {}
        }

        self.inner
            .send(ResponseEvent::Body(bytes))
            .await
            .map_err(|e| StreamError::Sink(e.to_string()))
    }

    /// Complete the response and close the writer.
    pub async fn complete(&mut self) -> Result<(), StreamError> {
        self.state = SinkState::Completed;
        self.timing.mark("complete");
        self.inner
            .close()
            .await
            .map_err(|e| StreamError::Sink(e.to_string()))
    }

    /// Fragments streamed so far, in write order.
    pub fn chunks_sent(&self) -> &[String] {
        &self.chunks_sent
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        match self.state {
            SinkState::Initial => LifecyclePhase::Start,
            SinkState::HeadSent => LifecyclePhase::HeadSent,
            SinkState::FirstFlushSent => match self.chunks_sent.last() {
                Some(fragment) => LifecyclePhase::ChunkSent(fragment.clone()),
                None => LifecyclePhase::FirstFlushSent,
            },
            SinkState::Completed => LifecyclePhase::Completion,
        }
    }

    /// Get timing context reference.
    pub fn timing(&self) -> &TimingContext {
        &self.timing
    }

    /// Consume the sink and return the inner writer.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::executor::block_on;
    use futures::StreamExt;

    fn make_sink() -> (
        StreamingSink<mpsc::UnboundedSender<ResponseEvent>, mpsc::SendError>,
        mpsc::UnboundedReceiver<ResponseEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded();
        (StreamingSink::new(tx, TimingContext::new()), rx)
    }

    #[test]
    fn test_protocol_order_is_enforced() {
        block_on(async {
            let (mut sink, _rx) = make_sink();

            assert!(matches!(
                sink.send_first_flush("<html>").await,
                Err(StreamError::HeadNotSent)
            ));
            assert!(matches!(
                sink.send_chunk("f", "<div>").await,
                Err(StreamError::FirstFlushNotSent)
            ));

            sink.send_head(ResponseHead::new(200)).await.unwrap();
            assert!(matches!(
                sink.send_head(ResponseHead::new(200)).await,
                Err(StreamError::HeadAlreadySent)
            ));
            assert!(matches!(
                sink.send_chunk("f", "<div>").await,
                Err(StreamError::FirstFlushNotSent)
            ));

            sink.send_first_flush("<html>").await.unwrap();
            sink.send_chunk("f", "<div>").await.unwrap();
            sink.complete().await.unwrap();

            assert!(matches!(
                sink.send_chunk("f", "<div>").await,
                Err(StreamError::Completed)
            ));
        });
    }

    #[test]
    fn test_events_arrive_in_write_order() {
        block_on(async {
            let (mut sink, rx) = make_sink();
            sink.send_head(ResponseHead::new(200).with_header("Content-Type", "text/html"))
                .await
                .unwrap();
            sink.send_first_flush("A").await.unwrap();
            sink.send_chunk("f", "B").await.unwrap();
            sink.send_raw(b"C".to_vec()).await.unwrap();
            sink.complete().await.unwrap();
            drop(sink);

            let events: Vec<ResponseEvent> = rx.collect().await;
            assert_eq!(events.len(), 4);
            assert!(matches!(&events[0], ResponseEvent::Head(h) if h.status == 200));
            assert!(matches!(&events[1], ResponseEvent::Body(b) if b == b"A"));
            assert!(matches!(&events[2], ResponseEvent::Body(b) if b == b"B"));
            assert!(matches!(&events[3], ResponseEvent::Body(b) if b == b"C"));
        });
    }

    #[test]
    fn test_phase_tracks_progress() {
        block_on(async {
            let (mut sink, _rx) = make_sink();
            assert_eq!(sink.phase(), LifecyclePhase::Start);

            sink.send_head(ResponseHead::new(200)).await.unwrap();
            assert_eq!(sink.phase(), LifecyclePhase::HeadSent);

            sink.send_first_flush("A").await.unwrap();
            assert_eq!(sink.phase(), LifecyclePhase::FirstFlushSent);

            sink.send_chunk("reviews", "B").await.unwrap();
            assert_eq!(
                sink.phase(),
                LifecyclePhase::ChunkSent("reviews".to_string())
            );

            sink.complete().await.unwrap();
            assert_eq!(sink.phase(), LifecyclePhase::Completion);
        });
    }
}
