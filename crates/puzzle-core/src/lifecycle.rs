//! Request lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lifecycle phases for a streamed page response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Request received, processing started.
    Start,
    /// Response status and headers have been written.
    HeadSent,
    /// The first-flush shell has been flushed to the client.
    FirstFlushSent,
    /// A named fragment chunk has been sent.
    ChunkSent(String),
    /// Response completed successfully.
    Completion,
    /// An error occurred.
    Error(String),
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Mark the start of a fragment chunk.
    pub fn mark_chunk_start(&mut self, fragment: &str) {
        self.mark(&format!("chunk_{}_start", fragment));
    }

    /// Mark a fragment chunk as sent.
    pub fn mark_chunk_sent(&mut self, fragment: &str) {
        self.mark(&format!("chunk_{}_sent", fragment));
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get time to the first flush.
    pub fn time_to_first_flush(&self) -> Option<Duration> {
        self.marks
            .get("first_flush_sent")
            .map(|t| t.duration_since(self.start))
    }

    /// Get time to the first streamed chunk.
    pub fn time_to_first_chunk(&self) -> Option<Duration> {
        self.marks
            .iter()
            .filter(|(k, _)| k.starts_with("chunk_") && k.ends_with("_sent"))
            .map(|(_, t)| t.duration_since(self.start))
            .min()
    }

    /// Get timing for a specific fragment chunk.
    pub fn chunk_timing(&self, fragment: &str) -> Option<ChunkTiming> {
        let start = self.marks.get(&format!("chunk_{}_start", fragment))?;
        let sent = self.marks.get(&format!("chunk_{}_sent", fragment))?;

        Some(ChunkTiming {
            fragment: fragment.to_string(),
            start: start.duration_since(self.start),
            sent: sent.duration_since(self.start),
            duration: sent.duration_since(*start),
        })
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing information for a streamed fragment chunk.
#[derive(Debug, Clone)]
pub struct ChunkTiming {
    /// Fragment name.
    pub fragment: String,
    /// Time from request start to chunk assembly start.
    pub start: Duration,
    /// Time from request start to chunk sent.
    pub sent: Duration,
    /// Duration of chunk assembly and write.
    pub duration: Duration,
}

/// Observer trait for lifecycle events.
pub trait LifecycleObserver: Send + Sync {
    /// Called when a lifecycle phase occurs.
    fn on_phase(&self, phase: LifecyclePhase, elapsed: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_timing_requires_both_marks() {
        let mut timing = TimingContext::new();
        timing.mark_chunk_start("header");
        assert!(timing.chunk_timing("header").is_none());

        timing.mark_chunk_sent("header");
        let t = timing.chunk_timing("header").unwrap();
        assert_eq!(t.fragment, "header");
        assert!(t.sent >= t.start);
    }

    #[test]
    fn test_time_to_first_chunk_picks_earliest() {
        let mut timing = TimingContext::new();
        timing.mark_chunk_sent("a");
        timing.mark_chunk_sent("b");
        assert!(timing.time_to_first_chunk().is_some());
    }
}
