//! Shared output stream for samples produced during a scrape.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::collector::Sample;

/// Non-blocking sample writer handed to collectors.
///
/// Clones share one channel and one emitted-sample counter. Samples emitted
/// after the receiving side is gone are dropped and counted separately.
#[derive(Clone)]
pub struct SampleSink {
    tx: UnboundedSender<Sample>,
    emitted: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl std::fmt::Debug for SampleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleSink")
            .field("emitted", &self.emitted())
            .finish_non_exhaustive()
    }
}

impl SampleSink {
    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (Self, UnboundedReceiver<Sample>) {
        let (tx, rx) = unbounded_channel();
        let sink = Self {
            tx,
            emitted: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, rx)
    }

    /// Send one sample downstream.
    pub fn emit(&self, sample: Sample) {
        if self.tx.send(sample).is_ok() {
            self.emitted.fetch_add(1, Ordering::Relaxed);
        } else {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped == 1 {
                tracing::warn!("Sample receiver closed, dropping samples");
            }
        }
    }

    /// Samples accepted so far across all clones.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Samples dropped because the receiver was closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Drain every sample currently buffered in `rx`.
pub fn drain(rx: &mut UnboundedReceiver<Sample>) -> Vec<Sample> {
    let mut samples = Vec::new();
    while let Ok(sample) = rx.try_recv() {
        samples.push(sample);
    }
    samples
}
