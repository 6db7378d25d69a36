//! Channel to observation bridge.
//!
//! The bridge receives samples from the [`ChannelBus`](hvgate_core::ChannelBus),
//! renders each into an [`Observation`] using the channel table, and hands
//! it to the upload worker through a bounded queue. Samples for unknown
//! channels and samples that fail to render are dropped with a warning;
//! nothing reaches the client unless it is a well-formed record body.
//!
//! Dispatch never waits: when the queue is full the sample is dropped, so a
//! slow service never back-pressures the producers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hvgate_core::{Observation, SampleReceiver, UsageError};
use hvgate_types::Sample;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::templates::ChannelTable;

/// Outcome of dispatching one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Rendered and queued for upload.
    Queued,
    /// No table entry for the channel.
    UnknownChannel,
    /// The value could not be rendered.
    RenderFailed,
    /// The upload queue was full.
    QueueFull,
    /// The upload worker has stopped.
    Closed,
}

/// Counters shared by the bridge and the upload worker.
#[derive(Debug, Default)]
pub struct BridgeStats {
    received: AtomicU64,
    queued: AtomicU64,
    coalesced: AtomicU64,
    dropped_unknown: AtomicU64,
    dropped_render: AtomicU64,
    dropped_queue_full: AtomicU64,
    uploaded: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Samples seen by the bridge.
    pub received: u64,
    /// Observations put on the upload queue.
    pub queued: u64,
    /// Observations replaced by a newer one for the same channel.
    pub coalesced: u64,
    /// Samples dropped for an unknown channel.
    pub dropped_unknown: u64,
    /// Samples dropped because they could not be rendered.
    pub dropped_render: u64,
    /// Samples dropped because the queue was full or closed.
    pub dropped_queue_full: u64,
    /// Observations the service accepted.
    pub uploaded: u64,
    /// Observations that failed to upload.
    pub failed: u64,
}

impl BridgeStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            dropped_unknown: self.dropped_unknown.load(Ordering::Relaxed),
            dropped_render: self.dropped_render.load(Ordering::Relaxed),
            dropped_queue_full: self.dropped_queue_full.load(Ordering::Relaxed),
            uploaded: self.uploaded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_uploaded(&self) {
        self.uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Renders samples and feeds the upload queue.
#[derive(Debug)]
pub struct Bridge {
    table: ChannelTable,
    queue: mpsc::Sender<Observation>,
    stats: Arc<BridgeStats>,
}

impl Bridge {
    /// Create a bridge and the receiving end of its upload queue.
    pub fn new(
        table: ChannelTable,
        queue_capacity: usize,
        stats: Arc<BridgeStats>,
    ) -> (Self, mpsc::Receiver<Observation>) {
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        (
            Self {
                table,
                queue,
                stats,
            },
            rx,
        )
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.stats)
    }

    /// Channels this bridge forwards.
    pub fn table(&self) -> &ChannelTable {
        &self.table
    }

    /// Render one sample and queue it for upload.
    pub fn dispatch(&self, sample: &Sample) -> Dispatch {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let Some(spec) = self.table.get(&sample.channel) else {
            self.stats.dropped_unknown.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Dropping sample: {}",
                UsageError::UnknownChannel(sample.channel.clone())
            );
            return Dispatch::UnknownChannel;
        };

        let observation = match spec.observation(sample) {
            Ok(observation) => observation,
            Err(e) => {
                self.stats.dropped_render.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping sample: {}", e);
                return Dispatch::RenderFailed;
            }
        };

        match self.queue.try_send(observation) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
                debug!("Queued {} = {}", sample.channel, sample.value);
                Dispatch::Queued
            }
            Err(mpsc::error::TrySendError::Full(observation)) => {
                self.stats.dropped_queue_full.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Upload queue full, dropping sample for {}",
                    observation.channel
                );
                Dispatch::QueueFull
            }
            Err(mpsc::error::TrySendError::Closed(observation)) => {
                self.stats.dropped_queue_full.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Upload worker stopped, dropping sample for {}",
                    observation.channel
                );
                Dispatch::Closed
            }
        }
    }

    /// Dispatch samples from the bus until it closes or `cancel` fires.
    ///
    /// Dropping the bridge on return closes the upload queue, which lets the
    /// worker drain and stop.
    pub async fn run(self, mut samples: SampleReceiver, cancel: CancellationToken) {
        info!(
            "Bridge forwarding {} channel(s): {}",
            self.table.len(),
            self.table.channels().collect::<Vec<_>>().join(", ")
        );

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Bridge stopping: shutdown requested");
                    break;
                }
                received = samples.recv() => received,
            };

            match received {
                Ok(sample) => {
                    self.dispatch(&sample);
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Bridge lagged behind the sample bus, {} sample(s) lost", missed);
                }
                Err(RecvError::Closed) => {
                    info!("Bridge stopping: sample bus closed");
                    break;
                }
            }
        }
    }
}
