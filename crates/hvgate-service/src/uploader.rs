//! Upload worker.
//!
//! Drains the bridge's queue and writes each observation through the
//! session client. Whatever is waiting in the queue when the worker wakes
//! up is coalesced per channel: only the most recent observation for a
//! channel is sent.

use std::sync::Arc;

use hvgate_core::{Client, ErrorKind, Observation, RetryConfig, with_retry};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bridge::BridgeStats;

/// Writes queued observations to the service.
#[derive(Debug)]
pub struct Uploader {
    client: Arc<Client>,
    retry: RetryConfig,
    stats: Arc<BridgeStats>,
}

impl Uploader {
    /// Create a worker.
    pub fn new(client: Arc<Client>, retry: RetryConfig, stats: Arc<BridgeStats>) -> Self {
        Self {
            client,
            retry,
            stats,
        }
    }

    /// Upload until the queue closes or `cancel` fires.
    ///
    /// Cancellation is observed between uploads; an upload already in flight
    /// runs to completion or to its timeout.
    pub async fn run(self, mut queue: mpsc::Receiver<Observation>, cancel: CancellationToken) {
        loop {
            let first = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Upload worker stopping: shutdown requested");
                    return;
                }
                next = queue.recv() => match next {
                    Some(observation) => observation,
                    None => {
                        info!("Upload worker stopping: queue closed");
                        return;
                    }
                },
            };

            for observation in coalesce(first, &mut queue, &self.stats) {
                if cancel.is_cancelled() {
                    info!("Upload worker stopping: shutdown requested");
                    return;
                }
                self.upload(&observation).await;
            }
        }
    }

    /// Upload one observation, retrying transport failures.
    pub async fn upload(&self, observation: &Observation) -> bool {
        let result = with_retry(&self.retry, "put_things", || {
            self.client.put_observation(observation)
        })
        .await;

        match result {
            Ok(_) => {
                self.stats.record_uploaded();
                debug!(
                    "Uploaded {} ({})",
                    observation.channel, observation.record_type
                );
                true
            }
            Err(e) => {
                self.stats.record_failed();
                match e.kind() {
                    ErrorKind::Transport | ErrorKind::Service => {
                        warn!("Upload for {} failed: {}", observation.channel, e)
                    }
                    _ => error!("Upload for {} failed: {}", observation.channel, e),
                }
                false
            }
        }
    }
}

/// Take `first` plus everything already queued, keeping the newest
/// observation per channel in order of first arrival.
fn coalesce(
    first: Observation,
    queue: &mut mpsc::Receiver<Observation>,
    stats: &BridgeStats,
) -> Vec<Observation> {
    let mut batch = vec![first];
    while let Ok(next) = queue.try_recv() {
        match batch.iter_mut().find(|o| o.channel == next.channel) {
            Some(slot) => {
                debug!("Coalescing older sample for {}", next.channel);
                stats.record_coalesced();
                *slot = next;
            }
            None => batch.push(next),
        }
    }
    batch
}
