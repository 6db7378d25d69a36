//! Bridge and upload worker wired together.

use std::sync::Arc;

use hvgate_core::{ChannelBus, Client, RetryConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bridge::{Bridge, BridgeStats, StatsSnapshot};
use crate::config::BridgeConfig;
use crate::templates::ChannelTable;
use crate::uploader::Uploader;

/// Running bridge and upload tasks.
#[derive(Debug)]
pub struct Pipeline {
    bridge: JoinHandle<()>,
    uploader: JoinHandle<()>,
    stats: Arc<BridgeStats>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Subscribe to `bus` and start both tasks.
    ///
    /// The tasks stop when every publisher of the bus is gone and the queue
    /// has drained, or when `cancel` fires.
    pub fn start(
        client: Arc<Client>,
        bus: &ChannelBus,
        table: ChannelTable,
        config: &BridgeConfig,
        cancel: CancellationToken,
    ) -> Self {
        let stats = Arc::new(BridgeStats::new());
        let (bridge, queue) = Bridge::new(table, config.queue_capacity, Arc::clone(&stats));
        let uploader = Uploader::new(
            client,
            RetryConfig::for_upload(config.upload_retries),
            Arc::clone(&stats),
        );

        let samples = bus.subscribe();
        let bridge = tokio::spawn(bridge.run(samples, cancel.clone()));
        let uploader = tokio::spawn(uploader.run(queue, cancel.clone()));
        info!("Pipeline started");

        Self {
            bridge,
            uploader,
            stats,
            cancel,
        }
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Ask both tasks to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for both tasks and return the final counters.
    pub async fn join(self) -> StatsSnapshot {
        if let Err(e) = self.bridge.await {
            warn!("Bridge task failed: {}", e);
        }
        if let Err(e) = self.uploader.await {
            warn!("Upload task failed: {}", e);
        }
        let stats = self.stats.snapshot();
        info!(
            "Pipeline stopped: {} received, {} uploaded, {} failed",
            stats.received, stats.uploaded, stats.failed
        );
        stats
    }
}
