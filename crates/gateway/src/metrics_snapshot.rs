//! Periodic Prometheus text snapshot of the installed recorder.
//!
//! The gateway has no HTTP surface, so metrics are exposed by rewriting
//! `data/metrics.prom` on an interval and once more at shutdown. A node
//! exporter textfile collector (or `cat`) can pick the file up.

use std::{path::PathBuf, time::Duration};

use {
    anyhow::Context,
    pincer_config::{DataLayout, MetricsConfig},
    pincer_metrics::{MetricsHandle, MetricsRecorderConfig, init_metrics},
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

pub struct SnapshotWriter {
    handle: MetricsHandle,
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(handle: MetricsHandle, path: PathBuf) -> Self {
        Self { handle, path }
    }

    /// Replace the snapshot file with the current rendering.
    pub async fn write(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("prom.tmp");
        tokio::fs::write(&tmp, self.handle.render())
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!(path = %self.path.display(), "metrics snapshot written");
        Ok(())
    }

    /// Rewrite the snapshot every `interval` until `cancel` fires, then
    /// write it one last time. `None` writes only at the end.
    pub async fn run(self, interval: Option<Duration>, cancel: CancellationToken) {
        if let Some(interval) = interval {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.write().await {
                            warn!(error = %e, "failed to write metrics snapshot");
                        }
                    },
                }
            }
        } else {
            cancel.cancelled().await;
        }
        if let Err(e) = self.write().await {
            warn!(error = %e, "failed to write final metrics snapshot");
        }
    }
}

/// Install the recorder and spawn the snapshot writer.
///
/// Returns `None` when metrics are disabled or the recorder could not be
/// installed; the gateway keeps running without them.
pub fn start(
    config: &MetricsConfig,
    layout: &DataLayout,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    let recorder = MetricsRecorderConfig {
        enabled: config.enabled,
        global_labels: config
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    };
    let handle = match init_metrics(recorder) {
        Ok(handle) if handle.is_enabled() => handle,
        Ok(_) => return None,
        Err(e) => {
            warn!(error = %e, "failed to install metrics recorder; continuing without metrics");
            return None;
        },
    };
    let path = layout.metrics_file();
    info!(path = %path.display(), "writing metrics snapshots");
    let writer = SnapshotWriter::new(handle, path);
    Some(tokio::spawn(writer.run(config.snapshot_interval(), cancel)))
}
