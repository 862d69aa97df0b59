//! Metrics recorder initialization.

use {anyhow::Result, tracing::info};

/// Handle to the installed recorder.
///
/// A default handle (metrics disabled, or the `prometheus` feature off)
/// renders an empty string.
#[derive(Clone, Default)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    /// Whether a recorder is collecting metrics.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle.is_some()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            false
        }
    }

    /// Render metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle
                .as_ref()
                .map(|h| {
                    h.run_upkeep();
                    h.render()
                })
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Configuration for the metrics recorder.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
    /// Labels added to every metric
    pub global_labels: Vec<(String, String)>,
}

/// Install the global metrics recorder.
///
/// Call once at startup. When disabled, or built without the `prometheus`
/// feature, nothing is installed and the returned handle renders nothing.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the bucket
/// configuration is rejected.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(MetricsHandle::default());
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = prometheus_builder(config)?.install_recorder()?;
        info!("prometheus metrics recorder installed");
        Ok(MetricsHandle {
            prometheus_handle: Some(handle),
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = config;
        info!("metrics feature not enabled at compile time");
        Ok(MetricsHandle::default())
    }
}

#[cfg(feature = "prometheus")]
fn prometheus_builder(
    config: MetricsRecorderConfig,
) -> Result<metrics_exporter_prometheus::PrometheusBuilder> {
    use {
        crate::{buckets, engine},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let mut builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(engine::DURATION_SECONDS.to_string()),
        buckets::ENGINE_DURATION,
    )?;
    for (key, value) in config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    Ok(builder)
}
