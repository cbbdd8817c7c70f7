pub(crate) mod metrics;
pub(crate) mod tracing;

use std::sync::Arc;

use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};

pub use self::metrics::Metrics;

/// Telemetry（メトリクスとトレーシング）を管理する構造体。
#[derive(Debug, Clone)]
pub struct Telemetry {
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// 新しいTelemetryインスタンスを作成し、トレーシングとメトリクスを初期化する。
    ///
    /// # Errors
    /// トレーシングの初期化、またはメトリクス登録に失敗した場合はエラーを返す。
    pub fn new() -> Result<Self> {
        tracing::init()?;
        Self::detached()
    }

    /// グローバルなトレーシング設定に触れずにメトリクスだけを用意する。
    ///
    /// # Errors
    /// メトリクス登録に失敗した場合はエラーを返す。
    pub fn detached() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(Arc::clone(&registry))?);
        Ok(Self { registry, metrics })
    }

    /// メトリクスへのアクセスを提供する。
    #[must_use]
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// 準備完了プローブを記録する。
    pub fn record_ready_probe(&self) {
        ::tracing::info!("service ready probe recorded");
    }

    /// ライブプローブを記録する。
    pub fn record_live_probe(&self) {
        ::tracing::debug!("service live probe");
    }

    /// Prometheusメトリクスをレンダリングする。
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_counters() {
        let telemetry = Telemetry::detached().expect("telemetry");
        telemetry.metrics().generations_total.inc();

        let rendered = telemetry.render_prometheus();

        assert!(rendered.contains("content_generations_total 1"));
    }

    #[test]
    fn separate_instances_do_not_share_registries() {
        let first = Telemetry::detached().expect("first");
        let second = Telemetry::detached().expect("second");
        first.metrics().translation_fallbacks.inc();

        assert!(!second
            .render_prometheus()
            .contains("content_translation_fallbacks_total 1"));
    }
}
