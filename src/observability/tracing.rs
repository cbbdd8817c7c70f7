use anyhow::{Context, Error, Result};
use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracer, SdkTracerProvider},
};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

const SERVICE_NAME: &str = "content-worker";

/// Tracing サブスクライバを一度だけ初期化する。
///
/// `OTEL_EXPORTER_OTLP_ENDPOINT` が設定されている場合は OTLP エクスポーターを追加する。
/// エクスポーターの構築に失敗した場合は JSON ログのみで起動を続ける。
///
/// # Errors
/// サブスクライバの初期化に失敗した場合はエラーを返す。
pub fn init() -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).json();

        let otel_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

        if let Some(endpoint) = otel_endpoint {
            match init_tracer(&endpoint) {
                Ok(tracer) => {
                    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt_layer)
                        .with(otel_layer)
                        .try_init()
                        .map_err(|e: tracing_subscriber::util::TryInitError| {
                            Error::msg(e.to_string())
                        })?;
                    info!(
                        otel_enabled = true,
                        endpoint = %endpoint,
                        "Tracing initialized with OpenTelemetry"
                    );
                }
                Err(e) => {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt_layer)
                        .try_init()
                        .map_err(|e: tracing_subscriber::util::TryInitError| {
                            Error::msg(e.to_string())
                        })?;
                    info!(
                        otel_enabled = false,
                        error = %e,
                        "Tracing initialized without OpenTelemetry (init failed)"
                    );
                }
            }
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e: tracing_subscriber::util::TryInitError| Error::msg(e.to_string()))?;
            info!(otel_enabled = false, "Standard tracing initialized");
        }

        Ok::<(), Error>(())
    })?;
    Ok(())
}

/// サンプリング比率は `OTEL_SAMPLING_RATIO`（デフォルト1.0）。
fn init_tracer(endpoint: &str) -> Result<SdkTracer> {
    let sampling_ratio = std::env::var("OTEL_SAMPLING_RATIO")
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(1.0);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::TraceIdRatioBased(sampling_ratio))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    let tracer = tracer_provider.tracer(SERVICE_NAME);
    global::set_tracer_provider(tracer_provider);

    Ok(tracer)
}
