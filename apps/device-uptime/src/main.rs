use anyhow::Result;
use clap::Parser;
use device_uptime::cli::Args;
use device_uptime::config::Config;
use device_uptime::engine::UptimeEngine;
use device_uptime::error::error_chain;
use device_uptime::registry::RegistryClient;
use device_uptime::store::{build_pool, PgChannelUptime, PgReadingsStore, PgUptimeSink};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

fn init_tracing(config: &Config) -> Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime::Tokio, trace::Config as OTelTraceConfig, Resource};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,device_uptime=info".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    if let Some(endpoint) = &config.otlp_endpoint {
        let exporter = opentelemetry_otlp::new_exporter()
            .http()
            .with_endpoint(normalize_otlp_http_endpoint(endpoint));
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(OTelTraceConfig::default().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "device-uptime"),
            ])))
            .install_batch(Tokio)?;

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

fn normalize_otlp_http_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() || trimmed.contains("/v1/traces") {
        return trimmed.to_string();
    }
    format!("{}/v1/traces", trimmed.trim_end_matches('/'))
}

async fn run_cycle(engine: &UptimeEngine, args: &Args) {
    let span = tracing::info_span!("uptime_cycle", run_id = %Uuid::new_v4());
    run_cycle_inner(engine, args).instrument(span).await
}

async fn run_cycle_inner(engine: &UptimeEngine, args: &Args) {
    match engine
        .compute_and_save_device_uptime(args.uptime_request())
        .await
    {
        Ok(report) => tracing::info!(
            rows = report.devices_uptime.len(),
            overall_uptime = report.overall_uptime.value(),
            start = %report.start_date_time,
            end = %report.end_date_time,
            "bucket uptime cycle finished"
        ),
        Err(err) => tracing::error!(error = %error_chain(&err), "bucket uptime cycle failed"),
    }

    match engine.save_device_uptime().await {
        Ok(network) => tracing::info!(
            network = %network.network_name,
            uptime = network.uptime.value(),
            "device uptime cycle finished"
        ),
        Err(err) => tracing::error!(error = %error_chain(&err), "device uptime cycle failed"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;
    init_tracing(&config)?;

    let pool = build_pool(&config.database_url, config.db_pool_size).await?;
    let registry = RegistryClient::new(config.registry_url.clone())?;
    let channels = PgChannelUptime::new(
        pool.clone(),
        config.channel_window(),
        config.expected_data_points,
    );
    tracing::info!(
        tenant = %config.tenant,
        network = %config.network,
        workers = config.worker_count,
        channel_expected_data_points = channels.expected_data_points().get(),
        "device uptime starting"
    );

    let engine = UptimeEngine::new(
        &config,
        Arc::new(registry),
        Arc::new(PgReadingsStore::new(pool.clone())),
        Arc::new(channels),
        Arc::new(PgUptimeSink::new(pool)),
    );

    if args.once {
        run_cycle(&engine, &args).await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(config.run_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => run_cycle(&engine, &args).await,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
