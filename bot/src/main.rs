use anyhow::{bail, Context, Result};
use signal_core::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &shared::Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn version_banner() -> String {
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let git_branch = option_env!("GIT_BRANCH").unwrap_or("unknown");
    let git_tag = option_env!("GIT_TAG").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    let short_hash = git_hash.get(..8).unwrap_or(git_hash);
    format!(
        "signal bot v{} ({}@{}, tag {}, built {})",
        env!("CARGO_PKG_VERSION"),
        git_branch,
        short_hash,
        git_tag,
        build_time
    )
}

fn load_pipeline_config(config: &shared::Config) -> Result<PipelineConfig> {
    let mut pipeline = match &config.pipeline_config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load pipeline config from {}", path))?,
        None => PipelineConfig::default(),
    };

    let overrides = &config.alerts;
    if let Some(threshold) = overrides.confidence_threshold {
        pipeline.alerts.confidence_threshold = threshold;
    }
    if let Some(enabled) = overrides.alerts_enabled {
        pipeline.alerts.alerts_enabled = enabled;
    }
    if let Some(volume) = overrides.alert_volume {
        pipeline.alerts.alert_volume = volume;
    }
    if let Some(enabled) = overrides.notifications_enabled {
        pipeline.alerts.notifications_enabled = enabled;
    }
    pipeline.validate().context("Invalid alert overrides")?;
    Ok(pipeline)
}

fn build_source(config: &shared::Config, pipeline: &PipelineConfig) -> Result<MarketDataSource> {
    let primary: Arc<dyn CandleFeed> = match config.data_source.to_lowercase().as_str() {
        "simulated" | "sim" => Arc::new(SimulatedFeed::default()),
        other => bail!("Unsupported DATA_SOURCE: {}", other),
    };
    let mut source = MarketDataSource::new(primary, pipeline.source.clone());
    if pipeline.source.fallback_to_simulated {
        source = source.with_fallback(Arc::new(SimulatedFeed::default()));
    }
    Ok(source)
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::Status(status) => {
            tracing::info!(status = %status, simulated = status.is_simulated(), "Source status changed");
        }
        PipelineEvent::Signal(output) => {
            let signal = &output.signal;
            match (&output.hold_reason, &signal.price_targets) {
                (None, Some(targets)) => tracing::info!(
                    symbol = %output.symbol,
                    interval = %output.interval,
                    signal = %signal.signal_type,
                    confidence = signal.confidence,
                    entry = targets.entry,
                    stop_loss = targets.stop_loss,
                    target1 = targets.target1,
                    regime = ?output.regime.kind,
                    "Signal"
                ),
                (reason, _) => tracing::debug!(
                    symbol = %output.symbol,
                    raw = %output.raw.signal_type,
                    confidence = output.raw.confidence,
                    reason = ?reason,
                    "Holding"
                ),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = shared::Config::from_env()?;
    init_tracing(&config);
    tracing::info!("{}", version_banner());

    let interval: Interval = config.interval.parse()?;
    let pipeline = load_pipeline_config(&config)?;
    let source = build_source(&config, &pipeline)?;

    let capacity = pipeline.source.channel_capacity;
    let (event_tx, mut events) = mpsc::channel(capacity);
    let (command_tx, commands) = mpsc::channel(8);
    let runner = PipelineRunner::new(pipeline, source, event_tx).with_alerts(Arc::new(TracingAlertSink));
    let runner_task = tokio::spawn(runner.run(commands));

    command_tx
        .send(PipelineCommand::Switch {
            symbol: config.symbol.clone(),
            interval,
        })
        .await
        .context("Pipeline stopped before the first session")?;
    tracing::info!(symbol = %config.symbol, %interval, source = %config.data_source, "Pipeline started");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => log_event(&event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                let _ = command_tx.send(PipelineCommand::Stop).await;
                break;
            }
        }
    }

    drop(events);
    runner_task.await.context("Pipeline task panicked")??;
    tracing::info!("Bot stopped");
    Ok(())
}
