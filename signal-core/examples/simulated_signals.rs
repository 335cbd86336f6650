//! Example: stabilized signals over the seeded simulated feed

use signal_core::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = PipelineConfig::default();
    let source = MarketDataSource::new(Arc::new(SimulatedFeed::default()), config.source.clone());
    let (event_tx, mut events) = mpsc::channel(256);
    let (command_tx, commands) = mpsc::channel(8);
    let runner = PipelineRunner::new(config, source, event_tx).with_alerts(Arc::new(TracingAlertSink));
    let task = tokio::spawn(runner.run(commands));

    command_tx
        .send(PipelineCommand::Switch {
            symbol: "BTCUSDT".to_string(),
            interval: Interval::OneMinute,
        })
        .await?;

    let mut evaluations = 0;
    while let Some(event) = events.recv().await {
        let PipelineEvent::Signal(output) = event else {
            continue;
        };
        evaluations += 1;
        let signal = &output.signal;
        match (signal.signal_type, &signal.price_targets) {
            (SignalType::Buy, Some(t)) | (SignalType::Sell, Some(t)) => {
                info!(
                    "{} {}: Entry={:.2}, Stop={:.2}, T1={:.2}, Confidence={:.0}%",
                    if signal.signal_type == SignalType::Buy { "🔵" } else { "🔴" },
                    signal.signal_type,
                    t.entry,
                    t.stop_loss,
                    t.target1,
                    signal.confidence
                );
            }
            _ => {
                // Only log every 10th hold to reduce noise
                if evaluations % 10 == 0 {
                    info!(
                        "⚪ HOLD: raw={} ({:.0}%), reason={:?}, regime={:?}",
                        output.raw.signal_type, output.raw.confidence, output.hold_reason, output.regime.kind
                    );
                }
            }
        }

        if evaluations >= 100 {
            info!("Processed {} evaluations, stopping...", evaluations);
            break;
        }
    }

    command_tx.send(PipelineCommand::Stop).await?;
    drop(events);
    task.await??;
    Ok(())
}
