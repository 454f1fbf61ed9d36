//! Drives the [`SignalConverter`]: subscribes to `Signal`, converts approved ones into
//! `Order` events, and republishes them on the bus. Mirrors the subscribe/dispatch shape
//! used by `StrategyRuntime` and `ExecutionEngine::run`.

use chrono::Utc;
use flowtrader_core::{
    bus::EventBus,
    error::EngineError,
    event::{Event, EventKind},
};
use flowtrader_execution::SignalConverter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run_converter(
    bus: Arc<EventBus>,
    converter: Arc<SignalConverter>,
    cancel: CancellationToken,
) -> Result<(), EngineError> {
    let mut signals = bus.subscribe(EventKind::Signal)?;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            maybe = signals.recv() => {
                let Some(event) = maybe else { break };
                let Some(signal) = event.as_signal() else { continue };
                match converter.convert(signal, Utc::now()) {
                    Ok(Some(order)) => bus.publish(Event::order(Utc::now(), order)),
                    Ok(None) => {}
                    Err(err) => tracing::warn!(?err, "signal conversion failed"),
                }
            }
        }
    }
    Ok(())
}
