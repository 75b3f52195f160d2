//! Logging and metrics for order lifecycle events.

use {
    crate::domain::{
        order::Order,
        strategy::{ExecutionResult, Outcome},
    },
    chain::StateMachine,
};

#[derive(prometheus_metric_storage::MetricStorage)]
#[metric(subsystem = "intent_filler")]
struct Metrics {
    /// Orders discovered by the event monitor.
    #[metric(labels("chain"))]
    orders_seen: prometheus::IntCounterVec,

    /// Orders dropped because no strategy bid a positive profit.
    orders_unprofitable: prometheus::IntCounter,

    /// Fill submissions by strategy and result.
    #[metric(labels("strategy", "result"))]
    fills: prometheus::IntCounterVec,

    /// Scan ticks that failed and will be retried.
    #[metric(labels("chain"))]
    scan_errors: prometheus::IntCounterVec,
}

fn metrics() -> &'static Metrics {
    Metrics::instance(::observe::metrics::get_storage_registry())
        .expect("metrics registration must not fail")
}

pub fn order_seen(chain: &StateMachine) {
    metrics()
        .orders_seen
        .with_label_values(&[&chain.to_string()])
        .inc();
}

pub fn scan_error(chain: &StateMachine) {
    metrics()
        .scan_errors
        .with_label_values(&[&chain.to_string()])
        .inc();
}

pub fn no_profitable_strategy(order: &Order) {
    tracing::info!(id = %order.id, "no profitable strategy");
    metrics().orders_unprofitable.inc();
}

/// Logs the outcome of a fill submission and counts it.
pub fn order_executed(order: &Order, result: &ExecutionResult) {
    match &result.outcome {
        Outcome::Filled(receipt) => {
            tracing::info!(
                id = %order.id,
                strategy = result.strategy,
                tx = %receipt.tx,
                gas_used = receipt.gas_used,
                block = receipt.block_number,
                elapsed = ?receipt.wall_time,
                "order filled",
            );
            metrics()
                .fills
                .with_label_values(&[result.strategy, "success"])
                .inc();
        }
        Outcome::Failed { error } => {
            tracing::warn!(
                id = %order.id,
                strategy = result.strategy,
                %error,
                "fill execution failed",
            );
            metrics()
                .fills
                .with_label_values(&[result.strategy, "failure"])
                .inc();
        }
    }
}
