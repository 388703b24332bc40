use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new();
    let handle = builder.install_recorder()?;
    Ok(handle)
}

pub fn record_submission() {
    ::metrics::counter!("orders_submitted_total").increment(1);
}

pub fn record_rejection(reason: &'static str) {
    ::metrics::counter!("orders_rejected_total", "reason" => reason).increment(1);
}

pub fn record_trade() {
    ::metrics::counter!("trades_total").increment(1);
}

pub fn set_resting_orders(count: usize) {
    ::metrics::gauge!("resting_orders").set(count as f64);
}
