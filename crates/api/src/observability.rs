use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const HTTP_REQUESTS_TOTAL: &str = "tripmate_api_http_requests_total";
const HTTP_REQUEST_DURATION_SECONDS: &str = "tripmate_api_http_request_duration_seconds";
const HTTP_REQUEST_ERRORS_TOTAL: &str = "tripmate_api_http_errors_total";
const REALTIME_EVENTS_TOTAL: &str = "tripmate_api_realtime_events_total";
const REALTIME_HANDSHAKES_TOTAL: &str = "tripmate_api_realtime_handshakes_total";
const REALTIME_ACTIVE_SESSIONS: &str = "tripmate_api_realtime_active_sessions";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

pub fn register_http_request(method: &str, route: &str, status: StatusCode, elapsed: Duration) {
    let status_code = status.as_u16().to_string();
    let result = if status.is_server_error() {
        "error"
    } else {
        "success"
    };

    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status_code.clone(),
        "result" => result
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status_code.clone()
    )
    .record(elapsed.as_secs_f64());

    if status.is_server_error() {
        counter!(
            HTTP_REQUEST_ERRORS_TOTAL,
            "method" => method.to_string(),
            "route" => route.to_string(),
            "status" => status_code
        )
        .increment(1);
    }
}

/// `direction` is `inbound` for client frames and `outbound` for server events.
pub fn register_realtime_event(direction: &'static str, event: &'static str) {
    counter!(
        REALTIME_EVENTS_TOTAL,
        "direction" => direction,
        "event" => event
    )
    .increment(1);
}

pub fn register_realtime_handshake(outcome: &'static str) {
    counter!(REALTIME_HANDSHAKES_TOTAL, "outcome" => outcome).increment(1);
}

pub fn set_realtime_sessions(active: usize) {
    gauge!(REALTIME_ACTIVE_SESSIONS).set(active as f64);
}
