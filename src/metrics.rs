use std::time::Duration;
use tracing::trace;

// Recorded through the `metrics` facade, which the Prometheus recorder
// installed in `main` renders at `/metrics`.

pub const REQUESTS_TOTAL: &str = "catalog_requests_total";
pub const RESPONSES_TOTAL: &str = "catalog_responses_total";
pub const STAGE_SECONDS: &str = "catalog_stage_duration_seconds";

pub fn inc_requests(route: &'static str) {
    ::metrics::counter!(REQUESTS_TOTAL, "route" => route).increment(1);
    trace!(
        target = "catalog.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn stage_elapsed(stage: &'static str, elapsed: Duration) {
    ::metrics::histogram!(STAGE_SECONDS, "stage" => stage).record(elapsed.as_secs_f64());
    trace!(
        target = "catalog.metrics",
        stage = stage,
        elapsed_ms = elapsed.as_millis() as u64,
        "stage_elapsed"
    );
}

pub fn response_status(route: &'static str, status: u16) {
    ::metrics::counter!(RESPONSES_TOTAL, "route" => route, "status" => status.to_string())
        .increment(1);
    trace!(
        target = "catalog.metrics",
        route = route,
        status = status,
        "responses_total_inc"
    );
}
