//! Gateway metrics
//!
//! - `gateway_requests_total` (counter): labels `method`, `status`
//! - `gateway_request_errors_total` (counter): label `error_type`
//! - `gateway_token_refresh_total` (counter): label `outcome`
//!
//! No recorder is installed here; embedders pick the exporter.

/// Record a response received from the backend.
pub fn record_request(method: &str, status: u16) {
    metrics::counter!("gateway_requests_total", "method" => method.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a failed call by error kind (see `GatewayError::kind`).
pub fn record_error(error_type: &str) {
    metrics::counter!("gateway_request_errors_total", "error_type" => error_type.to_string())
        .increment(1);
}

/// Record a refresh attempt: `refreshed`, `still_valid`, `failed` or `timeout`.
pub fn record_refresh(outcome: &str) {
    metrics::counter!("gateway_token_refresh_total", "outcome" => outcome.to_string())
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("GET", 200);
        record_error("timeout");
        record_refresh("refreshed");
    }

    #[test]
    fn counters_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        {
            let _guard = metrics::set_default_local_recorder(&recorder);
            record_request("GET", 401);
            record_refresh("still_valid");
            record_refresh("still_valid");
        }

        let rendered = handle.render();
        assert!(rendered.contains("gateway_requests_total"), "got:\n{rendered}");
        assert!(rendered.contains("status=\"401\""), "got:\n{rendered}");
        assert!(rendered.contains("method=\"GET\""), "got:\n{rendered}");
        assert!(
            rendered.contains("gateway_token_refresh_total{outcome=\"still_valid\"} 2"),
            "got:\n{rendered}"
        );
    }
}
