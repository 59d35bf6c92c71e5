use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::env;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

lazy_static::lazy_static! {
    pub static ref METRIC_NAMESPACE: String =
        env::var("METRIC_NAMESPACE").unwrap_or_else(|_| "order_loadgen".to_string());

    pub static ref UNITS_LAUNCHED_TOTAL: IntCounter =
        IntCounter::with_opts(
            Opts::new("units_launched_total", "Total number of order units launched")
                .namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();

    pub static ref UNITS_COMPLETED_TOTAL: IntCounter =
        IntCounter::with_opts(
            Opts::new("units_completed_total", "Order units that received an HTTP response")
                .namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();

    pub static ref UNITS_FAILED_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("units_failed_total", "Order units that got no response, by failure category")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["category"]
        ).unwrap();

    pub static ref RESPONSE_STATUS_CODES: IntCounterVec =
        IntCounterVec::new(
            Opts::new("response_status_codes_total", "Number of HTTP responses by status code")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["status_code"]
        ).unwrap();

    pub static ref ERROR_RESPONSES_BY_CATEGORY: IntCounterVec =
        IntCounterVec::new(
            Opts::new("error_responses_total", "HTTP 4xx/5xx responses by category")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["category"]
        ).unwrap();

    pub static ref IN_FLIGHT_REQUESTS: Gauge =
        Gauge::with_opts(
            Opts::new("in_flight_requests", "Order requests sent and not yet answered")
                .namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();

    pub static ref REQUEST_DURATION_SECONDS: Histogram =
        Histogram::with_opts(
            HistogramOpts::new(
                "request_duration_seconds",
                "Order request round-trip latencies in seconds."
            ).namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();
}

/// Registers all metrics with the default Prometheus registry.
pub fn register_metrics() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = prometheus::default_registry();
    registry.register(Box::new(UNITS_LAUNCHED_TOTAL.clone()))?;
    registry.register(Box::new(UNITS_COMPLETED_TOTAL.clone()))?;
    registry.register(Box::new(UNITS_FAILED_TOTAL.clone()))?;
    registry.register(Box::new(RESPONSE_STATUS_CODES.clone()))?;
    registry.register(Box::new(ERROR_RESPONSES_BY_CATEGORY.clone()))?;
    registry.register(Box::new(IN_FLIGHT_REQUESTS.clone()))?;
    registry.register(Box::new(REQUEST_DURATION_SECONDS.clone()))?;
    Ok(())
}

/// Returns a static string label for common HTTP status codes.
///
/// Uncommon codes fall back to "other" rather than allocating a unique string.
pub fn status_code_label(code: u16) -> &'static str {
    match code {
        200 => "200",
        201 => "201",
        202 => "202",
        204 => "204",
        400 => "400",
        401 => "401",
        403 => "403",
        404 => "404",
        409 => "409",
        422 => "422",
        429 => "429",
        500 => "500",
        502 => "502",
        503 => "503",
        504 => "504",
        _ => "other",
    }
}

fn encode_registry(registry: &Arc<Mutex<Registry>>) -> Result<Vec<u8>, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(buffer)
}

/// HTTP handler for the Prometheus metrics endpoint.
pub async fn metrics_handler(
    _req: Request<Body>,
    registry: Arc<Mutex<Registry>>,
) -> Result<Response<Body>, hyper::Error> {
    let response = match encode_registry(&registry) {
        Ok(buffer) => {
            let mut response = Response::new(Body::from(buffer));
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            let mut response = Response::new(Body::from("failed to encode metrics"));
            *response.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    };

    Ok(response)
}

/// Starts the Prometheus metrics HTTP server.
pub async fn start_metrics_server(port: u16, registry: Arc<Mutex<Registry>>) {
    let addr = ([0, 0, 0, 0], port).into();

    let make_svc = make_service_fn(move |_conn| {
        let registry_clone = registry.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                let registry_clone_inner = registry_clone.clone();
                async move { metrics_handler(req, registry_clone_inner).await }
            }))
        }
    });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(make_svc),
        Err(e) => {
            error!(port = port, error = %e, "Failed to bind metrics server");
            return;
        }
    };
    info!(
        port = port,
        addr = %addr,
        "Metrics server listening"
    );

    if let Err(e) = server.await {
        error!(error = %e, "Metrics server error");
    }
}

/// Gathers and encodes metrics as a string for final output.
pub fn gather_metrics_string(registry: &Arc<Mutex<Registry>>) -> String {
    match encode_registry(registry) {
        Ok(buffer) => String::from_utf8(buffer).unwrap_or_else(|e| {
            error!(error = %e, "Error encoding metrics to UTF-8");
            String::from("# ERROR ENCODING METRICS TO UTF-8")
        }),
        Err(e) => {
            error!(error = %e, "Error encoding metrics");
            String::from("# ERROR ENCODING METRICS")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_status_codes_have_labels() {
        assert_eq!(status_code_label(200), "200");
        assert_eq!(status_code_label(503), "503");
        assert_eq!(status_code_label(418), "other");
    }

    #[test]
    fn gathered_output_contains_registered_metrics() {
        let registry = Registry::new();
        registry
            .register(Box::new(UNITS_LAUNCHED_TOTAL.clone()))
            .unwrap();
        UNITS_LAUNCHED_TOTAL.inc();

        let registry = Arc::new(Mutex::new(registry));
        let output = gather_metrics_string(&registry);
        assert!(output.contains("units_launched_total"), "output: {}", output);
    }

    #[tokio::test]
    async fn handler_serves_text_format() {
        let registry = Registry::new();
        registry
            .register(Box::new(UNITS_COMPLETED_TOTAL.clone()))
            .unwrap();
        let registry = Arc::new(Mutex::new(registry));

        let response = metrics_handler(Request::new(Body::empty()), registry)
            .await
            .unwrap();
        assert_eq!(response.status(), hyper::StatusCode::OK);

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("units_completed_total"));
    }
}
