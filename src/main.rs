use std::env;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use order_loadgen::builder::PayloadBuilder;
use order_loadgen::client::build_client;
use order_loadgen::config::Config;
use order_loadgen::dispatcher::DispatchEngine;
use order_loadgen::metrics::{gather_metrics_string, register_metrics, start_metrics_server};
use order_loadgen::sink::build_sink;

/// Prints helpful configuration documentation.
fn print_config_help() {
    eprintln!("Environment variables (all optional):");
    eprintln!("  TARGET_URL              - Order endpoint (default: http://localhost:8081/order)");
    eprintln!("  ORDER_COUNT             - Number of orders to send (default: 10000)");
    eprintln!("  LAUNCH_DELAY            - Delay between launches: 20ms, 1s (default: 20ms)");
    eprintln!("  PACING                  - fixed or scheduled (default: fixed)");
    eprintln!("  REQUEST_TIMEOUT         - Per-request timeout (default: 30s)");
    eprintln!("  TEMPLATE_FILE           - JSON order template (default: built-in order)");
    eprintln!("  OUTPUT                  - console or tracing (default: console)");
    eprintln!("  CONFIG_FILE             - YAML file with the same settings");
    eprintln!();
    eprintln!("Advanced configuration:");
    eprintln!("  CUSTOM_HEADERS          - Comma-separated headers (use \\, for literal commas)");
    eprintln!("  RESOLVE_TARGET_ADDR     - DNS override: hostname:ip:port");
    eprintln!("  SKIP_TLS_VERIFY         - Skip TLS certificate verification (default: false)");
    eprintln!("  METRICS_PORT            - Serve Prometheus metrics on this port");
    eprintln!("  METRIC_NAMESPACE        - Prometheus metric namespace (default: order_loadgen)");
    eprintln!("  RUST_LOG, LOG_FORMAT    - Log filter (default: info) and format (text or json)");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    register_metrics()?;

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}\n", e);
            print_config_help();
            std::process::exit(1);
        }
    };

    let template = config.load_template()?;
    let client_result = build_client(&config.to_client_config())?;
    config.print_summary(&client_result.parsed_headers);

    let registry_arc = Arc::new(Mutex::new(prometheus::default_registry().clone()));
    if let Some(port) = config.metrics_port {
        let registry = registry_arc.clone();
        tokio::spawn(async move {
            start_metrics_server(port, registry).await;
        });
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Interrupt received, cancelling dispatch");
                    cancel.cancel();
                }
                Err(e) => error!(error = %e, "Failed to listen for interrupt signal"),
            }
        });
    }

    let engine = DispatchEngine::new(
        client_result.client,
        PayloadBuilder::new(template),
        config.to_dispatch_config(),
        build_sink(config.output),
    );
    let summary = engine.run_until_cancelled(cancel).await;

    println!("\n{}", summary);
    if config.metrics_port.is_some() {
        info!("Collecting final metrics");
        println!("--- FINAL METRICS ---\n{}", gather_metrics_string(&registry_arc));
        println!("--- END OF FINAL METRICS ---");
    }

    Ok(())
}
