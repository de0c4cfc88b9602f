//! mssql-exporterd - Prometheus exporter for Microsoft SQL Server.
//!
//! Serves instance telemetry over HTTP: each inbound scrape opens one
//! connection to the monitored instance, fans out to the enabled scrape units
//! under a shared deadline, and renders the collected samples in the
//! Prometheus text format.

mod config;
mod metrics;
mod render;

use std::collections::HashSet;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use clap::Parser;
use tokio::time::Instant;
use tracing::{error, info, warn};

use mssql_exporter_core::{BufferSink, Exporter};

use metrics::SelfMetrics;

/// Units that stay off unless enabled explicitly.
const DISABLED_BY_DEFAULT: &[&str] = &["mssql_sql_stat"];

/// Prometheus exporter for Microsoft SQL Server.
#[derive(Parser)]
#[command(name = "mssql-exporterd", about = "SQL Server Prometheus exporter", version = mssql_exporter_core::VERSION)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:9206", env = "MSSQL_EXPORTER_LISTEN")]
    listen: String,

    /// Path under which to expose metrics.
    #[arg(long, default_value = "/metrics", env = "MSSQL_EXPORTER_METRICS_PATH")]
    metrics_path: String,

    /// Path to the TOML config file with connection settings.
    #[arg(long, default_value = "mssql-exporter.toml", env = "MSSQL_EXPORTER_CONFIG")]
    config: PathBuf,

    /// Offset in seconds subtracted from the Prometheus scrape timeout header.
    #[arg(long, default_value = "0.25")]
    timeout_offset: f64,

    /// Scrape deadline in seconds when Prometheus sends no timeout header.
    #[arg(long, default_value = "10")]
    scrape_timeout: f64,

    /// Comma-separated unit names to enable on top of the defaults.
    #[arg(long, value_delimiter = ',')]
    enable: Vec<String>,

    /// Comma-separated unit names to disable.
    #[arg(long, value_delimiter = ',')]
    disable: Vec<String>,
}

struct App {
    exporter: Exporter,
    metrics: SelfMetrics,
    enabled: HashSet<String>,
    metrics_path: String,
    timeout_offset: f64,
    scrape_timeout: f64,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mssql_exporterd=info,mssql_exporter_core=info".parse().unwrap()),
        )
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async_main(args));
}

async fn async_main(args: Args) {
    let cfg = match config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(path = %args.config.display(), error = %e, "cannot load configuration");
            process::exit(1);
        }
    };

    let exporter = Exporter::new(cfg.database);
    let enabled = resolve_enabled(&exporter, &args.enable, &args.disable);
    for name in &enabled {
        info!(unit = %name, "unit enabled");
    }

    let app = Arc::new(App {
        exporter,
        metrics: SelfMetrics::new(),
        enabled,
        metrics_path: args.metrics_path.clone(),
        timeout_offset: args.timeout_offset,
        scrape_timeout: args.scrape_timeout,
    });

    let router = Router::new()
        .route("/", get(handle_landing))
        .route(&args.metrics_path, get(handle_metrics))
        .with_state(app);

    info!(version = mssql_exporter_core::VERSION, listen = %args.listen, path = %args.metrics_path, "listening");
    let listener = match tokio::net::TcpListener::bind(&args.listen).await {
        Ok(l) => l,
        Err(e) => {
            error!(listen = %args.listen, error = %e, "cannot bind listen address");
            process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, router).await {
        error!(error = %e, "http server terminated");
        process::exit(1);
    }
}

/// The configured unit set: defaults plus `--enable` minus `--disable`.
fn resolve_enabled(exporter: &Exporter, enable: &[String], disable: &[String]) -> HashSet<String> {
    let mut enabled: HashSet<String> = exporter
        .units()
        .iter()
        .map(|u| u.name().to_string())
        .filter(|n| !DISABLED_BY_DEFAULT.contains(&n.as_str()))
        .collect();
    let known: HashSet<&str> = exporter.units().iter().map(|u| u.name()).collect();
    for name in enable {
        if known.contains(name.as_str()) {
            enabled.insert(name.clone());
        } else {
            warn!(unit = %name, "unknown unit in --enable, ignoring");
        }
    }
    for name in disable {
        enabled.remove(name);
    }
    enabled
}

/// Deadline for this scrape: the Prometheus timeout header minus the offset,
/// or the configured fallback when the header is missing or malformed.
fn scrape_deadline(app: &App, headers: &HeaderMap) -> Instant {
    let mut seconds = app.scrape_timeout;
    if let Some(value) = headers.get("X-Prometheus-Scrape-Timeout-Seconds") {
        match value
            .to_str()
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|s| s.is_finite() && *s > 0.0)
        {
            Some(header_seconds) => {
                if app.timeout_offset >= header_seconds {
                    warn!(
                        offset = app.timeout_offset,
                        prometheus_scrape_timeout = header_seconds,
                        "timeout offset leaves no time to scrape, ignoring it"
                    );
                    seconds = header_seconds;
                } else {
                    seconds = header_seconds - app.timeout_offset;
                }
            }
            None => {
                warn!("unusable X-Prometheus-Scrape-Timeout-Seconds header, using fallback");
            }
        }
    }
    Instant::now() + Duration::from_secs_f64(seconds)
}

/// `collect[]` query parameters narrow the enabled set for one request.
fn requested_units(app: &App, query: Option<&str>) -> HashSet<String> {
    let filters: Vec<&str> = query
        .unwrap_or("")
        .split('&')
        .filter_map(|pair| {
            pair.strip_prefix("collect[]=")
                .or_else(|| pair.strip_prefix("collect%5B%5D="))
        })
        .collect();
    if filters.is_empty() {
        return app.enabled.clone();
    }
    filters
        .into_iter()
        .filter(|f| app.enabled.contains(*f))
        .map(str::to_string)
        .collect()
}

async fn handle_metrics(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
    uri: axum::http::Uri,
) -> impl IntoResponse {
    let deadline = scrape_deadline(&app, &headers);
    let enabled = requested_units(&app, uri.query());

    let sink = Arc::new(BufferSink::new());
    let summary = app.exporter.scrape(deadline, &enabled, sink.clone()).await;

    app.metrics.scrapes_total.inc();
    app.metrics.up.set(if summary.up { 1 } else { 0 });
    let failed = !summary.up || !summary.failures.is_empty();
    app.metrics.last_scrape_error.set(if failed { 1.0 } else { 0.0 });
    for (unit, _) in &summary.failures {
        app.metrics.scrape_errors.with_label_values(&[unit]).inc();
    }

    let body = render::render(sink.take(), &app.metrics.registry);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, render::CONTENT_TYPE)],
        body,
    )
}

async fn handle_landing(State(app): State<Arc<App>>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>SQL Server exporter</title></head>\n<body>\n\
         <h1>SQL Server exporter</h1>\n<p><a href='{}'>Metrics</a></p>\n</body>\n</html>\n",
        app.metrics_path
    ))
}
