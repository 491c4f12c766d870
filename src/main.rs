//! Opportunity aggregator service entrypoint.
//! Boots the Axum HTTP server with both scraping pipelines and the Prometheus exporter.

use opportunity_aggregator::{build_state, config::AppConfig, metrics::Metrics, router};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `LOG_FORMAT=json` switches to JSON lines; otherwise compact text.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("opportunity_aggregator=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        // the runtime already installed a subscriber
        tracing::debug!("tracing subscriber already set");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    let state = build_state(&cfg)?;

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics exporter disabled");
            None
        }
    };

    tracing::info!(
        jobs = ?state.jobs.adapter_names(),
        hackathons = ?state.hackathons.adapter_names(),
        "pipelines registered"
    );
    Ok(router(state, metrics.as_ref()).into())
}
