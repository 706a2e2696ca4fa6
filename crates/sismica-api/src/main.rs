//! sismica-api - HTTP API server for the seismic document extraction service

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use sismica_core::ServiceConfig;

const DEFAULT_FILTER: &str = "sismica_api=debug,tower_http=debug";
const DEFAULT_LOG_FILE: &str = "sismica-api.log";

/// Log output settings:
///
/// | Variable     | Meaning                                       |
/// |--------------|-----------------------------------------------|
/// | `LOG_FORMAT` | `json` or `text` (default)                    |
/// | `LOG_FILE`   | daily-rotated file instead of stdout          |
/// | `LOG_ANSI`   | force colors on or off; files default to off  |
/// | `RUST_LOG`   | env filter                                    |
#[derive(Debug, Clone, PartialEq)]
struct LogSettings {
    json: bool,
    file: Option<PathBuf>,
    ansi: Option<bool>,
}

impl LogSettings {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            json: lookup("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
            file: lookup("LOG_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            ansi: lookup("LOG_ANSI").map(|v| v == "true" || v == "1"),
        }
    }

    /// Directory and file name for the rolling appender.
    fn file_target(path: &Path) -> (&Path, &str) {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(DEFAULT_LOG_FILE);
        (dir, name)
    }
}

/// Install the global subscriber. Keep the guard alive for the life of the
/// process when logging to a file, or buffered lines are lost.
fn init_tracing(settings: &LogSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (layer, guard) = match settings.file {
        Some(ref path) => {
            let (dir, name) = LogSettings::file_target(path);
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            let layer = if settings.json {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer()
                    .with_ansi(settings.ansi.unwrap_or(false))
                    .with_writer(writer)
                    .boxed()
            };
            (layer, Some(guard))
        }
        None => {
            let layer = if settings.json {
                fmt::layer().json().boxed()
            } else {
                match settings.ansi {
                    Some(ansi) => fmt::layer().with_ansi(ansi).boxed(),
                    None => fmt::layer().boxed(),
                }
            };
            (layer, None)
        }
    };

    tracing_subscriber::registry().with(filter).with(layer).init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_settings = LogSettings::from_lookup(|key| std::env::var(key).ok());
    let _log_guard = init_tracing(&log_settings);
    info!(
        json = log_settings.json,
        log_file = %log_settings
            .file
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(stdout)".into()),
        "Logging initialized"
    );

    let config = ServiceConfig::from_env()?;
    info!(
        project = %config.project,
        region = %config.region,
        variant = %config.variant,
        upsert_strategy = %config.upsert_strategy,
        dataset = %config.dataset,
        "Configuration loaded"
    );

    let state = sismica_api::build_state(&config).await?;
    let app = sismica_api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
