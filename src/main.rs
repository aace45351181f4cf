use anyhow::Context;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use vecstored::config::Config;
use vecstored::service::{QueryService, RequestLimits};
use vecstored::vector::{StoreSettings, VectorStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = log_filter_from_args();
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let settings = StoreSettings::from_config(&config);
    let store = match &config.data_dir {
        Some(dir) => {
            ensure_data_dir(dir)?;
            let abs_path = fs::canonicalize(dir)?;
            tracing::info!(data_dir = %abs_path.display(), "persistence enabled");
            VectorStore::open_with_settings(dir, &config.collection, config.metric, settings)
                .context("open vector store")?
        }
        None => {
            tracing::warn!("no data directory configured, records will not survive restart");
            VectorStore::with_settings(&config.collection, config.metric, settings)
        }
    };

    let service = QueryService::new(store, RequestLimits::from_config(&config));
    let app = vecstored::api::router(service, &config);
    let addr = SocketAddr::new(config.bind_addr, config.port);

    tracing::info!(%addr, collection = %config.collection, metric = %config.metric, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

fn ensure_data_dir(path: &str) -> anyhow::Result<()> {
    let p = Path::new(path);
    if !p.exists() {
        fs::create_dir_all(p)?;
    } else if !p.is_dir() {
        anyhow::bail!("DATA_DIR exists but is not a directory: {}", p.display());
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received ctrl-c, shutting down");
        },
        _ = terminate => {
            tracing::info!("received terminate signal, shutting down");
        },
    }
}

fn log_filter_from_args() -> EnvFilter {
    if let Some(level) = parse_log_arg() {
        return EnvFilter::new(level);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn parse_log_arg() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--logs" {
            let Some(raw) = args.next() else {
                eprintln!("`--logs` takes a value (info|warning|error|critical), using `info`");
                return Some("info".to_string());
            };
            if let Some(level) = map_log_level(&raw) {
                return Some(level.to_string());
            }
            eprintln!(
                "unknown log level `{raw}`, expected one of info, warning, error, critical; using `info`"
            );
            return Some("info".to_string());
        }
    }
    None
}

fn map_log_level(raw: &str) -> Option<&'static str> {
    match raw.to_ascii_lowercase().as_str() {
        "info" => Some("info"),
        "warning" | "warn" => Some("warn"),
        "error" => Some("error"),
        "critical" => Some("error"),
        _ => None,
    }
}
