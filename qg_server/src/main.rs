//! SonarQube quality-gate server.
//!
//! Tracks the SonarQube analyses submitted by CI builds and serves their
//! quality-gate status. Results are resolved lazily on read, cached per
//! build and refreshed by SonarQube webhooks.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::trace::TraceLayer;

use qg_server::config::QgConfig;
use qg_server::models::analysis::AnalysisHandle;
use qg_server::routes::{self, api::ProjectInformationJson, QgRouterState};
use qg_server::services::project_resolver::ProjectResolver;
use qg_server::services::transport::ReqwestTransport;

const DEFAULT_PORT: u16 = 9091;

#[derive(Parser)]
#[command(name = "sonar-qg", about = "SonarQube quality-gate server for CI builds")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Server port
        #[arg(short, long, env = "QG_PORT", default_value = "9091")]
        port: u16,
    },
    /// Resolve a single analysis and print the result as JSON
    Resolve {
        /// Installation name
        #[arg(short, long, env = "SONAR_INSTALLATION_NAME", default_value = "default")]
        installation: String,

        /// Server URL recorded for the analysis
        #[arg(long)]
        server_url: Option<String>,

        /// Dashboard URL recorded for the analysis
        #[arg(long)]
        dashboard_url: Option<String>,

        /// Compute Engine task id
        #[arg(long)]
        task_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();
    let config = QgConfig::from_env();
    let installations = Arc::new(
        config
            .load_installations()
            .context("loading SonarQube installations")?,
    );
    let transport = Arc::new(
        ReqwestTransport::new(config.connect_timeout(), config.request_timeout())
            .context("building HTTP client")?,
    );

    let command = cli.command.unwrap_or_else(|| Command::Serve {
        port: std::env::var("QG_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT),
    });

    match command {
        Command::Serve { port } => {
            let state = QgRouterState::new(config, transport, installations);
            serve(state, port).await
        }
        Command::Resolve {
            installation,
            server_url,
            dashboard_url,
            task_id,
        } => {
            let handle = AnalysisHandle {
                installation_name: installation,
                server_url,
                dashboard_url,
                ce_task_id: task_id,
            };
            let resolver = ProjectResolver::new(transport, installations);
            let info = resolver.try_resolve(&handle).await?;
            let json = serde_json::to_string_pretty(&ProjectInformationJson::from(&info))?;
            println!("{json}");
            Ok(())
        }
    }
}

async fn serve(state: QgRouterState, port: u16) -> anyhow::Result<()> {
    let app = routes::qg_router(state).layer(TraceLayer::new_for_http());

    // Initialize metrics
    qg_server::metrics::init_metrics();

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Quality-gate server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
