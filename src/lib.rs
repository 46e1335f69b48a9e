pub mod api;
pub mod core;
pub mod ledger;
pub mod presenter;
pub mod providers;
pub mod refresher;
pub mod reporter;

pub use crate::core::config;

use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::AppState;
use crate::config::AppConfig;
use crate::core::rates::RateProvider;
use crate::ledger::Ledger;
use crate::refresher::{RateRefresher, RefreshStatus, RefresherHandle};

/// A running ledger with its background tasks.
pub struct Service {
    ledger: Arc<Ledger>,
    token: CancellationToken,
    refresher: RefresherHandle,
    reporter: Option<JoinHandle<()>>,
}

impl Service {
    /// Builds the ledger from `config` and starts the background tasks using
    /// the configured remote rate provider.
    pub fn start(config: &AppConfig) -> Result<Self> {
        let provider = providers::CbrRateProvider::new(&config.provider)
            .context("Failed to create rate provider")?;
        Self::start_with_provider(config, Arc::new(provider))
    }

    pub fn start_with_provider(config: &AppConfig, provider: Arc<dyn RateProvider>) -> Result<Self> {
        config.validate()?;

        let balances = config
            .balances
            .iter()
            .map(|b| (b.code.clone(), b.amount))
            .collect();
        let ledger = Arc::new(Ledger::new(balances, None).context("Invalid balances")?);
        info!(balances = ?ledger.snapshot().balances, "Balance is set");

        let token = CancellationToken::new();
        let refresher = RateRefresher::new(
            Arc::clone(&ledger),
            provider,
            config.refresh.period(),
            config.refresh.fetch_on_start,
        )
        .spawn(token.child_token());

        let reporter = config.report_interval_secs.map(|secs| {
            reporter::spawn(
                Arc::clone(&ledger),
                Duration::from_secs(secs),
                token.child_token(),
            )
        });

        Ok(Service {
            ledger,
            token,
            refresher,
            reporter,
        })
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }

    pub fn refresh_status(&self) -> watch::Receiver<RefreshStatus> {
        self.refresher.subscribe()
    }

    pub fn router(&self) -> Router {
        api::create_router(AppState {
            ledger: self.ledger(),
        })
    }

    /// Cancels the background tasks and waits for all of them to finish,
    /// even if one failed. Returns the first failure.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down...");
        self.token.cancel();
        let refresher = self.refresher.shutdown().await;
        let reporter = match self.reporter {
            Some(task) => task.await.context("Reporter task failed"),
            None => Ok(()),
        };
        debug!("Background tasks stopped");
        refresher.and(reporter)
    }
}

/// Runs the service until Ctrl-C or SIGTERM.
pub async fn run(config: AppConfig) -> Result<()> {
    debug!("Loaded config: {config:#?}");
    config.validate()?;
    // Bind first so a busy port fails before any background task starts.
    let address = config.server.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    serve(listener, &config, shutdown_signal()).await
}

/// Serves the API on `listener` until `signal` completes, then stops the
/// background tasks.
pub async fn serve<S>(listener: TcpListener, config: &AppConfig, signal: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let service = Service::start(config)?;
    if let Ok(address) = listener.local_addr() {
        info!("Server listening on {}", address);
    }

    let served = axum::serve(listener, service.router())
        .with_graceful_shutdown(signal)
        .await
        .context("Server error");

    let stopped = service.shutdown().await;
    served.and(stopped)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
