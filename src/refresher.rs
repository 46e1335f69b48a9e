//! Background task keeping the ledger's exchange rates fresh.
//!
//! The refresher polls a [`RateProvider`] every period and writes the result
//! into the [`Ledger`]. A failed cycle is logged and retried after the next
//! sleep; it never stops the loop. Cancellation is checked at every suspension
//! point and once more right after a fetch returns, so a result that arrives
//! after the task has observed cancellation is dropped. A commit that already
//! passed that check may still land while cancellation is being signalled;
//! [`RefresherHandle::shutdown`] joins the task, so nothing is written after it
//! returns.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::rates::RateProvider;
use crate::ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherState {
    Idle,
    Fetching,
    Sleeping,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshStatus {
    pub state: RefresherState,
    /// Completed fetch cycles, successful or not.
    pub attempts: u64,
    pub failures: u64,
    pub last_success: Option<DateTime<Utc>>,
}

impl Default for RefreshStatus {
    fn default() -> Self {
        RefreshStatus {
            state: RefresherState::Idle,
            attempts: 0,
            failures: 0,
            last_success: None,
        }
    }
}

pub struct RateRefresher {
    ledger: Arc<Ledger>,
    provider: Arc<dyn RateProvider>,
    period: Duration,
    fetch_on_start: bool,
}

/// Owner side of a running refresher.
pub struct RefresherHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    status: watch::Receiver<RefreshStatus>,
}

impl RefresherHandle {
    pub fn status(&self) -> RefreshStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshStatus> {
        self.status.clone()
    }

    /// Signals cancellation and waits for the task to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.token.cancel();
        self.task.await.context("Rate refresher task failed")?;
        Ok(())
    }
}

enum Cycle {
    Completed,
    Cancelled,
}

impl RateRefresher {
    pub fn new(
        ledger: Arc<Ledger>,
        provider: Arc<dyn RateProvider>,
        period: Duration,
        fetch_on_start: bool,
    ) -> Self {
        RateRefresher {
            ledger,
            provider,
            period,
            fetch_on_start,
        }
    }

    /// Starts the refresh loop on the runtime. The task stops when `token` is
    /// cancelled, either directly or through [`RefresherHandle::shutdown`].
    pub fn spawn(self, token: CancellationToken) -> RefresherHandle {
        let (status_tx, status_rx) = watch::channel(RefreshStatus::default());
        let task = tokio::spawn(self.run(token.clone(), status_tx));
        RefresherHandle {
            token,
            task,
            status: status_rx,
        }
    }

    async fn run(self, token: CancellationToken, status: watch::Sender<RefreshStatus>) {
        info!(period = ?self.period, fetch_on_start = self.fetch_on_start, "Rate refresher started");

        let mut fetch_now = self.fetch_on_start;
        loop {
            if fetch_now {
                if let Cycle::Cancelled = self.refresh_once(&token, &status).await {
                    break;
                }
            }
            fetch_now = true;

            set_state(&status, RefresherState::Sleeping);
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.period) => {}
            }
        }

        set_state(&status, RefresherState::Cancelled);
        info!("Rate refresher stopped");
    }

    async fn refresh_once(
        &self,
        token: &CancellationToken,
        status: &watch::Sender<RefreshStatus>,
    ) -> Cycle {
        set_state(status, RefresherState::Fetching);
        let codes = self.ledger.rate_codes();
        debug!(?codes, "Fetching currency rates...");

        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Rate fetch abandoned on cancellation");
                return Cycle::Cancelled;
            }
            fetched = self.provider.fetch_rates(&codes) => fetched,
        };

        if token.is_cancelled() {
            debug!("Discarding rates fetched after cancellation");
            return Cycle::Cancelled;
        }

        let outcome = fetched.and_then(|rates| {
            let rates = select_requested(&codes, rates)?;
            self.ledger.set_rates(&rates)?;
            Ok(rates)
        });

        status.send_modify(|s| {
            s.attempts += 1;
            match &outcome {
                Ok(_) => s.last_success = Some(Utc::now()),
                Err(_) => s.failures += 1,
            }
        });

        match outcome {
            Ok(rates) => info!(?rates, "Currency rates fetch successful"),
            Err(e) => warn!(error = %e, "Currency rates fetch failed, keeping previous rates"),
        }
        Cycle::Completed
    }
}

/// Keeps exactly the requested codes, in request order; a response missing one
/// of them fails the whole cycle.
fn select_requested(codes: &[String], mut rates: HashMap<String, f64>) -> Result<Vec<(String, f64)>> {
    codes
        .iter()
        .map(|code| {
            rates
                .remove(code)
                .map(|rate| (code.clone(), rate))
                .ok_or_else(|| anyhow!("Provider response is missing currency: {}", code))
        })
        .collect()
}

fn set_state(status: &watch::Sender<RefreshStatus>, state: RefresherState) {
    status.send_modify(|s| s.state = state);
}
