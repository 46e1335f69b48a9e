//! Optional periodic logging of the full ledger report.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ledger::{Ledger, LedgerSnapshot};
use crate::presenter;

/// Remembers the last logged snapshot so unchanged state is not repeated.
#[derive(Default)]
pub struct ChangeTracker {
    last: Option<LedgerSnapshot>,
}

impl ChangeTracker {
    /// Returns true when `snapshot` differs from the previously seen one.
    pub fn observe(&mut self, snapshot: &LedgerSnapshot) -> bool {
        if self.last.as_ref() == Some(snapshot) {
            return false;
        }
        self.last = Some(snapshot.clone());
        true
    }
}

/// Logs the full report every `interval` while something changed since the
/// previous tick. The first tick always reports.
pub fn spawn(ledger: Arc<Ledger>, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
    spawn_with_sink(ledger, interval, token, |report| {
        info!("Ledger report:\n{}", report);
    })
}

fn spawn_with_sink<F>(
    ledger: Arc<Ledger>,
    interval: Duration,
    token: CancellationToken,
    mut sink: F,
) -> JoinHandle<()>
where
    F: FnMut(String) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut tracker = ChangeTracker::default();
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match next_report(&mut tracker, &ledger) {
                Some(report) => sink(report),
                None => debug!("Balance and rates unchanged, report skipped"),
            }
        }
        debug!("Reporter stopped");
    })
}

fn next_report(tracker: &mut ChangeTracker, ledger: &Ledger) -> Option<String> {
    let snapshot = ledger.snapshot();
    tracker
        .observe(&snapshot)
        .then(|| presenter::full_report(&snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(usd: f64, rate: f64) -> LedgerSnapshot {
        LedgerSnapshot {
            balances: vec![("USD".to_string(), usd), ("RUB".to_string(), 0.0)],
            rates: vec![("USD".to_string(), rate)],
        }
    }

    #[test]
    fn test_change_tracker() {
        let mut tracker = ChangeTracker::default();
        assert!(tracker.observe(&snapshot(1.0, 90.0)));
        assert!(!tracker.observe(&snapshot(1.0, 90.0)));
        assert!(tracker.observe(&snapshot(2.0, 90.0)));
        assert!(tracker.observe(&snapshot(2.0, 91.0)));
        assert!(!tracker.observe(&snapshot(2.0, 91.0)));
    }

    fn ledger() -> Arc<Ledger> {
        Arc::new(
            Ledger::new(
                vec![("USD".to_string(), 1.0), ("RUB".to_string(), 10.0)],
                None,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_next_report_only_on_change() {
        let ledger = ledger();
        let mut tracker = ChangeTracker::default();

        let first = next_report(&mut tracker, &ledger).expect("First tick should report");
        assert_eq!(first, presenter::full_report(&ledger.snapshot()));
        assert_eq!(next_report(&mut tracker, &ledger), None);

        ledger.modify_balances(&[("usd".to_string(), 1.0)]).unwrap();
        let after = next_report(&mut tracker, &ledger).expect("Change should report");
        assert!(after.starts_with("USD:2\n"));
        assert_eq!(next_report(&mut tracker, &ledger), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_skips_unchanged_ticks() {
        let ledger = ledger();
        let token = CancellationToken::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let task = spawn_with_sink(
            Arc::clone(&ledger),
            Duration::from_secs(60),
            token.clone(),
            move |report| {
                let _ = tx.send(report);
            },
        );

        // Ticks at 0s, 60s and 120s; only the first one reports.
        tokio::time::sleep(Duration::from_secs(150)).await;
        let first = rx.try_recv().expect("First tick should report");
        assert!(first.starts_with("USD:1\nRUB:10\n"));
        assert!(rx.try_recv().is_err());

        ledger.set_rate("USD", 90.0).unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        let changed = rx.try_recv().expect("Changed rates should report");
        assert!(changed.contains("RUB-USD:90"));
        assert!(rx.try_recv().is_err());

        token.cancel();
        task.await.unwrap();
        assert_eq!(Arc::strong_count(&ledger), 1);
    }
}
