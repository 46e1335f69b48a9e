//! In-memory multi-currency cash ledger.
//!
//! Holds the balance per currency and the rate of every non-base currency
//! against [`BASE_CURRENCY`]. The set of currencies is fixed when the ledger is
//! built; only amounts and rates change afterwards.
//!
//! Batch updates take `(code, value)` pairs and apply them in the order given,
//! so a code repeated in different cases resolves to the last occurrence.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::core::error::{LedgerError, Result};

/// The currency every rate is expressed in. Its own rate is always 1.
pub const BASE_CURRENCY: &str = "RUB";

/// Three ASCII letters, in any case.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

fn normalize(code: &str) -> String {
    code.to_uppercase()
}

/// A consistent copy of both ledger maps, in construction order.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    pub balances: Vec<(String, f64)>,
    /// Non-base currencies only.
    pub rates: Vec<(String, f64)>,
}

impl LedgerSnapshot {
    pub fn rate_of(&self, code: &str) -> Option<f64> {
        self.rates.iter().find(|(c, _)| c == code).map(|(_, r)| *r)
    }
}

pub struct Ledger {
    balances: RwLock<Vec<(String, f64)>>,
    rates: RwLock<Vec<(String, f64)>>,
}

// A panic while holding a guard cannot leave a half-written entry behind, so a
// poisoned lock still holds usable data.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn position(entries: &[(String, f64)], code: &str) -> Option<usize> {
    entries.iter().position(|(c, _)| c == code)
}

/// Resolves every code of `batch` to an index into `entries`, keeping the
/// batch order and failing on the first unknown code. Nothing is mutated here.
fn resolve_batch(entries: &[(String, f64)], batch: &[(String, f64)]) -> Result<Vec<(usize, f64)>> {
    batch
        .iter()
        .map(|(code, value)| {
            let code = normalize(code);
            position(entries, &code)
                .map(|idx| (idx, *value))
                .ok_or(LedgerError::UnknownCurrency(code))
        })
        .collect()
}

fn check_rate(code: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidRate {
            code: code.to_string(),
            value,
        })
    }
}

impl Ledger {
    /// Builds a ledger from the starting balances (in display order) and an
    /// optional initial rate snapshot. Rates not in the snapshot start at 0,
    /// meaning unknown.
    pub fn new(
        balances: Vec<(String, f64)>,
        initial_rates: Option<&[(String, f64)]>,
    ) -> Result<Self> {
        let mut normalized: Vec<(String, f64)> = Vec::with_capacity(balances.len());
        for (code, amount) in balances {
            if !is_valid_code(&code) {
                return Err(LedgerError::InvalidCurrencyCode(code));
            }
            let code = normalize(&code);
            if position(&normalized, &code).is_some() {
                return Err(LedgerError::DuplicateCurrency(code));
            }
            normalized.push((code, amount));
        }
        if position(&normalized, BASE_CURRENCY).is_none() {
            return Err(LedgerError::MissingBaseCurrency(BASE_CURRENCY.to_string()));
        }

        let mut rates: Vec<(String, f64)> = normalized
            .iter()
            .filter(|(code, _)| code != BASE_CURRENCY)
            .map(|(code, _)| (code.clone(), 0.0))
            .collect();

        if let Some(initial) = initial_rates {
            let resolved = resolve_batch(&rates, initial)?;
            for (idx, value) in resolved {
                check_rate(&rates[idx].0, value)?;
                rates[idx].1 = value;
            }
        }

        debug!(currencies = normalized.len(), "Ledger created");
        Ok(Ledger {
            balances: RwLock::new(normalized),
            rates: RwLock::new(rates),
        })
    }

    pub fn balance_of(&self, code: &str) -> Result<f64> {
        let code = normalize(code);
        let balances = read(&self.balances);
        position(&balances, &code)
            .map(|idx| balances[idx].1)
            .ok_or(LedgerError::UnknownCurrency(code))
    }

    /// Overwrites the balance of every currency in `updates`. Rejects the whole
    /// batch if any code is unknown.
    pub fn set_balances(&self, updates: &[(String, f64)]) -> Result<()> {
        let mut balances = write(&self.balances);
        let resolved = resolve_batch(&balances, updates)?;
        for (idx, amount) in resolved {
            balances[idx].1 = amount;
        }
        debug!(count = updates.len(), "Balances set");
        Ok(())
    }

    /// Adds each delta to the current balance. Rejects the whole batch if any
    /// code is unknown.
    pub fn modify_balances(&self, deltas: &[(String, f64)]) -> Result<()> {
        let mut balances = write(&self.balances);
        let resolved = resolve_batch(&balances, deltas)?;
        for (idx, delta) in resolved {
            balances[idx].1 += delta;
        }
        debug!(count = deltas.len(), "Balances modified");
        Ok(())
    }

    pub fn rate_of(&self, code: &str) -> Result<f64> {
        let code = normalize(code);
        let rates = read(&self.rates);
        position(&rates, &code)
            .map(|idx| rates[idx].1)
            .ok_or(LedgerError::UnknownCurrency(code))
    }

    pub fn set_rate(&self, code: &str, value: f64) -> Result<()> {
        let code = normalize(code);
        check_rate(&code, value)?;
        let mut rates = write(&self.rates);
        let idx = position(&rates, &code).ok_or(LedgerError::UnknownCurrency(code))?;
        rates[idx].1 = value;
        Ok(())
    }

    /// Replaces several rates at once; either all of them are applied or none.
    pub fn set_rates(&self, updates: &[(String, f64)]) -> Result<()> {
        let mut rates = write(&self.rates);
        let resolved = resolve_batch(&rates, updates)?;
        for &(idx, value) in &resolved {
            check_rate(&rates[idx].0, value)?;
        }
        for (idx, value) in resolved {
            rates[idx].1 = value;
        }
        Ok(())
    }

    /// Codes that carry a rate, in construction order.
    pub fn rate_codes(&self) -> Vec<String> {
        read(&self.rates).iter().map(|(code, _)| code.clone()).collect()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        // Always balances first, then rates.
        let balances = read(&self.balances);
        let rates = read(&self.rates);
        LedgerSnapshot {
            balances: balances.clone(),
            rates: rates.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn batch(entries: &[(&str, f64)]) -> Vec<(String, f64)> {
        entries.iter().map(|(c, v)| (c.to_string(), *v)).collect()
    }

    fn ledger(usd: f64, eur: f64, rub: f64) -> Ledger {
        Ledger::new(
            vec![
                ("USD".to_string(), usd),
                ("EUR".to_string(), eur),
                ("RUB".to_string(), rub),
            ],
            None,
        )
        .unwrap()
    }

    fn balances(ledger: &Ledger) -> Vec<(String, f64)> {
        ledger.snapshot().balances
    }

    #[test]
    fn test_balance_of_any_case() {
        let ledger = ledger(1.0, 2.0, 3.0);
        assert_eq!(ledger.balance_of("USD"), Ok(1.0));
        assert_eq!(ledger.balance_of("eur"), Ok(2.0));
        assert_eq!(ledger.balance_of("rUb"), Ok(3.0));
        assert_eq!(
            ledger.balance_of("gbp"),
            Err(LedgerError::UnknownCurrency("GBP".to_string()))
        );
    }

    #[test]
    fn test_set_balances_normalizes_case() {
        let ledger = ledger(0.0, 10.0, 20.0);
        ledger.set_balances(&batch(&[("usd", 5.5), ("Eur", -1.0)])).unwrap();
        assert_eq!(ledger.balance_of("USD"), Ok(5.5));
        assert_eq!(ledger.balance_of("EUR"), Ok(-1.0));
        assert_eq!(ledger.balance_of("RUB"), Ok(20.0));
    }

    #[test]
    fn test_set_balances_unknown_key_changes_nothing() {
        let ledger = ledger(0.0, 10.0, 20.0);
        let before = balances(&ledger);
        let result = ledger.set_balances(&batch(&[("usd", 5.0), ("zzz", 1.0)]));
        assert_eq!(result, Err(LedgerError::UnknownCurrency("ZZZ".to_string())));
        assert_eq!(balances(&ledger), before);
    }

    #[test]
    fn test_modify_balances() {
        let ledger = ledger(0.0, 10.0, 20.0);
        ledger.modify_balances(&batch(&[("rub", 10.0), ("eur", -10.0)])).unwrap();
        assert_eq!(
            balances(&ledger),
            vec![
                ("USD".to_string(), 0.0),
                ("EUR".to_string(), 0.0),
                ("RUB".to_string(), 30.0)
            ]
        );
    }

    #[test]
    fn test_modify_balances_unknown_key_changes_nothing() {
        let ledger = ledger(0.0, 10.0, 20.0);
        let before = balances(&ledger);
        assert!(ledger.modify_balances(&batch(&[("rub", 10.0), ("zzz", 5.0)])).is_err());
        assert_eq!(balances(&ledger), before);
    }

    #[test]
    fn test_repeated_code_last_one_wins() {
        let ledger = ledger(0.0, 0.0, 0.0);
        ledger.set_balances(&batch(&[("usd", 1.0), ("USD", 2.0)])).unwrap();
        assert_eq!(ledger.balance_of("USD"), Ok(2.0));
        ledger.set_balances(&batch(&[("USD", 2.0), ("usd", 1.0)])).unwrap();
        assert_eq!(ledger.balance_of("USD"), Ok(1.0));

        // Deltas accumulate
        ledger.modify_balances(&batch(&[("eur", 1.0), ("EUR", 2.0)])).unwrap();
        assert_eq!(ledger.balance_of("EUR"), Ok(3.0));
    }

    #[test]
    fn test_snapshot_never_sees_half_applied_balances() {
        let ledger = ledger(0.0, 0.0, 0.0);
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                for i in 1..=5_000 {
                    let amount = i as f64;
                    ledger
                        .set_balances(&batch(&[("usd", amount), ("eur", amount)]))
                        .unwrap();
                }
                done.store(true, Ordering::SeqCst);
            });
            for _ in 0..2 {
                scope.spawn(|| {
                    while !done.load(Ordering::SeqCst) {
                        let snapshot = ledger.snapshot();
                        assert_eq!(snapshot.balances[0].1, snapshot.balances[1].1);
                    }
                });
            }
        });
        assert_eq!(ledger.balance_of("EUR"), Ok(5_000.0));
    }

    #[test]
    fn test_snapshot_never_sees_half_applied_rates() {
        let ledger = ledger(0.0, 0.0, 0.0);
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                for i in 1..=5_000 {
                    let rate = i as f64;
                    ledger.set_rates(&batch(&[("USD", rate), ("EUR", rate)])).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            });
            scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    let snapshot = ledger.snapshot();
                    assert_eq!(snapshot.rate_of("USD"), snapshot.rate_of("EUR"));
                }
            });
        });
        assert_eq!(ledger.rate_of("USD"), Ok(5_000.0));
    }

    #[test]
    fn test_rates_exclude_base_currency() {
        let ledger = ledger(0.0, 0.0, 0.0);
        assert_eq!(ledger.rate_codes(), vec!["USD", "EUR"]);
        assert_eq!(ledger.rate_of("usd"), Ok(0.0));
        assert!(matches!(
            ledger.rate_of("RUB"),
            Err(LedgerError::UnknownCurrency(_))
        ));
        assert!(ledger.set_rate("RUB", 1.0).is_err());
    }

    #[test]
    fn test_set_rate_validation() {
        let ledger = ledger(0.0, 0.0, 0.0);
        ledger.set_rate("usd", 92.5).unwrap();
        assert_eq!(ledger.rate_of("USD"), Ok(92.5));
        assert!(matches!(
            ledger.set_rate("USD", -1.0),
            Err(LedgerError::InvalidRate { .. })
        ));
        assert!(ledger.set_rate("USD", f64::NAN).is_err());
        assert_eq!(ledger.rate_of("USD"), Ok(92.5));
    }

    #[test]
    fn test_set_rates_is_all_or_nothing() {
        let ledger = ledger(0.0, 0.0, 0.0);
        ledger.set_rates(&batch(&[("USD", 2.0), ("EUR", 3.0)])).unwrap();

        assert!(ledger.set_rates(&batch(&[("USD", 5.0), ("GBP", 1.0)])).is_err());
        assert!(ledger.set_rates(&batch(&[("USD", 5.0), ("EUR", -3.0)])).is_err());
        assert_eq!(
            ledger.snapshot().rates,
            vec![("USD".to_string(), 2.0), ("EUR".to_string(), 3.0)]
        );
    }

    #[test]
    fn test_new_with_initial_rates() {
        let ledger = Ledger::new(
            vec![("usd".to_string(), 1.0), ("RUB".to_string(), 1.0)],
            Some(&batch(&[("usd", 90.0)])),
        )
        .unwrap();
        assert_eq!(ledger.rate_of("USD"), Ok(90.0));

        let err = Ledger::new(
            vec![("USD".to_string(), 1.0), ("RUB".to_string(), 1.0)],
            Some(&batch(&[("RUB", 1.0)])),
        );
        assert!(matches!(err, Err(LedgerError::UnknownCurrency(_))));
    }

    #[test]
    fn test_new_rejects_invalid_balances() {
        let missing_base = Ledger::new(vec![("USD".to_string(), 0.0)], None);
        assert_eq!(
            missing_base.err(),
            Some(LedgerError::MissingBaseCurrency("RUB".to_string()))
        );

        let duplicate = Ledger::new(
            vec![
                ("usd".to_string(), 0.0),
                ("USD".to_string(), 0.0),
                ("RUB".to_string(), 0.0),
            ],
            None,
        );
        assert_eq!(
            duplicate.err(),
            Some(LedgerError::DuplicateCurrency("USD".to_string()))
        );

        let invalid = Ledger::new(vec![("RUBLE".to_string(), 0.0)], None);
        assert!(matches!(
            invalid,
            Err(LedgerError::InvalidCurrencyCode(_))
        ));
    }
}
