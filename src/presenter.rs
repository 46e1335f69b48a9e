//! Plain-text rendering of ledger state.
//!
//! Stored values (balances, rates, the base total) render in their shortest
//! form, e.g. `1` or `92.5`. Values derived by division always keep a
//! fractional part (`3.0`), and a division by an unknown (zero) rate yields `0`.

use crate::ledger::{BASE_CURRENCY, LedgerSnapshot};

fn format_quotient(numerator: f64, denominator: f64) -> String {
    if denominator == 0.0 {
        return "0".to_string();
    }
    let value = numerator / denominator;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub fn format_balance(code: &str, amount: f64) -> String {
    format!("{code}:{amount}")
}

pub fn format_balances(snapshot: &LedgerSnapshot) -> String {
    let mut output = String::new();
    for (code, amount) in &snapshot.balances {
        output.push_str(&format_balance(code, *amount));
        output.push('\n');
    }
    output.push('\n');
    output
}

/// Rates between every pair of non-base currencies as `(label, value)`.
///
/// The last remaining currency is taken off the sequence and paired with each
/// currency still ahead of it, labelled `"<taken>-<ahead>"` and valued
/// `rate_taken / rate_ahead`. This repeats until the sequence is exhausted.
pub fn cross_rates(snapshot: &LedgerSnapshot) -> Vec<(String, String)> {
    let mut remaining: Vec<&(String, f64)> = snapshot.rates.iter().collect();
    let mut result = Vec::new();
    while let Some((taken, taken_rate)) = remaining.pop() {
        for (ahead, ahead_rate) in &remaining {
            result.push((
                format!("{taken}-{ahead}"),
                format_quotient(*taken_rate, *ahead_rate),
            ));
        }
    }
    result
}

pub fn format_rates(snapshot: &LedgerSnapshot) -> String {
    let mut output = String::new();
    for (code, rate) in &snapshot.rates {
        output.push_str(&format!("{BASE_CURRENCY}-{code}:{rate}\n"));
    }
    for (label, rate) in cross_rates(snapshot) {
        output.push_str(&format!("{label}:{rate}\n"));
    }
    output.push('\n');
    output
}

/// Total holdings in the base currency.
pub fn total_in_base(snapshot: &LedgerSnapshot) -> f64 {
    snapshot
        .balances
        .iter()
        .map(|(code, amount)| {
            if code == BASE_CURRENCY {
                *amount
            } else {
                amount * snapshot.rate_of(code).unwrap_or(0.0)
            }
        })
        .sum()
}

pub fn format_total(snapshot: &LedgerSnapshot) -> String {
    let total = total_in_base(snapshot);
    let mut parts = vec![format!("{total} {BASE_CURRENCY}")];
    for (code, rate) in &snapshot.rates {
        parts.push(format!("{} {code}", format_quotient(total, *rate)));
    }
    format!("sum: {}", parts.join(" / "))
}

/// Balances, rates and total, as served on `GET /amount/get`.
pub fn full_report(snapshot: &LedgerSnapshot) -> String {
    format!(
        "{}{}{}",
        format_balances(snapshot),
        format_rates(snapshot),
        format_total(snapshot)
    )
}
