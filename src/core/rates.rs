//! Exchange rate source abstractions

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// A remote source of exchange rates against the base currency.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Returns `code -> units of base currency per one unit of code` for the
    /// requested codes. Implementations may return extra codes; callers treat a
    /// missing requested code as a failed fetch.
    async fn fetch_rates(&self, codes: &[String]) -> Result<HashMap<String, f64>>;
}
