//! Request bodies.

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use std::fmt;

/// A JSON object of `code -> amount`, in the order the keys were sent.
///
/// Keys are kept verbatim, so `{"usd": 1, "USD": 2}` yields two entries and
/// the ledger applies them in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountBatch(pub Vec<(String, f64)>);

impl<'de> Deserialize<'de> for AmountBatch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BatchVisitor;

        impl<'de> Visitor<'de> for BatchVisitor {
            type Value = AmountBatch;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object mapping currency codes to amounts")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, f64>()? {
                    entries.push(entry);
                }
                Ok(AmountBatch(entries))
            }
        }

        deserializer.deserialize_map(BatchVisitor)
    }
}
