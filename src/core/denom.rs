use serde::{Deserialize, Serialize};
use std::fmt;

/// Denomination tag for an instrument (e.g. "USD", "EUR").
///
/// Every ledger is constructed with a single base denomination used by its
/// issuance operations, but the tag still travels on every instrument and
/// participates in the fungible key: pieces in different denominations are
/// never merged.
///
/// # Examples
///
/// ```
/// use ledger_engine::core::denom::Denomination;
///
/// let usd = Denomination::new("USD");
/// let eur = Denomination::new("EUR");
/// assert_ne!(usd, eur);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Denomination(String);

impl Denomination {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Denomination {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denomination_equality() {
        let a = Denomination::new("USD");
        let b = Denomination::new("USD");
        let c = Denomination::new("EUR");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_denomination_display() {
        let d = Denomination::new("USD");
        assert_eq!(format!("{}", d), "USD");
    }
}
