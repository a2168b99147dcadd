//! Sequential invoice numbers
//!
//! The next number is derived from the numbers already issued, so two
//! concurrent creations can pick the same number. There is no reservation
//! step.

use regex::Regex;

/// Prefix used when none is configured
pub const DEFAULT_PREFIX: &str = "FAC";

/// Parses and issues `<PREFIX>-<n>` invoice numbers
#[derive(Debug, Clone)]
pub struct InvoiceNumbering {
    prefix: String,
    pattern: Regex,
}

impl Default for InvoiceNumbering {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl InvoiceNumbering {
    pub fn new(prefix: &str) -> Self {
        let pattern = format!(r"^{}-(\d+)$", regex::escape(prefix));
        Self {
            prefix: prefix.to_string(),
            pattern: Regex::new(&pattern).expect("escaped prefix is a valid pattern"),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Sequence number of a well-formed invoice number; zero counts as none
    pub fn parse(&self, number: &str) -> Option<u64> {
        self.pattern
            .captures(number)
            .and_then(|c| c[1].parse::<u64>().ok())
            .filter(|n| *n > 0)
    }

    /// One past the highest existing sequence number, starting at 1
    pub fn next<'a, I>(&self, existing: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let max = existing
            .into_iter()
            .filter_map(|n| self.parse(n))
            .max()
            .unwrap_or(0);
        format!("{}-{}", self.prefix, max + 1)
    }
}

/// Next `FAC-<n>` number given the numbers already issued
pub fn next_invoice_number<'a, I>(existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    InvoiceNumbering::default().next(existing)
}
