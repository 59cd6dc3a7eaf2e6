use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Amount;

/// Exchange rates quoted against a base currency (`rates[base] == 1.0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub base: String,
    pub rates: BTreeMap<String, f64>,
}

impl RateTable {
    pub fn new(base: impl Into<String>) -> Self {
        let base = normalize_code(&base.into());
        let mut rates = BTreeMap::new();
        rates.insert(base.clone(), 1.0);
        Self { base, rates }
    }

    /// Rates used when no rate file is configured or it cannot be read.
    pub fn fallback() -> Self {
        Self::new("USD").with_rate("LKR", 300.0).with_rate("INR", 83.5)
    }

    pub fn with_rate(mut self, code: &str, rate: f64) -> Self {
        self.rates.insert(normalize_code(code), rate);
        self
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(&normalize_code(code)).copied()
    }

    pub fn supports(&self, code: &str) -> bool {
        self.usable_rate(code).is_ok()
    }

    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    /// Convert between two currencies through the base. Same-currency
    /// conversions return `amount` untouched.
    pub fn convert(&self, amount: Amount, from: &str, to: &str) -> Result<Amount, ConversionError> {
        let from_rate = self.usable_rate(from)?;
        if normalize_code(from) == normalize_code(to) {
            return Ok(amount);
        }
        let to_rate = self.usable_rate(to)?;
        Ok(amount / from_rate * to_rate)
    }

    fn usable_rate(&self, code: &str) -> Result<f64, ConversionError> {
        let rate = self
            .rate(code)
            .ok_or_else(|| ConversionError::UnknownCurrency(normalize_code(code)))?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConversionError::InvalidRate {
                currency: normalize_code(code),
                rate,
            });
        }
        Ok(rate)
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::fallback()
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversionError {
    UnknownCurrency(String),
    InvalidRate { currency: String, rate: f64 },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::UnknownCurrency(code) => write!(f, "unknown currency: {}", code),
            ConversionError::InvalidRate { currency, rate } => {
                write!(f, "invalid exchange rate for {}: {}", currency, rate)
            }
        }
    }
}

impl std::error::Error for ConversionError {}
