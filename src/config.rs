use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::application::DEFAULT_HOME_CURRENCY;
use crate::domain::RateTable;

/// Default database file, relative to the working directory.
pub const DEFAULT_DATABASE: &str = "tripsplit.db";

/// Runtime settings resolved from command-line flags and the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database: String,
    /// Requested home currency. Fixed for a ledger by `init`; later runs
    /// may only repeat it.
    pub home_currency: Option<String>,
    pub rates_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            home_currency: None,
            rates_file: None,
        }
    }
}

impl Config {
    pub fn new(
        database: String,
        home_currency: Option<String>,
        rates_file: Option<PathBuf>,
    ) -> Self {
        Self {
            database,
            home_currency: home_currency.map(|code| code.trim().to_uppercase()),
            rates_file,
        }
    }

    /// Home currency for a new ledger or for conversions outside one.
    pub fn home_currency_or_default(&self) -> &str {
        self.home_currency.as_deref().unwrap_or(DEFAULT_HOME_CURRENCY)
    }

    /// Exchange rates to convert with. Falls back to the built-in table when
    /// no file is configured or it cannot be read.
    pub fn rate_table(&self) -> RateTable {
        let Some(path) = &self.rates_file else {
            return RateTable::fallback();
        };

        match load_rate_table(path) {
            Ok(table) => {
                debug!(path = %path.display(), currencies = table.rates.len(), "loaded exchange rates");
                table
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using fallback exchange rates");
                RateTable::fallback()
            }
        }
    }
}

/// Read a JSON rate table such as `{"base": "USD", "rates": {"LKR": 300.0}}`.
pub fn load_rate_table(path: &Path) -> Result<RateTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open rates file: {}", path.display()))?;
    let table: RateTable = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid rates file: {}", path.display()))?;

    // Normalize codes and make sure the base converts to itself.
    let mut normalized = RateTable::new(&table.base);
    for (code, rate) in &table.rates {
        normalized = normalized.with_rate(code, *rate);
    }
    Ok(normalized)
}
