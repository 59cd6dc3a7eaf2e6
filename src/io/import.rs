use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use std::io::Read;
use tracing::{debug, info};

use crate::application::{NewExpense, TripService};
use crate::domain::{ExpenseCategory, coerce_amount, parse_split_list};

use super::{
    COL_CATEGORY, COL_DATE, COL_DESCRIPTION, COL_HOME_AMOUNT_PREFIX, COL_NAME,
    COL_ORIGINAL_AMOUNT, COL_ORIGINAL_CURRENCY, COL_PAID_BY, COL_SPLIT_BETWEEN,
};

/// Result of an import operation
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    /// Travelers created along the way
    pub created_travelers: usize,
    pub errors: Vec<ImportError>,
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub create_missing_travelers: bool,
}

/// Positions of the expense sheet columns in a CSV header.
struct ExpenseColumns {
    date: usize,
    description: Option<usize>,
    category: Option<usize>,
    paid_by: usize,
    original_amount: Option<usize>,
    original_currency: Option<usize>,
    home_amount: usize,
    split_between: usize,
}

impl ExpenseColumns {
    /// Find the sheet columns. The home amount column must be named after
    /// `home_currency` (e.g. `Amount_LKR`).
    fn locate(headers: &csv::StringRecord, home_currency: &str) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| anyhow::anyhow!("Missing required column: {}", name))
        };

        let (home_amount, header) = headers
            .iter()
            .enumerate()
            .find(|(_, h)| h.trim().starts_with(COL_HOME_AMOUNT_PREFIX))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Missing required column: {}<CURRENCY>",
                    COL_HOME_AMOUNT_PREFIX
                )
            })?;
        let column_currency = header.trim()[COL_HOME_AMOUNT_PREFIX.len()..].to_uppercase();
        if column_currency != home_currency.trim().to_uppercase() {
            anyhow::bail!(
                "Column {} holds {} amounts but the ledger's home currency is {}",
                header.trim(),
                column_currency,
                home_currency
            );
        }

        Ok(Self {
            date: require(COL_DATE)?,
            description: find(COL_DESCRIPTION),
            category: find(COL_CATEGORY),
            paid_by: require(COL_PAID_BY)?,
            original_amount: find(COL_ORIGINAL_AMOUNT),
            original_currency: find(COL_ORIGINAL_CURRENCY),
            home_amount,
            split_between: require(COL_SPLIT_BETWEEN)?,
        })
    }
}

/// Importer for loading sheet exports into the trip ledger
pub struct Importer<'a> {
    service: &'a TripService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a TripService) -> Self {
        Self { service }
    }

    /// Import expenses from CSV in the expense sheet layout.
    ///
    /// Rows are taken as the sheet holds them: an unparseable amount counts
    /// as zero and names are not checked against the roster. Rows with a bad
    /// date or broken CSV are reported and skipped.
    pub async fn import_expenses_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers().context("Failed to read CSV header")?;
        let home_currency = self.service.home_currency().to_string();
        let columns = ExpenseColumns::locate(headers, &home_currency)?;
        let mut result = ImportResult::default();

        for (line_num, record) in csv_reader.records().enumerate() {
            let line = line_num + 2; // +2 for header and 0-indexing

            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    result.errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            let field =
                |index: Option<usize>| index.and_then(|i| record.get(i)).unwrap_or("").trim();

            let date = match parse_date(field(Some(columns.date))) {
                Ok(d) => d,
                Err(e) => {
                    result.errors.push(ImportError {
                        line,
                        field: Some(COL_DATE.to_string()),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let category_str = field(columns.category);
            let category = ExpenseCategory::from_str(category_str).unwrap_or_else(|| {
                debug!(line, category = category_str, "unknown category, using Other");
                ExpenseCategory::Other
            });

            let payer = field(Some(columns.paid_by)).to_string();
            let home_amount = coerce_amount(field(Some(columns.home_amount)));
            let original_amount = match columns.original_amount {
                Some(_) => coerce_amount(field(columns.original_amount)),
                None => home_amount,
            };
            let currency = match field(columns.original_currency) {
                "" => home_currency.clone(),
                code => code.to_string(),
            };
            let split: Vec<String> = parse_split_list(field(Some(columns.split_between)))
                .into_iter()
                .map(|p| p.name().to_string())
                .collect();

            if options.create_missing_travelers && !options.dry_run {
                let names = std::iter::once(&payer)
                    .chain(split.iter())
                    .filter(|name| !name.is_empty());
                for name in names {
                    match self.service.ensure_traveler(name).await {
                        Ok(true) => result.created_travelers += 1,
                        Ok(false) => {}
                        Err(e) => {
                            result.errors.push(ImportError {
                                line,
                                field: Some(COL_PAID_BY.to_string()),
                                error: format!("Traveler error: {}", e),
                            });
                        }
                    }
                }
            }

            let new = NewExpense {
                date,
                description: field(columns.description).to_string(),
                category,
                payer,
                amount: original_amount,
                currency,
                split,
            };

            if options.dry_run {
                result.imported += 1;
                continue;
            }

            match self
                .service
                .record_converted_expense(new, home_amount, true)
                .await
            {
                Ok(_) => result.imported += 1,
                Err(e) => result.errors.push(ImportError {
                    line,
                    field: None,
                    error: format!("Expense creation failed: {}", e),
                }),
            }
        }

        info!(
            imported = result.imported,
            errors = result.errors.len(),
            created_travelers = result.created_travelers,
            "imported expenses"
        );
        Ok(result)
    }

    /// Import travelers from a CSV with a `Name` column. Existing names are
    /// counted as skipped.
    pub async fn import_travelers_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let name_column = csv_reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .position(|h| h.trim() == COL_NAME)
            .ok_or_else(|| anyhow::anyhow!("Missing required column: {}", COL_NAME))?;
        let mut result = ImportResult::default();

        for (line_num, record) in csv_reader.records().enumerate() {
            let line = line_num + 2;

            let name = match record {
                Ok(r) => r.get(name_column).unwrap_or("").trim().to_string(),
                Err(e) => {
                    result.errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            if name.is_empty() {
                result.skipped += 1;
                continue;
            }

            if options.dry_run {
                result.imported += 1;
                continue;
            }

            match self.service.ensure_traveler(&name).await {
                Ok(true) => result.imported += 1,
                Ok(false) => result.skipped += 1,
                Err(e) => result.errors.push(ImportError {
                    line,
                    field: Some(COL_NAME.to_string()),
                    error: e.to_string(),
                }),
            }
        }

        Ok(result)
    }
}

/// Parse a sheet date: `YYYY-MM-DD` or a full RFC3339 timestamp.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    anyhow::bail!("Invalid date format: '{}'. Use YYYY-MM-DD", s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 9, 20).unwrap();
        assert_eq!(parse_date("2025-09-20").unwrap(), expected);
        assert_eq!(parse_date("2025-09-20T18:30:00+05:30").unwrap(), expected);
        assert!(parse_date("20/09/2025").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_locate_columns_in_any_order() {
        let headers = csv::StringRecord::from(vec![
            "Split_Between",
            "Amount_LKR",
            "Paid_By",
            "Date",
        ]);
        let columns = ExpenseColumns::locate(&headers, "LKR").unwrap();
        assert_eq!(columns.split_between, 0);
        assert_eq!(columns.home_amount, 1);
        assert_eq!(columns.paid_by, 2);
        assert_eq!(columns.date, 3);
        assert!(columns.description.is_none());
    }

    #[test]
    fn test_locate_columns_missing_required() {
        let headers = csv::StringRecord::from(vec!["Date", "Paid_By", "Split_Between"]);
        let err = ExpenseColumns::locate(&headers, "LKR").err().unwrap();
        assert!(err.to_string().contains("Amount_"));
    }

    #[test]
    fn test_locate_columns_checks_home_currency() {
        let headers = csv::StringRecord::from(vec!["Date", "Paid_By", "Amount_USD", "Split_Between"]);
        let err = ExpenseColumns::locate(&headers, "LKR").err().unwrap();
        assert!(err.to_string().contains("LKR"));
        assert!(ExpenseColumns::locate(&headers, "usd").is_ok());
    }
}
