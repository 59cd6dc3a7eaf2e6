// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use tempfile::TempDir;
use tripsplit::application::{NewExpense, TripService};
use tripsplit::domain::{Amount, ExpenseCategory, RateTable};

/// Helper to create a test service with a temporary LKR database
pub async fn test_service() -> Result<(TripService, TempDir)> {
    test_service_in("LKR").await
}

/// Helper to create a test service whose ledger uses the given home currency
pub async fn test_service_in(home_currency: &str) -> Result<(TripService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = TripService::init(&db_path(&temp_dir), home_currency).await?;
    Ok((service, temp_dir))
}

/// Path of the database created by the helpers above
pub fn db_path(temp_dir: &TempDir) -> String {
    temp_dir.path().join("test.db").to_str().unwrap().to_string()
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Helper to build an expense in the home currency
pub fn home_expense(payer: &str, amount: Amount, split: &[&str]) -> NewExpense {
    NewExpense {
        date: parse_date("2025-09-20"),
        description: format!("{} paid", payer),
        category: ExpenseCategory::Other,
        payer: payer.to_string(),
        amount,
        currency: "LKR".to_string(),
        split: split.iter().map(|s| s.to_string()).collect(),
    }
}

/// Test fixture: a group of travelers
pub struct TravelGroup;

impl TravelGroup {
    /// Register the given travelers
    pub async fn create(service: &TripService, names: &[&str]) -> Result<()> {
        for name in names {
            service.add_traveler(name).await?;
        }
        Ok(())
    }

    /// Record an expense in the home currency using the built-in rates
    pub async fn spend(
        service: &TripService,
        payer: &str,
        amount: Amount,
        split: &[&str],
    ) -> Result<()> {
        service
            .record_expense(home_expense(payer, amount, split), &RateTable::fallback(), false)
            .await?;
        Ok(())
    }
}
