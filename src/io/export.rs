use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{ExpenseFilter, TripService};
use crate::domain::{Expense, Traveler, join_split_list};

use super::{
    COL_CATEGORY, COL_DATE, COL_DESCRIPTION, COL_HOME_AMOUNT_PREFIX, COL_ORIGINAL_AMOUNT,
    COL_ORIGINAL_CURRENCY, COL_PAID_BY, COL_SPLIT_BETWEEN,
};

/// Full trip snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub home_currency: String,
    pub travelers: Vec<Traveler>,
    pub expenses: Vec<Expense>,
}

/// Exporter for writing trip data in sheet-compatible formats
pub struct Exporter<'a> {
    service: &'a TripService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a TripService) -> Self {
        Self { service }
    }

    /// Export expenses to CSV using the expense sheet's columns
    pub async fn export_expenses_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let expenses = self.service.list_expenses(&ExpenseFilter::default()).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        let home_amount_header = format!(
            "{}{}",
            COL_HOME_AMOUNT_PREFIX,
            self.service.home_currency()
        );
        csv_writer.write_record([
            COL_DATE,
            COL_DESCRIPTION,
            COL_CATEGORY,
            COL_PAID_BY,
            COL_ORIGINAL_AMOUNT,
            COL_ORIGINAL_CURRENCY,
            home_amount_header.as_str(),
            COL_SPLIT_BETWEEN,
        ])?;

        let mut count = 0;
        for expense in &expenses {
            csv_writer.write_record(&[
                expense.date.format("%Y-%m-%d").to_string(),
                expense.description.clone(),
                expense.category.as_str().to_string(),
                expense.payer.name().to_string(),
                expense.original_amount.to_string(),
                expense.original_currency.clone(),
                expense.amount.to_string(),
                join_split_list(&expense.split),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export travelers to CSV (single `Name` column)
    pub async fn export_travelers_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let travelers = self.service.list_travelers().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([super::COL_NAME])?;
        for traveler in &travelers {
            csv_writer.write_record([traveler.name()])?;
        }

        csv_writer.flush()?;
        Ok(travelers.len())
    }

    /// Export net balances to CSV
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let outcome = self.service.balances().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["traveler", "balance"])?;

        let mut count = 0;
        for (traveler, balance) in outcome.balances.iter() {
            csv_writer.write_record(&[traveler.name().to_string(), format!("{:.2}", balance)])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the settlement plan to CSV
    pub async fn export_settlements_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let report = self.service.settle_up().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["from", "to", "amount"])?;
        for settlement in &report.settlements {
            csv_writer.write_record(&[
                settlement.from.name().to_string(),
                settlement.to.name().to_string(),
                format!("{:.2}", settlement.amount),
            ])?;
        }

        csv_writer.flush()?;
        Ok(report.settlements.len())
    }

    /// Export the whole trip as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<TripSnapshot> {
        let travelers = self.service.list_travelers().await?;
        let expenses = self.service.list_expenses(&ExpenseFilter::default()).await?;

        let snapshot = TripSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            home_currency: self.service.home_currency().to_string(),
            travelers,
            expenses,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
