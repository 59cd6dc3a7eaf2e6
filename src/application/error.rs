use thiserror::Error;

use crate::domain::ConversionError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Traveler not found: {0}")]
    TravelerNotFound(String),

    #[error("Traveler already exists: {0}")]
    TravelerAlreadyExists(String),

    #[error("Invalid traveler name: {0:?}")]
    InvalidTravelerName(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Expense description is required")]
    MissingDescription,

    #[error("Expense must be split between at least one traveler")]
    EmptySplit,

    #[error("Ledger home currency is {stored}, not {requested}")]
    HomeCurrencyMismatch { stored: String, requested: String },

    #[error("Currency conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
