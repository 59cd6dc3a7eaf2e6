use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, Participant};

pub type ExpenseId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExpenseCategory {
    #[serde(rename = "Food & Drinks")]
    FoodAndDrinks,
    Transport,
    Accommodation,
    Activities,
    Shopping,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 6] = [
        ExpenseCategory::FoodAndDrinks,
        ExpenseCategory::Transport,
        ExpenseCategory::Accommodation,
        ExpenseCategory::Activities,
        ExpenseCategory::Shopping,
        ExpenseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::FoodAndDrinks => "Food & Drinks",
            ExpenseCategory::Transport => "Transport",
            ExpenseCategory::Accommodation => "Accommodation",
            ExpenseCategory::Activities => "Activities",
            ExpenseCategory::Shopping => "Shopping",
            ExpenseCategory::Other => "Other",
        }
    }

    /// Lookup is case-insensitive and also accepts short forms like "food".
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "food & drinks" | "food" | "food-and-drinks" | "drinks" => {
                Some(ExpenseCategory::FoodAndDrinks)
            }
            "transport" => Some(ExpenseCategory::Transport),
            "accommodation" | "lodging" => Some(ExpenseCategory::Accommodation),
            "activities" | "activity" => Some(ExpenseCategory::Activities),
            "shopping" => Some(ExpenseCategory::Shopping),
            "other" => Some(ExpenseCategory::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExpenseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExpenseCategory::from_str(s).ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// A single shared cost. `amount` is already in the home currency; the
/// original figures are kept for display and export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    /// Insertion order, assigned by the repository
    pub sequence: i64,
    /// Day the money was spent
    pub date: NaiveDate,
    pub description: String,
    pub category: ExpenseCategory,
    /// Who paid. Need not be part of `split`.
    pub payer: Participant,
    /// Amount in the currency it was paid in
    pub original_amount: Amount,
    pub original_currency: String,
    /// Amount converted to the home currency
    pub amount: Amount,
    /// Travelers the cost is shared across, in entry order
    pub split: Vec<Participant>,
    /// When the expense was written to the ledger
    pub recorded_at: DateTime<Utc>,
}

impl Expense {
    /// Create an expense already expressed in the home currency.
    /// Sequence number must be assigned by the repository.
    pub fn new(payer: Participant, amount: Amount, split: Vec<Participant>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            date: Utc::now().date_naive(),
            description: String::new(),
            category: ExpenseCategory::Other,
            payer,
            original_amount: amount,
            original_currency: String::new(),
            amount,
            split,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: ExpenseCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Record the amount as originally paid, before conversion.
    pub fn with_original(mut self, amount: Amount, currency: impl Into<String>) -> Self {
        self.original_amount = amount;
        self.original_currency = currency.into();
        self
    }
}
