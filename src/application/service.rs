use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::domain::{
    Amount, Expense, ExpenseCategory, LedgerAnomaly, LedgerOutcome, Participant, RateTable,
    Roster, Traveler, aggregate, apply_settlements, plan_settlements,
};
use crate::storage::{ExpenseQuery, Repository};

use super::{
    AppError, CategorySummary, CheckReport, SettlementReport, TripSummary, traveler_breakdown,
};

/// Home currency used unless configured otherwise.
pub const DEFAULT_HOME_CURRENCY: &str = "LKR";

/// Application service providing high-level operations for the trip ledger.
/// This is the primary interface for any client (CLI, importers, tests).
pub struct TripService {
    repo: Repository,
    home_currency: String,
}

/// An expense as entered by a user or read from a sheet row.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub description: String,
    pub category: ExpenseCategory,
    pub payer: String,
    /// Amount in `currency`
    pub amount: Amount,
    pub currency: String,
    pub split: Vec<String>,
}

/// Filter for querying expenses
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub payer: Option<String>,
    pub category: Option<ExpenseCategory>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl TripService {
    /// Create a new trip service over a repository whose amounts are in
    /// `home_currency`.
    pub fn new(repo: Repository, home_currency: &str) -> Self {
        Self {
            repo,
            home_currency: normalize_currency(home_currency),
        }
    }

    /// Initialize a database at the given path.
    ///
    /// A new ledger stores `home_currency`. Re-initializing an existing
    /// ledger with a different home currency fails.
    pub async fn init(database_path: &str, home_currency: &str) -> Result<Self, AppError> {
        let requested = normalize_currency(home_currency);
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        let stored = repo.init_home_currency(&requested).await?;
        if stored != requested {
            return Err(AppError::HomeCurrencyMismatch { stored, requested });
        }
        info!(database = database_path, home_currency = %stored, "initialized trip database");
        Ok(Self::new(repo, &stored))
    }

    /// Connect to an existing database, using the home currency it was
    /// created with.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        let home_currency = match repo.get_home_currency().await? {
            Some(code) => code,
            None => {
                warn!(database = database_path, "no stored home currency, assuming default");
                DEFAULT_HOME_CURRENCY.to_string()
            }
        };
        debug!(database = database_path, %home_currency, "connected to trip database");
        Ok(Self::new(repo, &home_currency))
    }

    /// Fail unless `code` is this ledger's home currency.
    pub fn require_home_currency(&self, code: &str) -> Result<(), AppError> {
        let requested = normalize_currency(code);
        if requested != self.home_currency {
            return Err(AppError::HomeCurrencyMismatch {
                stored: self.home_currency.clone(),
                requested,
            });
        }
        Ok(())
    }

    pub fn home_currency(&self) -> &str {
        &self.home_currency
    }

    // ========================
    // Traveler operations
    // ========================

    /// Register a traveler.
    pub async fn add_traveler(&self, name: &str) -> Result<Traveler, AppError> {
        let participant = Participant::new(name);
        if participant.name().is_empty() || participant.name().contains(',') {
            return Err(AppError::InvalidTravelerName(name.to_string()));
        }

        if self
            .repo
            .get_traveler_by_name(participant.name())
            .await?
            .is_some()
        {
            return Err(AppError::TravelerAlreadyExists(participant.name().to_string()));
        }

        let traveler = Traveler::new(participant);
        self.repo.save_traveler(&traveler).await?;
        info!(traveler = traveler.name(), "added traveler");
        Ok(traveler)
    }

    /// Register a traveler unless one with that name already exists.
    /// Returns true if a new traveler was created.
    pub async fn ensure_traveler(&self, name: &str) -> Result<bool, AppError> {
        match self.add_traveler(name).await {
            Ok(_) => Ok(true),
            Err(AppError::TravelerAlreadyExists(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get a traveler by name.
    pub async fn get_traveler(&self, name: &str) -> Result<Traveler, AppError> {
        let name = name.trim();
        self.repo
            .get_traveler_by_name(name)
            .await?
            .ok_or_else(|| AppError::TravelerNotFound(name.to_string()))
    }

    /// List all travelers in name order.
    pub async fn list_travelers(&self) -> Result<Vec<Traveler>, AppError> {
        Ok(self.repo.list_travelers().await?)
    }

    /// The current set of known travelers.
    pub async fn roster(&self) -> Result<Roster, AppError> {
        let travelers = self.repo.list_travelers().await?;
        Ok(travelers.into_iter().map(|t| t.participant).collect())
    }

    // ========================
    // Expense operations
    // ========================

    /// Record a new expense, converting it into the home currency.
    pub async fn record_expense(
        &self,
        new: NewExpense,
        rates: &RateTable,
        force: bool,
    ) -> Result<Expense, AppError> {
        let home_amount = rates.convert(new.amount, &new.currency, &self.home_currency)?;
        self.record_converted_expense(new, home_amount, force).await
    }

    /// Record an expense whose home-currency amount is already known, as
    /// with rows read back from a sheet.
    ///
    /// Unless `force` is set, the description and split must be non-empty,
    /// the amount positive, and every name a registered traveler. Forced
    /// records keep whatever names they are given; the ledger aggregation
    /// filters unknown ones later.
    pub async fn record_converted_expense(
        &self,
        new: NewExpense,
        home_amount: Amount,
        force: bool,
    ) -> Result<Expense, AppError> {
        for amount in [new.amount, home_amount] {
            if !amount.is_finite() || amount < 0.0 || (!force && amount == 0.0) {
                return Err(AppError::InvalidAmount(format!(
                    "Amount must be positive, got {}",
                    amount
                )));
            }
        }

        let payer = Participant::new(&new.payer);
        let split: Vec<Participant> = new
            .split
            .iter()
            .map(Participant::new)
            .filter(|p| !p.name().is_empty())
            .collect();

        if !force {
            if new.description.trim().is_empty() {
                return Err(AppError::MissingDescription);
            }
            if split.is_empty() {
                return Err(AppError::EmptySplit);
            }
            let roster = self.roster().await?;
            if let Some(unknown) = std::iter::once(&payer)
                .chain(split.iter())
                .find(|p| !roster.contains(p))
            {
                return Err(AppError::TravelerNotFound(unknown.name().to_string()));
            }
        }

        let mut expense = Expense::new(payer, home_amount, split)
            .with_description(new.description.trim())
            .with_category(new.category)
            .with_date(new.date)
            .with_original(new.amount, new.currency.trim().to_uppercase());

        self.repo.save_expense(&mut expense).await?;

        info!(
            sequence = expense.sequence,
            payer = %expense.payer,
            amount = expense.amount,
            currency = %self.home_currency,
            split = expense.split.len(),
            "recorded expense"
        );
        Ok(expense)
    }

    /// List expenses in the order they were recorded.
    pub async fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, AppError> {
        let query = ExpenseQuery {
            payer: filter.payer.as_deref().map(str::trim),
            category: filter.category,
            from_date: filter.from_date,
            to_date: filter.to_date,
            limit: filter.limit,
        };
        Ok(self.repo.list_expenses_filtered(&query).await?)
    }

    // ========================
    // Balance & settlement
    // ========================

    /// Recompute every traveler's balance from the full expense history.
    pub async fn balances(&self) -> Result<LedgerOutcome, AppError> {
        let roster = self.roster().await?;
        let expenses = self.repo.list_expenses().await?;
        let outcome = aggregate(&roster, &expenses);

        debug!(
            travelers = roster.len(),
            expenses = expenses.len(),
            "aggregated balances"
        );
        log_anomalies(&outcome.anomalies);
        Ok(outcome)
    }

    /// Balances plus the payments that settle them.
    pub async fn settle_up(&self) -> Result<SettlementReport, AppError> {
        let outcome = self.balances().await?;
        let settlements = plan_settlements(&outcome.balances);
        debug!(payments = settlements.len(), "planned settlements");

        Ok(SettlementReport {
            home_currency: self.home_currency.clone(),
            balances: outcome.balances,
            settlements,
            anomalies: outcome.anomalies,
        })
    }

    /// Verify that balances net to zero and that the plan settles them.
    pub async fn check(&self) -> Result<CheckReport, AppError> {
        let roster = self.roster().await?;
        let expenses = self.repo.list_expenses().await?;
        let outcome = aggregate(&roster, &expenses);
        log_anomalies(&outcome.anomalies);

        let settlements = plan_settlements(&outcome.balances);
        let after = apply_settlements(&outcome.balances, &settlements);
        let max_residual = after
            .iter()
            .map(|(_, amount)| amount.abs())
            .fold(0.0, Amount::max);

        Ok(CheckReport {
            traveler_count: roster.len(),
            expense_count: expenses.len(),
            balance_total: outcome.balances.total(),
            max_residual,
            settlement_count: settlements.len(),
            anomalies: outcome.anomalies,
        })
    }

    // ========================
    // Reporting
    // ========================

    /// Totals per category and per traveler.
    pub async fn summary(&self) -> Result<TripSummary, AppError> {
        let roster = self.roster().await?;
        let expenses = self.repo.list_expenses().await?;
        let aggregates = self.repo.sum_expenses_by_category().await?;

        let total_spent: Amount = aggregates.iter().map(|a| a.total).sum();
        let categories = aggregates
            .into_iter()
            .map(|a| CategorySummary {
                category: a.category,
                total: a.total,
                count: a.count,
                average: if a.count > 0 {
                    a.total / a.count as Amount
                } else {
                    0.0
                },
                percentage: if total_spent > 0.0 {
                    a.total / total_spent * 100.0
                } else {
                    0.0
                },
            })
            .collect();

        Ok(TripSummary {
            home_currency: self.home_currency.clone(),
            traveler_count: roster.len(),
            expense_count: expenses.len(),
            total_spent,
            categories,
            travelers: traveler_breakdown(&roster, &expenses),
        })
    }
}

fn normalize_currency(code: &str) -> String {
    code.trim().to_uppercase()
}

fn log_anomalies(anomalies: &[LedgerAnomaly]) {
    for anomaly in anomalies {
        match anomaly {
            LedgerAnomaly::EmptySplit { expense } => {
                warn!(%expense, "expense has no known travelers in its split; skipped")
            }
            LedgerAnomaly::UnknownPayer {
                expense,
                payer,
                amount,
            } => warn!(%expense, %payer, amount, "payer is not a traveler; credit dropped"),
            LedgerAnomaly::UnknownSplitMembers { expense, names } => {
                let names: Vec<&str> = names.iter().map(Participant::name).collect();
                warn!(%expense, names = ?names, "unknown travelers removed from split")
            }
        }
    }
}
