use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Amount, Expense, ExpenseCategory, Participant, Traveler, join_split_list,
    parse_split_list,
};

use super::MIGRATION_001_INITIAL;

const EXPENSE_COLUMNS: &str = "id, sequence, date, description, category, payer, original_amount, original_currency, amount, split_between, recorded_at";

/// Per-category totals computed by the database.
#[derive(Debug, Clone)]
pub struct CategoryAggregate {
    pub category: ExpenseCategory,
    pub count: i64,
    pub total: Amount,
}

/// Optional filters for listing expenses. Dates are inclusive.
#[derive(Debug, Clone, Default)]
pub struct ExpenseQuery<'a> {
    pub payer: Option<&'a str>,
    pub category: Option<ExpenseCategory>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Repository for persisting and querying travelers and expenses.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Settings
    // ========================

    /// Home currency the ledger was created with, if recorded.
    pub async fn get_home_currency(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = 'home_currency'")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read home currency")?;
        Ok(row.map(|row| row.get("value")))
    }

    /// Record the home currency unless one is already stored.
    /// Returns the currency now in effect.
    pub async fn init_home_currency(&self, code: &str) -> Result<String> {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES ('home_currency', ?)")
            .bind(code)
            .execute(&self.pool)
            .await
            .context("Failed to store home currency")?;
        self.get_home_currency()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Home currency missing after initialization"))
    }

    // ========================
    // Traveler operations
    // ========================

    /// Save a new traveler to the database.
    pub async fn save_traveler(&self, traveler: &Traveler) -> Result<()> {
        sqlx::query("INSERT INTO travelers (id, name, added_at) VALUES (?, ?, ?)")
            .bind(traveler.id.to_string())
            .bind(traveler.name())
            .bind(traveler.added_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to save traveler")?;
        Ok(())
    }

    /// Get a traveler by name.
    pub async fn get_traveler_by_name(&self, name: &str) -> Result<Option<Traveler>> {
        let row = sqlx::query("SELECT id, name, added_at FROM travelers WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch traveler by name")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_traveler(&row)?)),
            None => Ok(None),
        }
    }

    /// List all travelers, ordered by name.
    pub async fn list_travelers(&self) -> Result<Vec<Traveler>> {
        let rows = sqlx::query("SELECT id, name, added_at FROM travelers ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list travelers")?;

        rows.iter().map(Self::row_to_traveler).collect()
    }

    fn row_to_traveler(row: &sqlx::sqlite::SqliteRow) -> Result<Traveler> {
        let id_str: String = row.get("id");
        let name: String = row.get("name");
        let added_at_str: String = row.get("added_at");

        Ok(Traveler {
            id: Uuid::parse_str(&id_str).context("Invalid traveler ID")?,
            participant: Participant::new(name),
            added_at: DateTime::parse_from_rfc3339(&added_at_str)
                .context("Invalid added_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Expense operations
    // ========================

    /// Save a new expense to the database.
    /// Automatically assigns the next sequence number.
    pub async fn save_expense(&self, expense: &mut Expense) -> Result<()> {
        expense.sequence = self.next_sequence().await?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, sequence, date, description, category, payer, original_amount, original_currency, amount, split_between, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(expense.sequence)
        .bind(expense.date.format("%Y-%m-%d").to_string())
        .bind(&expense.description)
        .bind(expense.category.as_str())
        .bind(expense.payer.name())
        .bind(expense.original_amount)
        .bind(&expense.original_currency)
        .bind(expense.amount)
        .bind(join_split_list(&expense.split))
        .bind(expense.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save expense")?;

        Ok(())
    }

    /// Get the next sequence number and increment the counter.
    async fn next_sequence(&self) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'expense_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    /// List all expenses in the order they were recorded.
    pub async fn list_expenses(&self) -> Result<Vec<Expense>> {
        let query = format!("SELECT {} FROM expenses ORDER BY sequence", EXPENSE_COLUMNS);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    /// List expenses with optional filters.
    pub async fn list_expenses_filtered(&self, filter: &ExpenseQuery<'_>) -> Result<Vec<Expense>> {
        let mut query = format!("SELECT {} FROM expenses WHERE 1=1", EXPENSE_COLUMNS);

        let from_date_str = filter.from_date.map(|d| d.format("%Y-%m-%d").to_string());
        let to_date_str = filter.to_date.map(|d| d.format("%Y-%m-%d").to_string());

        if filter.payer.is_some() {
            query.push_str(" AND payer = ?");
        }
        if filter.category.is_some() {
            query.push_str(" AND category = ?");
        }
        if filter.from_date.is_some() {
            query.push_str(" AND date >= ?");
        }
        if filter.to_date.is_some() {
            query.push_str(" AND date <= ?");
        }

        query.push_str(" ORDER BY sequence");

        if let Some(lim) = filter.limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(payer) = filter.payer {
            sql_query = sql_query.bind(payer);
        }
        if let Some(category) = filter.category {
            sql_query = sql_query.bind(category.as_str());
        }
        if let Some(ref from) = from_date_str {
            sql_query = sql_query.bind(from);
        }
        if let Some(ref to) = to_date_str {
            sql_query = sql_query.bind(to);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list filtered expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    /// Count, total and group expenses by category.
    pub async fn sum_expenses_by_category(&self) -> Result<Vec<CategoryAggregate>> {
        let rows = sqlx::query(
            r#"
            SELECT category, COUNT(*) as count, COALESCE(SUM(amount), 0.0) as total
            FROM expenses
            GROUP BY category
            ORDER BY total DESC, category
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to sum expenses by category")?;

        rows.iter()
            .map(|row| {
                let category_str: String = row.get("category");
                Ok(CategoryAggregate {
                    category: ExpenseCategory::from_str(&category_str)
                        .ok_or_else(|| anyhow::anyhow!("Invalid category: {}", category_str))?,
                    count: row.get("count"),
                    total: row.get("total"),
                })
            })
            .collect()
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense> {
        let id_str: String = row.get("id");
        let date_str: String = row.get("date");
        let category_str: String = row.get("category");
        let payer: String = row.get("payer");
        let split_str: String = row.get("split_between");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(Expense {
            id: Uuid::parse_str(&id_str).context("Invalid expense ID")?,
            sequence: row.get("sequence"),
            date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").context("Invalid date")?,
            description: row.get("description"),
            category: ExpenseCategory::from_str(&category_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid category: {}", category_str))?,
            payer: Participant::new(payer),
            original_amount: row.get("original_amount"),
            original_currency: row.get("original_currency"),
            amount: row.get("amount"),
            split: parse_split_list(&split_str),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
                .context("Invalid recorded_at")?
                .with_timezone(&Utc),
        })
    }
}
