use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::application::{
    CheckReport, ExpenseFilter, NewExpense, SettlementReport, TripService, TripSummary,
};
use crate::config::{Config, DEFAULT_DATABASE};
use crate::domain::{ExpenseCategory, LedgerAnomaly, format_amount, parse_amount};
use crate::io::{ImportOptions, ImportResult, parse_date};

/// tripsplit - shared trip expense ledger
#[derive(Parser)]
#[command(name = "tripsplit")]
#[command(about = "Track shared trip expenses and work out who pays whom")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "TRIPSPLIT_DB", default_value = DEFAULT_DATABASE)]
    pub database: String,

    /// Currency every expense is normalized into. Set once by `init`
    /// (default LKR); later runs must repeat it or leave it out
    #[arg(long, env = "TRIPSPLIT_HOME_CURRENCY")]
    pub home_currency: Option<String>,

    /// JSON file with exchange rates ({"base": "USD", "rates": {...}})
    #[arg(long, env = "TRIPSPLIT_RATES")]
    pub rates: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Traveler management commands
    #[command(subcommand)]
    Traveler(TravelerCommands),

    /// Record a shared expense
    Expense {
        /// Amount paid (e.g., "1500" or "12.50")
        amount: String,

        /// Who paid
        #[arg(short, long)]
        paid_by: String,

        /// Comma-separated travelers sharing the cost (defaults to everyone)
        #[arg(short, long)]
        split: Option<String>,

        /// What the money was spent on
        #[arg(short, long)]
        description: String,

        /// Category: food, transport, accommodation, activities, shopping, other
        #[arg(short, long, default_value = "other")]
        category: String,

        /// Currency the amount was paid in (defaults to the home currency)
        #[arg(long)]
        currency: Option<String>,

        /// Date of the expense (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Record even if names are unknown or the description is empty
        #[arg(long)]
        force: bool,
    },

    /// List recorded expenses
    Expenses {
        /// Filter by payer
        #[arg(long)]
        paid_by: Option<String>,

        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of expenses to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show each traveler's net balance
    Balances {
        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show the payments that settle everyone up
    Settle {
        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Trip totals by category and traveler
    Summary {
        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Verify that the ledger balances and the settlement plan clears it
    /// (leftovers up to one cent per traveler are tolerated)
    Check,

    /// Convert an amount between currencies
    Convert {
        /// Amount to convert
        amount: String,

        /// Source currency
        #[arg(long)]
        from: String,

        /// Target currency (defaults to the home currency)
        #[arg(long)]
        to: Option<String>,
    },

    /// Show the exchange rates in use
    Rates,

    /// Export data to CSV or JSON
    Export {
        /// What to export: expenses, travelers, balances, settlements, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import data from CSV
    Import {
        /// What to import: expenses, travelers
        import_type: String,

        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,

        /// Register travelers that don't exist yet
        #[arg(long)]
        create_travelers: bool,
    },
}

#[derive(Subcommand)]
pub enum TravelerCommands {
    /// Register a new traveler
    Add {
        /// Traveler name (must be unique)
        name: String,
    },

    /// List all travelers
    List,
}

impl Cli {
    pub fn config(&self) -> Config {
        Config::new(
            self.database.clone(),
            self.home_currency.clone(),
            self.rates.clone(),
        )
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();

        match self.command {
            Commands::Init => {
                let service =
                    TripService::init(&config.database, config.home_currency_or_default()).await?;
                println!(
                    "Database initialized: {} (home currency {})",
                    config.database,
                    service.home_currency()
                );
            }

            Commands::Traveler(traveler_cmd) => {
                let service = open(&config).await?;
                run_traveler_command(&service, traveler_cmd).await?;
            }

            Commands::Expense {
                amount,
                paid_by,
                split,
                description,
                category,
                currency,
                date,
                force,
            } => {
                let service = open(&config).await?;
                let amount = parse_amount(&amount)
                    .context("Invalid amount format. Use '1500' or '12.50'")?;
                let category = parse_category(&category)?;
                let date = match date {
                    Some(date_str) => parse_date(&date_str)?,
                    None => Utc::now().date_naive(),
                };
                let split: Vec<String> = match split {
                    Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
                    None => service
                        .list_travelers()
                        .await?
                        .iter()
                        .map(|t| t.name().to_string())
                        .collect(),
                };

                let new = NewExpense {
                    date,
                    description,
                    category,
                    payer: paid_by,
                    amount,
                    currency: currency.unwrap_or_else(|| service.home_currency().to_string()),
                    split,
                };
                let expense = service
                    .record_expense(new, &config.rate_table(), force)
                    .await?;

                println!(
                    "Recorded expense: {} {} paid by {}, split {} way(s) ({})",
                    format_amount(expense.amount),
                    service.home_currency(),
                    expense.payer,
                    expense.split.len(),
                    expense.id
                );
            }

            Commands::Expenses {
                paid_by,
                category,
                from_date,
                to_date,
                limit,
            } => {
                let service = open(&config).await?;
                let filter = ExpenseFilter {
                    payer: paid_by,
                    category: category.as_deref().map(parse_category).transpose()?,
                    from_date: from_date.as_deref().map(parse_date).transpose()?,
                    to_date: to_date.as_deref().map(parse_date).transpose()?,
                    limit,
                };
                run_expenses_command(&service, &filter).await?;
            }

            Commands::Balances { format } => {
                let service = open(&config).await?;
                let report = service.settle_up().await?;
                match format.as_str() {
                    "table" => print_balances(&report),
                    "json" => println!("{}", serde_json::to_string_pretty(&report.balances)?),
                    "csv" => {
                        crate::io::Exporter::new(&service)
                            .export_balances_csv(std::io::stdout())
                            .await?;
                    }
                    other => anyhow::bail!("Unknown format '{}'. Use table, json or csv", other),
                }
            }

            Commands::Settle { format } => {
                let service = open(&config).await?;
                match format.as_str() {
                    "table" => print_settlements(&service.settle_up().await?),
                    "json" => println!(
                        "{}",
                        serde_json::to_string_pretty(&service.settle_up().await?.settlements)?
                    ),
                    "csv" => {
                        crate::io::Exporter::new(&service)
                            .export_settlements_csv(std::io::stdout())
                            .await?;
                    }
                    other => anyhow::bail!("Unknown format '{}'. Use table, json or csv", other),
                }
            }

            Commands::Summary { format } => {
                let service = open(&config).await?;
                let summary = service.summary().await?;
                match format.as_str() {
                    "table" => print_summary(&summary),
                    "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
                    other => anyhow::bail!("Unknown format '{}'. Use table or json", other),
                }
            }

            Commands::Check => {
                let service = open(&config).await?;
                let report = service.check().await?;
                print_check(&report);
                if !report.is_healthy() {
                    anyhow::bail!("Ledger check found problems");
                }
            }

            Commands::Convert { amount, from, to } => {
                let amount = parse_amount(&amount).context("Invalid amount")?;
                let to = to.unwrap_or_else(|| config.home_currency_or_default().to_string());
                let converted = config.rate_table().convert(amount, &from, &to)?;
                println!(
                    "{} {} = {} {}",
                    format_amount(amount),
                    from.trim().to_uppercase(),
                    format_amount(converted),
                    to.trim().to_uppercase()
                );
            }

            Commands::Rates => {
                let table = config.rate_table();
                println!("Base currency: {}", table.base);
                println!("{:<8} {:>14}", "CODE", "RATE");
                println!("{}", "-".repeat(23));
                for code in table.currencies() {
                    if let Some(rate) = table.rate(code) {
                        println!("{:<8} {:>14.4}", code, rate);
                    }
                }
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = open(&config).await?;
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }

            Commands::Import {
                import_type,
                input,
                dry_run,
                create_travelers,
            } => {
                let service = open(&config).await?;
                let options = ImportOptions {
                    dry_run,
                    create_missing_travelers: create_travelers,
                };
                run_import_command(&service, &import_type, input.as_deref(), options).await?;
            }
        }

        Ok(())
    }
}

async fn open(config: &Config) -> Result<TripService> {
    let service = TripService::connect(&config.database)
        .await
        .with_context(|| {
            format!(
                "Cannot open database '{}'. Run `tripsplit init` first",
                config.database
            )
        })?;
    if let Some(code) = &config.home_currency {
        service.require_home_currency(code)?;
    }
    Ok(service)
}

fn parse_category(s: &str) -> Result<ExpenseCategory> {
    ExpenseCategory::from_str(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid category '{}'. Valid categories: food, transport, accommodation, activities, shopping, other",
            s
        )
    })
}

async fn run_traveler_command(service: &TripService, cmd: TravelerCommands) -> Result<()> {
    match cmd {
        TravelerCommands::Add { name } => {
            let traveler = service.add_traveler(&name).await?;
            println!("Added traveler: {}", traveler.name());
        }

        TravelerCommands::List => {
            let travelers = service.list_travelers().await?;
            if travelers.is_empty() {
                println!("No travelers yet. Add one with `tripsplit traveler add <NAME>`.");
            } else {
                println!("{:<24} {:<10}", "NAME", "SINCE");
                println!("{}", "-".repeat(35));
                for traveler in travelers {
                    println!(
                        "{:<24} {:<10}",
                        traveler.name(),
                        traveler.added_at.format("%Y-%m-%d")
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_expenses_command(service: &TripService, filter: &ExpenseFilter) -> Result<()> {
    let expenses = service.list_expenses(filter).await?;
    if expenses.is_empty() {
        println!("No expenses found.");
        return Ok(());
    }

    println!(
        "{:<10}  {:<24} {:<14} {:<12} {:>14} {:>14}  SPLIT",
        "DATE",
        "DESCRIPTION",
        "CATEGORY",
        "PAID BY",
        "ORIGINAL",
        service.home_currency()
    );
    println!("{}", "-".repeat(110));
    for expense in expenses {
        let original = format!(
            "{} {}",
            format_amount(expense.original_amount),
            expense.original_currency
        );
        let split: Vec<&str> = expense.split.iter().map(|p| p.name()).collect();
        println!(
            "{:<10}  {:<24} {:<14} {:<12} {:>14} {:>14}  {}",
            expense.date.format("%Y-%m-%d"),
            truncate(&expense.description, 24),
            expense.category,
            truncate(expense.payer.name(), 12),
            original,
            format_amount(expense.amount),
            split.join(", ")
        );
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

fn print_balances(report: &SettlementReport) {
    if report.balances.is_empty() {
        println!("No travelers yet.");
        return;
    }

    println!("{:<24} {:>16}  STATUS", "TRAVELER", report.home_currency);
    println!("{}", "-".repeat(52));
    for (traveler, balance) in report.balances.iter() {
        let status = if crate::domain::is_settled(balance) {
            "settled"
        } else if balance > 0.0 {
            "gets back"
        } else {
            "owes"
        };
        println!(
            "{:<24} {:>16}  {}",
            traveler.name(),
            format_amount(balance),
            status
        );
    }
    print_anomalies(&report.anomalies);
}

fn print_settlements(report: &SettlementReport) {
    if report.settlements.is_empty() {
        println!("Everyone is settled up!");
    } else {
        for settlement in &report.settlements {
            println!(
                "{} pays {} -> {} {}",
                settlement.from,
                settlement.to,
                report.home_currency,
                format_amount(settlement.amount)
            );
        }
    }
    print_anomalies(&report.anomalies);
}

fn print_anomalies(anomalies: &[LedgerAnomaly]) {
    if anomalies.is_empty() {
        return;
    }
    println!();
    println!("Note: {} expense issue(s) affected these figures:", anomalies.len());
    for anomaly in anomalies {
        match anomaly {
            LedgerAnomaly::EmptySplit { expense } => {
                println!("  - expense {} has no known travelers to split with; ignored", expense)
            }
            LedgerAnomaly::UnknownPayer {
                expense,
                payer,
                amount,
            } => println!(
                "  - expense {} paid by unknown '{}'; {} not credited",
                expense,
                payer,
                format_amount(*amount)
            ),
            LedgerAnomaly::UnknownSplitMembers { expense, names } => {
                let names: Vec<&str> = names.iter().map(|p| p.name()).collect();
                println!(
                    "  - expense {} mentions unknown traveler(s): {}",
                    expense,
                    names.join(", ")
                )
            }
        }
    }
}

fn print_summary(summary: &TripSummary) {
    let currency = &summary.home_currency;
    println!("Travelers:    {}", summary.traveler_count);
    println!("Expenses:     {}", summary.expense_count);
    println!(
        "Total spent:  {} {}",
        currency,
        format_amount(summary.total_spent)
    );

    if !summary.categories.is_empty() {
        println!();
        println!(
            "{:<16} {:>6} {:>16} {:>14} {:>7}",
            "CATEGORY", "COUNT", "TOTAL", "AVERAGE", "SHARE"
        );
        println!("{}", "-".repeat(63));
        for category in &summary.categories {
            println!(
                "{:<16} {:>6} {:>16} {:>14} {:>6.1}%",
                category.category.as_str(),
                category.count,
                format_amount(category.total),
                format_amount(category.average),
                category.percentage
            );
        }
    }

    if !summary.travelers.is_empty() {
        println!();
        println!(
            "{:<24} {:>16} {:>16} {:>16}",
            "TRAVELER", "PAID", "SHARE", "NET"
        );
        println!("{}", "-".repeat(75));
        for row in &summary.travelers {
            println!(
                "{:<24} {:>16} {:>16} {:>16}",
                row.traveler.name(),
                format_amount(row.paid),
                format_amount(row.share),
                format_amount(row.net)
            );
        }
    }
}

fn print_check(report: &CheckReport) {
    println!("Travelers:          {}", report.traveler_count);
    println!("Expenses:           {}", report.expense_count);
    println!("Balance total:      {:.6}", report.balance_total);
    println!("Settlements:        {}", report.settlement_count);
    println!(
        "Largest residual:   {:.6} (tolerance {:.2})",
        report.max_residual,
        report.residual_tolerance()
    );
    print_anomalies(&report.anomalies);
    println!();
    if report.is_healthy() {
        println!("Ledger OK");
    } else {
        println!("Ledger has problems");
    }
}

async fn run_export_command(
    service: &TripService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "expenses" => {
            let count = exporter.export_expenses_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} expenses", count);
            }
        }
        "travelers" => {
            let count = exporter.export_travelers_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} travelers", count);
            }
        }
        "balances" => {
            let count = exporter.export_balances_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "settlements" => {
            let count = exporter.export_settlements_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} settlements", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported trip: {} travelers, {} expenses",
                    snapshot.travelers.len(),
                    snapshot.expenses.len()
                );
            }
        }
        other => anyhow::bail!(
            "Unknown export type '{}'. Use expenses, travelers, balances, settlements or full",
            other
        ),
    }
    Ok(())
}

async fn run_import_command(
    service: &TripService,
    import_type: &str,
    input: Option<&str>,
    options: ImportOptions,
) -> Result<()> {
    use crate::io::Importer;
    use std::fs::File;
    use std::io::{Read, stdin};

    let importer = Importer::new(service);
    let dry_run = options.dry_run;

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let result = match import_type {
        "expenses" => importer.import_expenses_csv(reader, options).await?,
        "travelers" => importer.import_travelers_csv(reader, options).await?,
        other => anyhow::bail!("Unknown import type '{}'. Use expenses or travelers", other),
    };

    print_import_result(&result, dry_run);
    Ok(())
}

fn print_import_result(result: &ImportResult, dry_run: bool) {
    let verb = if dry_run { "Would import" } else { "Imported" };
    println!("{}: {}", verb, result.imported);
    if result.skipped > 0 {
        println!("Skipped:  {}", result.skipped);
    }
    if result.created_travelers > 0 {
        println!("New travelers: {}", result.created_travelers);
    }
    if !result.errors.is_empty() {
        println!("Errors:   {}", result.errors.len());
        for error in &result.errors {
            match &error.field {
                Some(field) => println!("  line {} ({}): {}", error.line, field, error.error),
                None => println!("  line {}: {}", error.line, error.error),
            }
        }
    }
}
