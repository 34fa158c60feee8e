//! Operator CLI for reconciliation jobs over a movements export.
//!
//! The store side is a JSON array file (one file = one collection); `fix`
//! without `--apply` is a dry-run that prints the plan and writes nothing.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use movements_core::{
    allocator::payment_summary,
    balance,
    CorrectionEngine, JsonFileStore, MovementKind, Reconciler,
};

#[derive(Parser)]
#[command(name = "reconcile")]
#[command(about = "Movement ledger reconciliation jobs", long_about = None)]
struct Cli {
    /// JSON export of the movements collection
    #[arg(long, global = true, default_value = "movements.json")]
    input: PathBuf,

    /// Collection name (informational; the file is the collection)
    #[arg(long, global = true, default_value = "movements")]
    collection: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare naive vs normalized per-method totals and list duplicate groups
    Audit,

    /// Print normalized balances per method as of a cutoff date
    Balances {
        /// Cutoff date (inclusive, end of day). Default: today
        #[arg(long = "as-of")]
        as_of: Option<NaiveDate>,

        /// Restrict to one method code
        #[arg(long)]
        method: Option<String>,
    },

    /// Print the monthly statement for one method
    Statement {
        /// Method code (e.g. mercadoPago)
        #[arg(long)]
        method: String,
    },

    /// Detect and repair allocation drift (total > sum of allocations)
    Fix {
        /// Lower bound on movement date, inclusive. Default: yesterday
        #[arg(long)]
        since: Option<NaiveDate>,

        /// Write corrections back. Without this flag the run is a dry-run
        #[arg(long, default_value_t = false)]
        apply: bool,

        /// Preferred absorbing method for the delta
        #[arg(long, default_value = "mercadoPago")]
        method: String,

        /// Comma-separated movement types eligible for correction
        #[arg(long, default_value = "venta,compra")]
        types: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let store = JsonFileStore::new(&cli.input);
    let mut reconciler = Reconciler::new(store, cli.collection.clone());

    match cli.cmd {
        Commands::Audit => run_audit(&reconciler).await,
        Commands::Balances { as_of, method } => run_balances(&reconciler, as_of, method).await,
        Commands::Statement { method } => run_statement(&reconciler, &method).await,
        Commands::Fix {
            since,
            apply,
            method,
            types,
        } => run_fix(&mut reconciler, since, apply, method, &types).await,
    }
}

async fn run_audit(reconciler: &Reconciler<JsonFileStore>) -> Result<()> {
    let report = reconciler.audit().await.context("cannot read collection")?;

    println!("=== AUDIT: naive vs normalized ===");
    for (method, naive) in &report.naive {
        let normalized = &report.normalized[method];
        let delta = &report.deltas[method];
        println!("{method:>16}  naive={naive:>14}  normalized={normalized:>14}  delta={delta}");
    }

    if report.duplicate_groups.is_empty() {
        println!("\nNo duplicate groups found.");
    } else {
        println!("\nDuplicate groups: {}", report.duplicate_groups.len());
        for group in &report.duplicate_groups {
            let dropped: Vec<String> = group
                .dropped_ids
                .iter()
                .map(|id| id.clone().unwrap_or_else(|| "<unsaved>".to_string()))
                .collect();
            println!(
                "- {}  kept={}  dropped=[{}]",
                group.signature,
                group.kept_id.as_deref().unwrap_or("<unsaved>"),
                dropped.join(", ")
            );
        }
    }

    if !report.unallocated.is_empty() {
        println!("\nUnallocated movements (total > 0, no usable distribution):");
        for id in &report.unallocated {
            println!("- {}", id.as_deref().unwrap_or("<unsaved>"));
        }
    }
    Ok(())
}

async fn run_balances(
    reconciler: &Reconciler<JsonFileStore>,
    as_of: Option<NaiveDate>,
    method: Option<String>,
) -> Result<()> {
    let cutoff = end_of_day(as_of.unwrap_or_else(|| Utc::now().date_naive()))?;
    let movements = reconciler
        .load_normalized()
        .await
        .context("cannot read collection")?;

    let methods = match method {
        Some(code) => vec![code],
        None => movements_core::allocator::known_methods(&movements),
    };

    println!("=== BALANCES as of {} ===", cutoff.date_naive());
    for code in methods {
        let available = balance::balance_as_of(&movements, &code, cutoff);
        let net = balance::month_net(&movements, &code, cutoff.year(), cutoff.month());
        println!("{code:>16}  available={available:>14}  month-net={net}");
    }
    Ok(())
}

async fn run_statement(reconciler: &Reconciler<JsonFileStore>, method: &str) -> Result<()> {
    let rows = reconciler
        .monthly_statement(method)
        .await
        .context("cannot read collection")?;
    if rows.is_empty() {
        println!("No movements for method {method}.");
        return Ok(());
    }

    println!("=== STATEMENT: {method} ===");
    println!("{:>7}  {:>12}  {:>12}  {:>12}  {:>12}  {:>12}", "month", "opening", "inflow", "outflow", "net", "closing");
    for row in rows {
        println!(
            "{:>4}-{:02}  {:>12}  {:>12}  {:>12}  {:>12}  {:>12}",
            row.year, row.month, row.opening, row.inflow, row.outflow, row.net, row.closing
        );
    }
    Ok(())
}

async fn run_fix(
    reconciler: &mut Reconciler<JsonFileStore>,
    since: Option<NaiveDate>,
    apply: bool,
    method: String,
    types: &str,
) -> Result<()> {
    let since_date = since.unwrap_or_else(|| Utc::now().date_naive() - Duration::days(1));
    let since_instant = start_of_day(since_date)?;
    let kinds = parse_kinds(types)?;
    let engine = CorrectionEngine::new(method, kinds);

    println!("=== FIX PAYMENT DISTRIBUTIONS (dry-run={}) ===", !apply);
    println!(
        "since={since_date} method={} types={types}",
        engine.preferred_method
    );

    let plans = reconciler
        .plan_corrections(&engine, since_instant)
        .await
        .context("cannot read collection")?;
    if plans.is_empty() {
        println!("No drift to correct.");
        return Ok(());
    }

    println!("Movements with drift: {}", plans.len());
    for plan in &plans {
        println!(
            "- {}  total={} allocated={} delta={} -> {} goes {} => {}  [{}]",
            plan.movement_id,
            plan.total,
            plan.allocated,
            plan.delta,
            plan.method,
            plan.before,
            plan.after,
            payment_summary(&plan.allocations)
        );
    }

    if !apply {
        println!("\nDry-run finished. Re-run with --apply to commit.");
        return Ok(());
    }

    let outcome = reconciler.apply_corrections(&engine, &plans).await?;
    println!(
        "\nCorrections applied: {} ok, {} failed.",
        outcome.applied, outcome.failed
    );
    for failure in &outcome.failures {
        println!("- {} failed: {}", failure.movement_id, failure.error);
    }
    Ok(())
}

fn parse_kinds(types: &str) -> Result<Vec<MovementKind>> {
    let mut kinds = Vec::new();
    for code in types.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let kind = MovementKind::from_code(code);
        if kind == MovementKind::Unknown {
            bail!("unknown movement type: {code}");
        }
        kinds.push(kind);
    }
    if kinds.is_empty() {
        bail!("--types must name at least one movement type");
    }
    Ok(kinds)
}

fn start_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .context("invalid date")
}

fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_opt(23, 59, 59)
        .map(|naive| naive.and_utc())
        .context("invalid date")
}
