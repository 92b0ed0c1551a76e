//! # Demo Ledger Seeder
//!
//! Walks one register through a full trading day for development.
//!
//! ## Usage
//! ```bash
//! # Default database from CAMBIO_DB_PATH (./cambio.db)
//! cargo run -p cambio-db --bin seed
//!
//! # Custom database and number of trading rounds
//! cargo run -p cambio-db --bin seed -- --db ./data/demo.db --rounds 5
//! ```
//!
//! ## What It Does
//! 1. Creates a register in a demo shop
//! 2. Opens a session with a USD and CDF float
//! 3. Replays exchange, deposit and withdrawal transactions through the observer
//! 4. Closes with a count that is five dollars short
//! 5. Prints the reconciliation report

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cambio_core::{
    BusinessTransaction, CloseSession, Money, NewRegister, OpenSession, OperationType,
    TenantContext,
};
use cambio_db::{Database, LedgerConfig};

#[derive(Parser, Debug)]
#[command(name = "seed", about = "Seed a demo cash ledger", version)]
struct Args {
    /// Database file path (overrides CAMBIO_DB_PATH)
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Tenant that owns the demo shop
    #[arg(long, default_value = "demo-tenant")]
    tenant: String,

    /// Cashier operating the register
    #[arg(long, default_value = "demo-cashier")]
    cashier: String,

    /// Trading rounds (one exchange, deposit and withdrawal each)
    #[arg(short, long, default_value_t = 3)]
    rounds: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    let mut config = LedgerConfig::load()?;
    if let Some(path) = args.db {
        config.database_path = path;
    }

    println!("Cambio Ledger Seeder");
    println!("====================");
    println!("Database: {}", config.database_path.display());
    println!("Rounds:   {}", args.rounds);
    println!();

    let db = Database::new(config.db_config())
        .await
        .context("connecting to the ledger database")?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let ctx = TenantContext::new(args.tenant, args.cashier)?;
    let shop_id = format!("shop-{}", &Uuid::new_v4().to_string()[..8]);

    let register = db
        .registers()
        .create(
            &ctx,
            NewRegister {
                shop_id: shop_id.clone(),
                counter_id: Some("counter-1".to_string()),
                name: "Demo Till".to_string(),
            },
        )
        .await?;
    println!("✓ Register {} created in {}", register.id, shop_id);

    let session = db
        .sessions()
        .open(
            &ctx,
            OpenSession {
                register_id: register.id.clone(),
                opening_amounts: BTreeMap::from([
                    ("USD".to_string(), Money::from_major(100)),
                    ("CDF".to_string(), Money::from_major(1_000_000)),
                ]),
                notes: Some("Demo float".to_string()),
                work_shift_id: None,
            },
        )
        .await?;
    println!("✓ Session {} opened", session.id);

    let observer = db.observer();
    for round in 1..=args.rounds {
        for (op, from, amount_from, to, amount_to) in [
            (OperationType::Exchange, "USD", 100, "CDF", 280_000),
            (OperationType::Deposit, "USD", 50, "USD", 50),
            (OperationType::Withdrawal, "CDF", 20_000, "CDF", 20_000),
        ] {
            let transaction = BusinessTransaction {
                id: Uuid::new_v4().to_string(),
                operation_type: op,
                currency_from: from.to_string(),
                amount_from: Money::from_major(amount_from),
                currency_to: to.to_string(),
                amount_to: Money::from_major(amount_to),
                ticket_number: format!("T-{:03}-{}", round, op.as_str()),
                shop_id: Some(shop_id.clone()),
                register_id: Some(register.id.clone()),
                work_shift_id: None,
                performed_by: ctx.user_id.clone(),
            };

            let outcome = observer.on_transaction_completed(&ctx, &transaction).await?;
            println!(
                "  round {} {:<10} → {} movement(s)",
                round,
                op.as_str(),
                outcome.movements().len()
            );
        }
    }

    let ledger = db.ledger();
    let expected_usd = ledger.reconcile(&ctx, &register.id, "USD").await?;
    let expected_cdf = ledger.reconcile(&ctx, &register.id, "CDF").await?;

    println!();
    println!("Expected cash: {}", expected_usd.format_with("USD"));
    println!("               {}", expected_cdf.format_with("CDF"));

    db.sessions()
        .close(
            &ctx,
            &session.id,
            CloseSession {
                closing_amounts: BTreeMap::from([
                    ("USD".to_string(), expected_usd - Money::from_major(5)),
                    ("CDF".to_string(), expected_cdf),
                ]),
                notes: Some("Demo close".to_string()),
            },
        )
        .await?;
    println!("✓ Session closed");

    let report = db.sessions().report(&ctx, &session.id).await?;
    println!();
    println!("Reconciliation");
    for line in &report.lines {
        println!(
            "  {}  theoretical {:>14}  counted {:>14}  difference {:>10}  {:?}",
            line.currency, line.theoretical, line.real, line.difference, line.status
        );
    }
    if report.requires_attention() {
        println!("⚠ Session requires attention");
    }

    for currency in ["USD", "CDF"] {
        let audit = ledger.audit_balance(&ctx, &register.id, currency).await?;
        println!(
            "  audit {}: stored {} / recomputed {} {}",
            currency,
            audit.stored,
            audit.recomputed,
            if audit.is_consistent() { "✓" } else { "✗" }
        );
    }

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Initializes the tracing subscriber; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cambio=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
