//! # cambio-db: SQLite Ledger Store
//!
//! Database access for the cash ledger. Every open, close, movement and
//! translated transaction runs in exactly one SQLite transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cash Ledger Data Flow                            │
//! │                                                                         │
//! │  HTTP handler / business ledger event                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     cambio-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ session.rs    │    │  (embedded)  │  │   │
//! │  │   │               │◄───│ ledger.rs     │    │ 001_cash_    │  │   │
//! │  │   │ SqlitePool    │    │ register.rs   │    │   ledger.sql │  │   │
//! │  │   │ Policy        │    │ activity.rs   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │            ▲                                                    │   │
//! │  │            └──── observer.rs (business transaction adapter)     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) ── triggers keep movements append-only                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Registers, sessions, ledger, activity
//! - [`observer`] - Business transaction → movements
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cambio_db::{config::LedgerConfig, Database};
//!
//! let db = Database::new(LedgerConfig::load()?.db_config()).await?;
//!
//! let session = db.sessions().open(&ctx, open_command).await?;
//! db.observer().on_transaction_completed(&ctx, &transaction).await?;
//! let closed = db.sessions().close(&ctx, &session.id, count).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod observer;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, LedgerConfig};
pub use error::{DbError, DbResult};
pub use observer::{TransactionObserver, TranslationOutcome};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::activity::ActivityRepository;
pub use repository::ledger::{BalanceAudit, LedgerRepository};
pub use repository::register::RegisterRepository;
pub use repository::session::SessionRepository;
