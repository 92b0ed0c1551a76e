//! # Repository Module
//!
//! Database repository implementations for the cash ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Caller                                                                │
//! │       │  db.sessions().open(&ctx, command)                             │
//! │       ▼                                                                 │
//! │  SessionRepository ──┐                                                 │
//! │  LedgerRepository  ──┼── pub(crate) helpers taking &mut SqliteConnection│
//! │  RegisterRepository ─┤   so one sqlx::Transaction spans several tables │
//! │  ActivityRepository ─┘                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Every query filters on tenant_id from the caller's TenantContext.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`RegisterRepository`](register::RegisterRepository) - Cash drawers
//! - [`SessionRepository`](session::SessionRepository) - Open, close, session reads
//! - [`LedgerRepository`](ledger::LedgerRepository) - Movements and balances
//! - [`ActivityRepository`](activity::ActivityRepository) - Audit feed

pub mod activity;
pub mod ledger;
pub mod register;
pub mod session;
