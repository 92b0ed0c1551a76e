//! # cambio-core: Pure Ledger Logic for the Exchange-Office Network
//!
//! This crate holds the cash ledger's rules as plain data and pure functions.
//! It never touches a database; `cambio-db` does.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cash Ledger Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            HTTP layer / business ledger (external)              │   │
//! │  │   open / close / record_movement, transaction-completed events  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ TenantContext + typed commands         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cambio-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌──────────────┐  ┌──────────┐ │   │
//! │  │   │   types   │  │   money   │  │reconciliation│  │translation│ │   │
//! │  │   │  Session  │  │   Money   │  │   Policy     │  │  drafts   │ │   │
//! │  │   │ Movement  │  │  (cents)  │  │   Report     │  │           │ │   │
//! │  │   └───────────┘  └───────────┘  └──────────────┘  └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO AMBIENT TENANT STATE               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   cambio-db (Storage Layer)                     │   │
//! │  │        SQLite ledger, repositories, transaction observer        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (Register, CashSession, CashMovement, ...) and commands
//! - [`money`] - Fixed-point money in minor units
//! - [`error`] - Domain error types and caller-facing kinds
//! - [`validation`] - Currency, amount and text rules
//! - [`reconciliation`] - Counted vs theoretical classification
//! - [`translation`] - Business transaction → movement planning
//!
//! ## Example Usage
//!
//! ```rust
//! use cambio_core::{CashCountStatus, Money, ReconciliationPolicy};
//!
//! let theoretical = Money::parse("120.00").unwrap();
//! let counted = Money::parse("115").unwrap();
//!
//! let difference = counted - theoretical;
//! assert_eq!(difference.cents(), -500);
//! assert_eq!(
//!     ReconciliationPolicy::default().classify(difference),
//!     CashCountStatus::Shortage
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod reconciliation;
pub mod translation;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use reconciliation::{CashCountStatus, ReconciliationPolicy, ReconciliationReport};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default reconciliation tolerance, in minor units.
///
/// One hundredth: only an exact count reads as balanced.
pub const DEFAULT_BALANCE_TOLERANCE_CENTS: i64 = 1;

/// Maximum length of opening/closing notes.
pub const MAX_NOTES_LENGTH: usize = 1000;

/// Maximum length of a movement description.
pub const MAX_DESCRIPTION_LENGTH: usize = 255;

/// Maximum length of a register name.
pub const MAX_NAME_LENGTH: usize = 100;
