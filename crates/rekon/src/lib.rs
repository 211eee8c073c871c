//! Idempotent schema reconciliation for Postgres.
//!
//! rekon applies small, declarative corrections to a live database: it
//! inspects the current schema, sends the minimal statement needed to reach
//! the desired state, and reports what it did.
//!
//! # Connecting
//!
//! ```ignore
//! let settings = rekon::Settings::from_env()?;
//! let session = rekon::Session::connect(&settings).await?;
//! ```
//!
//! `DATABASE_URL` is required; a missing value is a [`Error::Configuration`]
//! raised before any network I/O.
//!
//! # Actions
//!
//! ```ignore
//! let outcome = rekon::catalog::add_course_active().apply(&session).await?;
//! println!("{outcome}");
//! ```
//!
//! Adding a column, backfilling NULLs and upserting by key all converge:
//! running them again changes nothing. [`Action::Recreate`] drops the table
//! and is the one exception.
//!
//! # Migrations
//!
//! [`MigrationRunner`] applies the versioned [`catalog::migrations`] in order,
//! recording each in a ledger table in the same transaction. Destructive
//! migrations are refused unless explicitly allowed.

mod action;
pub mod catalog;
pub mod config;
mod error;
pub mod introspect;
pub mod meta;
mod migrate;
pub mod password;
mod report;
mod seed;
mod session;
mod tls;
mod traced;
mod value;

pub use action::{Action, Upsert};
pub use config::{AdminSeed, Settings, Target, TlsMode};
pub use error::Error;
pub use introspect::{ColumnDescriptor, SchemaDescriptor};
pub use migrate::{AppliedMigration, Migration, MigrationRunner, MigrationStatus, RanMigration};
pub use report::{MASK, Outcome, Status, mask_secrets};
pub use seed::{ADMIN_ROLE, admin_upsert, seed_admin};
pub use session::Session;
pub use traced::{Connection, ConnectionExt, TracedConn};
pub use value::Value;

// Re-export for callers that build their own tables.
pub use rekon_schema;

/// Result type for rekon operations.
pub type Result<T> = std::result::Result<T, Error>;
