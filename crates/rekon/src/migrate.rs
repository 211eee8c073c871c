//! Ledger-driven migration runner.
//!
//! A [`Migration`] is a versioned list of [`Action`]s. The runner records each
//! applied migration in the ledger table ([`crate::meta::LEDGER`]) in the same
//! transaction as its actions, so a migration is either fully applied and
//! recorded, or neither.

use crate::action::Action;
use crate::error::Context;
use crate::introspect;
use crate::meta::{LEDGER, applied_migrations_sql, create_meta_tables_sql, record_migration_sql};
use crate::report::Outcome;
use crate::traced::ConnectionExt;
use crate::{Error, Result, Session};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

/// A versioned set of actions.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Sortable version, e.g. `2025_01_14_101500-course-active`.
    pub version: &'static str,
    /// Short description.
    pub name: &'static str,
    pub actions: Vec<Action>,
}

impl Migration {
    pub fn new(version: &'static str, name: &'static str, actions: Vec<Action>) -> Self {
        Self {
            version,
            name,
            actions,
        }
    }

    /// Whether any action in this migration can discard data.
    pub fn is_destructive(&self) -> bool {
        self.actions.iter().any(Action::is_destructive)
    }
}

/// A row of the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: String,
    pub name: String,
    pub applied_at: DateTime<Utc>,
    pub summary: Option<String>,
}

/// Status of one known migration.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub version: &'static str,
    pub name: &'static str,
    pub destructive: bool,
    /// When it was applied, or `None` if pending.
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    pub fn applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// A migration applied by this run.
#[derive(Debug, Clone)]
pub struct RanMigration {
    pub version: &'static str,
    pub name: &'static str,
    pub outcomes: Vec<Outcome>,
}

/// Applies pending migrations in version order.
pub struct MigrationRunner<'a> {
    session: &'a mut Session,
    migrations: Vec<Migration>,
    allow_destructive: bool,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(session: &'a mut Session, migrations: Vec<Migration>) -> Self {
        Self {
            session,
            migrations,
            allow_destructive: false,
        }
    }

    /// Permit pending destructive migrations to run.
    pub fn allow_destructive(mut self, allow: bool) -> Self {
        self.allow_destructive = allow;
        self
    }

    /// Create the ledger table if it does not exist.
    pub async fn ensure_ledger(&self) -> Result<()> {
        self.session
            .traced()
            .batch_execute(&create_meta_tables_sql())
            .await
            .context("create ledger")
    }

    /// Everything recorded in the ledger, in version order.
    ///
    /// Read-only: a database without a ledger table has applied nothing.
    pub async fn applied(&self) -> Result<Vec<AppliedMigration>> {
        if !introspect::table_exists(&*self.session, LEDGER).await? {
            return Ok(Vec::new());
        }
        let rows = self
            .session
            .traced()
            .query(&applied_migrations_sql(), &[])
            .await
            .context("read ledger")?;
        Ok(rows
            .iter()
            .map(|row| AppliedMigration {
                version: row.get(0),
                name: row.get(1),
                applied_at: row.get(2),
                summary: row.get(3),
            })
            .collect())
    }

    /// Status of every known migration, in version order.
    pub async fn status(&self) -> Result<Vec<MigrationStatus>> {
        let applied = self.applied().await?;
        Ok(self
            .sorted()?
            .into_iter()
            .map(|m| MigrationStatus {
                version: m.version,
                name: m.name,
                destructive: m.is_destructive(),
                applied_at: applied
                    .iter()
                    .find(|a| a.version == m.version)
                    .map(|a| a.applied_at),
            })
            .collect())
    }

    /// Apply every pending migration. Returns the migrations applied by this run.
    ///
    /// Without [`allow_destructive`](Self::allow_destructive), nothing is
    /// applied if any pending migration is destructive.
    pub async fn migrate(self) -> Result<Vec<RanMigration>> {
        let applied: HashSet<String> = self
            .applied()
            .await?
            .into_iter()
            .map(|a| a.version)
            .collect();

        let pending: Vec<&Migration> = self
            .sorted()?
            .into_iter()
            .filter(|m| !applied.contains(m.version))
            .collect();

        if pending.is_empty() {
            info!("no pending migrations");
            return Ok(Vec::new());
        }

        if !self.allow_destructive {
            if let Some(m) = pending.iter().find(|m| m.is_destructive()) {
                return Err(Error::DestructiveRefused {
                    version: m.version.to_owned(),
                });
            }
        }

        self.ensure_ledger().await?;
        let pending: Vec<Migration> = pending.into_iter().cloned().collect();
        let mut ran = Vec::with_capacity(pending.len());
        for migration in pending {
            ran.push(apply_migration(&mut *self.session, migration).await?);
        }
        Ok(ran)
    }

    fn sorted(&self) -> Result<Vec<&Migration>> {
        let mut sorted: Vec<&Migration> = self.migrations.iter().collect();
        sorted.sort_by_key(|m| m.version);
        if let Some(pair) = sorted.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(Error::InvalidAction {
                action: format!("migration {}", pair[0].version),
                reason: "version is registered twice".into(),
            });
        }
        Ok(sorted)
    }
}

async fn apply_migration(session: &mut Session, migration: Migration) -> Result<RanMigration> {
    info!(version = migration.version, name = migration.name, "applying migration");

    let tx = session.transaction().await?;
    let mut outcomes = Vec::with_capacity(migration.actions.len());
    for action in &migration.actions {
        outcomes.push(action.apply(&tx).await?);
    }

    let summary = outcomes
        .iter()
        .map(Outcome::summary)
        .collect::<Vec<_>>()
        .join("; ");
    tx.traced()
        .execute(
            &record_migration_sql(),
            &[&migration.version, &migration.name, &summary],
        )
        .await
        .context(format!("record migration {}", migration.version))?;
    tx.commit()
        .await
        .context(format!("commit migration {}", migration.version))?;
    debug!(version = migration.version, "recorded");

    Ok(RanMigration {
        version: migration.version,
        name: migration.name,
        outcomes,
    })
}
