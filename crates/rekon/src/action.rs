//! Reconciliation actions.
//!
//! An [`Action`] is a declarative description of a desired state. Applying it
//! introspects the current state, sends the minimal corrective statement, and
//! returns an [`Outcome`]. Every action except [`Action::Recreate`] converges:
//! applying it twice leaves the database as applying it once does.

use crate::error::Context;
use crate::introspect;
use crate::report::{Outcome, Status};
use crate::traced::{Connection, ConnectionExt};
use crate::{Error, Result, Value};
use rekon_schema::{Column, Table, add_column_sql, backfill_sql, recreate_table_sql, upsert_sql};
use tokio_postgres::types::ToSql;
use tracing::{debug, info, warn};

/// A single reconciliation step.
#[derive(Debug, Clone)]
pub enum Action {
    /// Add `column` to `table` unless a column of that name already exists.
    AddColumn { table: String, column: Column },
    /// Drop `table` (with dependents) and create it again, empty. Destructive.
    Recreate(Table),
    /// Set `column` to `value` on every row where it is NULL.
    Backfill {
        table: String,
        column: String,
        value: Value,
    },
    /// Insert a row, or update the existing row with the same key.
    Upsert(Upsert),
}

/// A keyed insert-or-update.
#[derive(Debug, Clone)]
pub struct Upsert {
    pub table: String,
    /// The unique column the conflict is detected on. Must appear in `values`.
    pub key: String,
    /// Column/value pairs, written in this order.
    pub values: Vec<(String, Value)>,
}

impl Upsert {
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            values: Vec::new(),
        }
    }

    /// Add a column value.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidAction {
            action: format!("upsert {}", self.table),
            reason,
        };
        if !self.values.iter().any(|(c, _)| *c == self.key) {
            return Err(invalid(format!("key column {} has no value", self.key)));
        }
        for (i, (column, _)) in self.values.iter().enumerate() {
            if self.values[..i].iter().any(|(c, _)| c == column) {
                return Err(invalid(format!("column {} is set twice", column)));
            }
        }
        Ok(())
    }
}

impl Action {
    /// The table this action targets.
    pub fn table(&self) -> &str {
        match self {
            Action::AddColumn { table, .. } | Action::Backfill { table, .. } => table,
            Action::Recreate(t) => &t.name,
            Action::Upsert(u) => &u.table,
        }
    }

    /// Human-readable label, also used as the operation name in errors.
    pub fn label(&self) -> String {
        match self {
            Action::AddColumn { table, column } => {
                format!("add column {}.{}", table, column.name)
            }
            Action::Recreate(t) => format!("recreate {}", t.name),
            Action::Backfill { table, column, .. } => format!("backfill {}.{}", table, column),
            Action::Upsert(u) => format!("upsert {}", u.table),
        }
    }

    /// Whether applying this action can discard data.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Action::Recreate(_))
    }

    /// Apply the action over `conn`.
    pub async fn apply<C: Connection>(&self, conn: &C) -> Result<Outcome> {
        let label = self.label();
        debug!(action = %label, "applying");

        let (status, rows_affected, row) = match self {
            Action::AddColumn { table, column } => {
                if introspect::has_column(conn, table, &column.name).await? {
                    debug!(action = %label, "column already present");
                    (Status::Unchanged, 0, None)
                } else {
                    conn.traced()
                        .execute(&add_column_sql(table, column), &[])
                        .await
                        .context(&label)?;
                    (Status::Applied, 0, None)
                }
            }
            Action::Recreate(table) => {
                let discarded = if introspect::table_exists(conn, &table.name).await? {
                    introspect::row_count(conn, &table.name).await?
                } else {
                    0
                };
                if discarded > 0 {
                    warn!(table = %table.name, rows = discarded, "dropping table with data");
                }
                conn.traced()
                    .batch_execute(&recreate_table_sql(table))
                    .await
                    .context(&label)?;
                (Status::Applied, discarded, None)
            }
            Action::Backfill {
                table,
                column,
                value,
            } => {
                let n = conn
                    .traced()
                    .execute(&backfill_sql(table, column), &[value])
                    .await
                    .context(&label)?;
                let status = if n > 0 {
                    Status::Applied
                } else {
                    Status::Unchanged
                };
                (status, n, None)
            }
            Action::Upsert(upsert) => {
                upsert.validate()?;
                let columns: Vec<&str> = upsert.values.iter().map(|(c, _)| c.as_str()).collect();
                let params: Vec<&(dyn ToSql + Sync)> = upsert
                    .values
                    .iter()
                    .map(|(_, v)| v as &(dyn ToSql + Sync))
                    .collect();
                let returned = conn
                    .traced()
                    .query_one(&upsert_sql(&upsert.table, &columns, &upsert.key), &params)
                    .await
                    .context(&label)?;
                let row: serde_json::Value = returned.get("row");
                let inserted: bool = returned.get("inserted");
                let status = if inserted {
                    Status::Inserted
                } else {
                    Status::Updated
                };
                (status, 1, Some(row))
            }
        };

        let columns = introspect::describe(conn, self.table()).await?.column_names();
        info!(action = %label, %status, rows = rows_affected, "done");

        let outcome = Outcome {
            action: label,
            table: self.table().to_owned(),
            status,
            rows_affected,
            columns,
            row: None,
        };
        Ok(match row {
            Some(row) => outcome.with_row(row),
            None => outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekon_schema::PgType;

    #[test]
    fn test_labels() {
        let add = Action::AddColumn {
            table: "courses".into(),
            column: Column::new("is_active", PgType::Boolean).default_expr("true"),
        };
        assert_eq!(add.label(), "add column courses.is_active");
        assert_eq!(add.table(), "courses");
        assert!(!add.is_destructive());

        let recreate = Action::Recreate(Table::new(
            "leads",
            vec![Column::new("id", PgType::Serial).primary_key()],
        ));
        assert_eq!(recreate.label(), "recreate leads");
        assert!(recreate.is_destructive());

        let upsert = Action::Upsert(Upsert::new("users", "username").set("username", "a@b.c"));
        assert_eq!(upsert.label(), "upsert users");
        assert!(!upsert.is_destructive());
    }

    #[test]
    fn test_upsert_requires_key_value() {
        let upsert = Upsert::new("users", "username").set("role", "admin");
        let err = upsert.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid action upsert users: key column username has no value"
        );
    }

    #[test]
    fn test_upsert_rejects_duplicate_columns() {
        let upsert = Upsert::new("users", "username")
            .set("username", "a@b.c")
            .set("role", "admin")
            .set("role", "user");
        assert!(matches!(
            upsert.validate(),
            Err(Error::InvalidAction { .. })
        ));
    }
}
