//! Outcome reports.

use owo_colors::OwoColorize;
use std::fmt;

/// Shown in place of secret field values.
pub const MASK: &str = "***";

/// Field names whose values never appear in a report.
const SECRET_FIELDS: &[&str] = &["password", "password_hash", "token", "secret"];

/// What an action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The corrective statement ran and changed the catalog or the data.
    Applied,
    /// The desired state already held; nothing was sent but introspection.
    Unchanged,
    /// An upsert created its row.
    Inserted,
    /// An upsert found its row and overwrote the mutable fields.
    Updated,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Applied => "applied",
            Status::Unchanged => "unchanged",
            Status::Inserted => "inserted",
            Status::Updated => "updated",
        }
    }

    /// Whether the action changed anything.
    pub fn is_change(&self) -> bool {
        !matches!(self, Status::Unchanged)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of applying one action.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Human-readable action label, e.g. `add column courses.is_active`.
    pub action: String,
    pub table: String,
    pub status: Status,
    pub rows_affected: u64,
    /// Columns of `table` after the action, in ordinal order.
    pub columns: Vec<String>,
    /// For upserts, the resulting row with secret fields masked.
    pub row: Option<serde_json::Value>,
}

impl Outcome {
    /// Set the resulting row, masking secret fields.
    pub fn with_row(mut self, row: serde_json::Value) -> Self {
        self.row = Some(mask_secrets(row));
        self
    }

    /// One-line summary without colour, for logs and the ledger.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} ({} rows affected)",
            self.action, self.status, self.rows_affected
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            Status::Unchanged => self.status.as_str().dimmed().to_string(),
            _ => self.status.as_str().green().to_string(),
        };
        writeln!(f, "{} {}", self.action.bold(), status)?;
        writeln!(f, "  rows affected: {}", self.rows_affected)?;
        writeln!(f, "  columns of {}: {}", self.table, self.columns.join(", "))?;
        if let Some(row) = &self.row {
            writeln!(f, "  row: {}", row)?;
        }
        Ok(())
    }
}

/// Replace the values of secret fields in a JSON object with [`MASK`].
pub fn mask_secrets(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    if SECRET_FIELDS.contains(&k.as_str()) && !v.is_null() {
                        (k, serde_json::Value::String(MASK.into()))
                    } else {
                        (k, v)
                    }
                })
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mask_secrets() {
        let masked = mask_secrets(json!({
            "id": 1,
            "username": "admin@x.com",
            "password": "$argon2id$v=19$m=19456,t=2,p=1$abc$def",
            "token": null,
        }));
        assert_eq!(
            masked,
            json!({
                "id": 1,
                "username": "admin@x.com",
                "password": "***",
                "token": null,
            })
        );
    }

    #[test]
    fn test_with_row_masks() {
        let outcome = Outcome {
            action: "upsert users".into(),
            table: "users".into(),
            status: Status::Inserted,
            rows_affected: 1,
            columns: vec!["id".into(), "username".into(), "password".into()],
            row: None,
        }
        .with_row(json!({"id": 1, "password": "hash"}));
        assert_eq!(outcome.row, Some(json!({"id": 1, "password": "***"})));
        assert_eq!(outcome.summary(), "upsert users: inserted (1 rows affected)");
    }

    #[test]
    fn test_status() {
        assert!(Status::Applied.is_change());
        assert!(Status::Updated.is_change());
        assert!(!Status::Unchanged.is_change());
    }
}
