//! The migration ledger table.

/// Name of the ledger table, created in the session's current schema.
pub const LEDGER: &str = "__rekon_migrations";

/// SQL to create the ledger table if it does not exist.
pub fn create_meta_tables_sql() -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS "{LEDGER}" (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    summary TEXT
)"#
    )
}

/// SQL to record one applied migration. Parameters: id, name, summary.
pub fn record_migration_sql() -> String {
    format!(r#"INSERT INTO "{LEDGER}" (id, name, summary) VALUES ($1, $2, $3)"#)
}

/// SQL to list applied migrations in version order.
pub fn applied_migrations_sql() -> String {
    format!(r#"SELECT id, name, applied_at, summary FROM "{LEDGER}" ORDER BY id"#)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_sql() {
        insta::assert_snapshot!(create_meta_tables_sql(), @r#"
        CREATE TABLE IF NOT EXISTS "__rekon_migrations" (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            summary TEXT
        )
        "#);
        assert_eq!(
            record_migration_sql(),
            r#"INSERT INTO "__rekon_migrations" (id, name, summary) VALUES ($1, $2, $3)"#
        );
    }
}
