//! SQL text for each reconciliation statement.
//!
//! Every statement here is written so that re-running it converges: `IF NOT
//! EXISTS`, `IF EXISTS`, `IS NULL` predicates and `ON CONFLICT`. The one
//! exception is [`recreate_table_sql`], which is destructive on purpose.

use crate::{Column, Table, quote_ident};

/// Render a single column definition as it appears inside `CREATE TABLE` or
/// after `ADD COLUMN`.
pub fn column_definition_sql(col: &Column) -> String {
    column_definition(col, false)
}

fn column_definition(col: &Column, composite_pk: bool) -> String {
    let mut def = format!("{} {}", quote_ident(&col.name), col.pg_type);

    // Only inline PRIMARY KEY for single-column PKs
    if col.primary_key && !composite_pk {
        def.push_str(" PRIMARY KEY");
    }

    // PK columns are implicitly NOT NULL unless the key is a table constraint
    if !col.nullable && (!col.primary_key || composite_pk) {
        def.push_str(" NOT NULL");
    }

    if col.unique && !col.primary_key {
        def.push_str(" UNIQUE");
    }

    if let Some(default) = &col.default {
        def.push_str(&format!(" DEFAULT {}", default));
    }

    def
}

/// Generate a CREATE TABLE statement (no trailing semicolon).
pub fn create_table_sql(table: &Table) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", quote_ident(&table.name));

    let pk_columns: Vec<&str> = table
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.as_str())
        .collect();
    let composite_pk = pk_columns.len() > 1;

    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|col| format!("    {}", column_definition(col, composite_pk)))
        .collect();

    if composite_pk {
        let quoted: Vec<_> = pk_columns.iter().map(|c| quote_ident(c)).collect();
        parts.push(format!("    PRIMARY KEY ({})", quoted.join(", ")));
    }

    sql.push_str(&parts.join(",\n"));
    sql.push_str("\n)");
    sql
}

/// `DROP TABLE IF EXISTS ... CASCADE`, taking dependent objects with it.
pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(table))
}

/// Drop and recreate a table as one batch.
///
/// Sent through the simple query protocol, the two statements run as a single
/// implicit transaction, so a failing CREATE leaves the old table in place.
pub fn recreate_table_sql(table: &Table) -> String {
    format!(
        "{};\n{};",
        drop_table_sql(&table.name),
        create_table_sql(table)
    )
}

/// `ALTER TABLE ... ADD COLUMN IF NOT EXISTS ...`.
pub fn add_column_sql(table: &str, col: &Column) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}",
        quote_ident(table),
        column_definition_sql(col)
    )
}

/// Set `column` to `$1` on every row where it is NULL.
pub fn backfill_sql(table: &str, column: &str) -> String {
    let column = quote_ident(column);
    format!(
        "UPDATE {} SET {} = $1 WHERE {} IS NULL",
        quote_ident(table),
        column,
        column
    )
}

/// Insert-or-update keyed on `key`.
///
/// Parameters are `$1..$n` in `columns` order. Every non-key column is
/// overwritten from `EXCLUDED`. The statement returns two columns: the
/// resulting row as JSONB, and whether the row was freshly inserted.
pub fn upsert_sql(table: &str, columns: &[&str], key: &str) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();

    let mut updates: Vec<String> = columns
        .iter()
        .filter(|c| **c != key)
        .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
        .collect();
    // DO NOTHING would return no row, so a key-only upsert rewrites the key
    if updates.is_empty() {
        updates.push(format!("{} = EXCLUDED.{}", quote_ident(key), quote_ident(key)));
    }

    format!(
        "INSERT INTO {} AS \"target\" ({}) VALUES ({}) \
         ON CONFLICT ({}) DO UPDATE SET {} \
         RETURNING to_jsonb(\"target\") AS \"row\", (\"target\".xmax = 0) AS \"inserted\"",
        quote_ident(table),
        quoted.join(", "),
        placeholders.join(", "),
        quote_ident(key),
        updates.join(", ")
    )
}

/// Fetch one column of the row identified by `key = $1`.
pub fn select_by_key_sql(table: &str, column: &str, key: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = $1",
        quote_ident(column),
        quote_ident(table),
        quote_ident(key)
    )
}

/// `SELECT count(*)` over the whole table.
pub fn count_rows_sql(table: &str) -> String {
    format!("SELECT count(*) FROM {}", quote_ident(table))
}
