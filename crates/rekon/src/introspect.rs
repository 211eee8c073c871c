//! Read-only schema introspection through `information_schema`.
//!
//! Everything here is scoped to `current_schema()`, i.e. the first schema on
//! the session's `search_path`. An absent table is a normal answer (an empty
//! descriptor), not an error; only transport failures are errors.

use crate::error::Context;
use crate::traced::{Connection, ConnectionExt};
use crate::Result;
use rekon_schema::{PgType, count_rows_sql};
use std::fmt;

/// One column as the database reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// `data_type` exactly as reported by `information_schema.columns`.
    pub data_type: String,
    /// The modelled type, if `data_type` is one rekon knows.
    pub pg_type: Option<PgType>,
    pub nullable: bool,
    pub default: Option<String>,
}

/// The columns currently present on one table, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl SchemaDescriptor {
    /// Whether introspection found the table at all.
    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

impl fmt::Display for SchemaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.exists() {
            return write!(f, "{}: (absent)", self.table);
        }
        writeln!(f, "{} ({} columns)", self.table, self.columns.len())?;
        for col in &self.columns {
            let mut attrs = Vec::new();
            if !col.nullable {
                attrs.push("NOT NULL".to_string());
            }
            if let Some(default) = &col.default {
                attrs.push(format!("DEFAULT {}", default));
            }
            let attrs = if attrs.is_empty() {
                String::new()
            } else {
                format!(" [{}]", attrs.join(", "))
            };
            writeln!(f, "    {}: {}{}", col.name, col.data_type, attrs)?;
        }
        Ok(())
    }
}

const COLUMNS_SQL: &str = "\
SELECT column_name::text, data_type::text, is_nullable::text, column_default::text
FROM   information_schema.columns
WHERE  table_schema = current_schema()
AND    table_name = $1
ORDER  BY ordinal_position";

const HAS_COLUMN_SQL: &str = "\
SELECT EXISTS (
    SELECT 1
    FROM   information_schema.columns
    WHERE  table_schema = current_schema()
    AND    table_name = $1
    AND    column_name = $2
)";

const TABLE_EXISTS_SQL: &str = "\
SELECT EXISTS (
    SELECT 1
    FROM   information_schema.tables
    WHERE  table_schema = current_schema()
    AND    table_name = $1
)";

/// Describe the columns of `table`. Empty when the table does not exist.
pub async fn describe<C: Connection>(conn: &C, table: &str) -> Result<SchemaDescriptor> {
    let rows = conn
        .traced()
        .query(COLUMNS_SQL, &[&table])
        .await
        .context(format!("introspect {}", table))?;

    let columns = rows
        .iter()
        .map(|row| {
            let data_type: String = row.get(1);
            ColumnDescriptor {
                name: row.get(0),
                pg_type: PgType::from_information_schema(&data_type),
                data_type,
                nullable: row.get::<_, String>(2) == "YES",
                default: row.get(3),
            }
        })
        .collect();

    Ok(SchemaDescriptor {
        table: table.to_owned(),
        columns,
    })
}

/// Whether `table.column` exists.
pub async fn has_column<C: Connection>(conn: &C, table: &str, column: &str) -> Result<bool> {
    let row = conn
        .traced()
        .query_one(HAS_COLUMN_SQL, &[&table, &column])
        .await
        .context(format!("introspect {}.{}", table, column))?;
    Ok(row.get(0))
}

/// Whether `table` exists in the current schema.
pub async fn table_exists<C: Connection>(conn: &C, table: &str) -> Result<bool> {
    let row = conn
        .traced()
        .query_one(TABLE_EXISTS_SQL, &[&table])
        .await
        .context(format!("introspect {}", table))?;
    Ok(row.get(0))
}

/// Number of rows in `table`. The table must exist.
pub async fn row_count<C: Connection>(conn: &C, table: &str) -> Result<u64> {
    let row = conn
        .traced()
        .query_one(&count_rows_sql(table), &[])
        .await
        .context(format!("count {}", table))?;
    Ok(row.get::<_, i64>(0) as u64)
}
