//! The platform's concrete reconciliations.
//!
//! Each standalone executable applies one of these actions directly; `rekon
//! migrate` applies [`migrations`] through the ledger.

use crate::action::Action;
use crate::migrate::Migration;
use crate::Value;
use rekon_schema::{Column, PgType, Table};

pub const COURSES: &str = "courses";
pub const LEADS: &str = "leads";
pub const USERS: &str = "users";

/// `courses.is_active`: courses are visible unless switched off.
pub fn course_active_column() -> Column {
    Column::new("is_active", PgType::Boolean).default_expr("true")
}

/// Add `courses.is_active`. Rows that exist when the column is added read `true`.
pub fn add_course_active() -> Action {
    Action::AddColumn {
        table: COURSES.into(),
        column: course_active_column(),
    }
}

/// Set `courses.is_active` on rows where it is still NULL.
pub fn backfill_course_active() -> Action {
    Action::Backfill {
        table: COURSES.into(),
        column: course_active_column().name,
        value: Value::Bool(true),
    }
}

/// Contact-form leads, as the API writes them.
pub fn leads_table() -> Table {
    Table::new(
        LEADS,
        vec![
            Column::new("id", PgType::Serial).primary_key(),
            Column::new("email", PgType::Text).not_null(),
            Column::new("name", PgType::Text),
            Column::new("phone", PgType::Text),
            Column::new("course_interest", PgType::Text),
            Column::new("source", PgType::Text),
            Column::new("experience", PgType::Text),
            Column::new("message", PgType::Text),
            Column::new("current_location", PgType::Text),
            Column::new("quiz_results", PgType::Jsonb),
            Column::new("created_at", PgType::Timestamptz)
                .not_null()
                .default_expr("now()"),
        ],
    )
}

/// Drop and recreate `leads` with [`leads_table`]'s columns. Discards every lead.
pub fn recreate_leads() -> Action {
    Action::Recreate(leads_table())
}

/// Accounts. The admin seed upserts into this table keyed on `email`.
pub fn users_table() -> Table {
    Table::new(
        USERS,
        vec![
            Column::new("id", PgType::Serial).primary_key(),
            Column::new("email", PgType::Text).not_null().unique(),
            Column::new("password", PgType::Text).not_null(),
            Column::new("name", PgType::Text),
            Column::new("role", PgType::Text)
                .not_null()
                .default_expr("'user'"),
            Column::new("created_at", PgType::Timestamptz)
                .not_null()
                .default_expr("now()"),
        ],
    )
}

/// Every ledger migration, in version order.
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            "2025_01_14_101500-course-active",
            "add courses.is_active",
            vec![add_course_active(), backfill_course_active()],
        ),
        Migration::new(
            "2025_01_20_093000-recreate-leads",
            "recreate leads with contact-form columns",
            vec![recreate_leads()],
        ),
    ]
}
