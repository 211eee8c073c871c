//! Reconciliation actions against a real Postgres.
//!
//! Run with: cargo nextest run -p rekon --test reconcile
//!
//! Needs Docker, or `REKON_TEST_DATABASE_URL` pointing at a database the
//! tests may create schemas in.

mod common;

use common::test_db;
use rekon::catalog::{self, COURSES, LEADS, USERS};
use rekon::config::{DATABASE_URL, SCHEMA, TLS_MODE};
use rekon::rekon_schema::create_table_sql;
use rekon::{Action, AdminSeed, Error, Session, Settings, Status, Upsert, Value, introspect};

async fn create_courses(session: &Session) {
    session
        .client()
        .batch_execute(
            "CREATE TABLE courses (id SERIAL PRIMARY KEY, title TEXT NOT NULL);
             INSERT INTO courses (title) VALUES ('Rust 101'), ('Postgres in depth');",
        )
        .await
        .unwrap();
}

async fn count(session: &Session, sql: &str) -> i64 {
    session.client().query_one(sql, &[]).await.unwrap().get(0)
}

async fn stored_hash(session: &Session) -> String {
    session
        .client()
        .query_one("SELECT password FROM users WHERE email = 'admin@x.com'", &[])
        .await
        .unwrap()
        .get(0)
}

#[tokio::test]
async fn add_course_active_is_idempotent() {
    let Some(db) = test_db("add_column").await else {
        return;
    };
    let session = db.connect().await;
    create_courses(&session).await;

    let first = catalog::add_course_active().apply(&session).await.unwrap();
    assert_eq!(first.status, Status::Applied);
    assert_eq!(first.columns, vec!["id", "title", "is_active"]);

    // Rows that existed before the column was added read true
    let active = count(&session, "SELECT count(*) FROM courses WHERE is_active").await;
    assert_eq!(active, 2);

    let before = introspect::describe(&session, COURSES).await.unwrap();
    let second = catalog::add_course_active().apply(&session).await.unwrap();
    assert_eq!(second.status, Status::Unchanged);
    assert_eq!(second.rows_affected, 0);
    let after = introspect::describe(&session, COURSES).await.unwrap();
    assert_eq!(before, after);

    let col = after.column("is_active").unwrap();
    assert_eq!(col.data_type, "boolean");
    assert!(col.nullable);
    assert_eq!(col.default.as_deref(), Some("true"));

    session.close().await;
}

#[tokio::test]
async fn backfill_converges() {
    let Some(db) = test_db("backfill").await else {
        return;
    };
    let session = db.connect().await;
    create_courses(&session).await;
    catalog::add_course_active().apply(&session).await.unwrap();
    session
        .client()
        .batch_execute(
            "INSERT INTO courses (title, is_active) VALUES ('Draft A', NULL), ('Draft B', NULL)",
        )
        .await
        .unwrap();

    let first = catalog::backfill_course_active().apply(&session).await.unwrap();
    assert_eq!(first.status, Status::Applied);
    assert_eq!(first.rows_affected, 2);

    let second = catalog::backfill_course_active().apply(&session).await.unwrap();
    assert_eq!(second.status, Status::Unchanged);
    assert_eq!(second.rows_affected, 0);

    let nulls = count(&session, "SELECT count(*) FROM courses WHERE is_active IS NULL").await;
    assert_eq!(nulls, 0);

    session.close().await;
}

#[tokio::test]
async fn recreate_leads_discards_rows() {
    let Some(db) = test_db("recreate").await else {
        return;
    };
    let session = db.connect().await;
    session
        .client()
        .batch_execute(
            "CREATE TABLE leads (id SERIAL PRIMARY KEY, email TEXT, legacy_notes TEXT);
             INSERT INTO leads (email) VALUES ('a@x.com'), ('b@x.com');",
        )
        .await
        .unwrap();

    let first = catalog::recreate_leads().apply(&session).await.unwrap();
    assert_eq!(first.status, Status::Applied);
    assert_eq!(first.rows_affected, 2);
    assert_eq!(
        first.columns,
        vec![
            "id",
            "email",
            "name",
            "phone",
            "course_interest",
            "source",
            "experience",
            "message",
            "current_location",
            "quiz_results",
            "created_at",
        ]
    );
    assert_eq!(introspect::row_count(&session, LEADS).await.unwrap(), 0);

    // Rows inserted between runs are gone after the next run
    session
        .client()
        .batch_execute("INSERT INTO leads (email, quiz_results) VALUES ('c@x.com', '{\"score\": 3}')")
        .await
        .unwrap();
    let second = catalog::recreate_leads().apply(&session).await.unwrap();
    assert_eq!(second.rows_affected, 1);
    assert_eq!(introspect::row_count(&session, LEADS).await.unwrap(), 0);

    session.close().await;
}

#[tokio::test]
async fn recreate_creates_missing_table() {
    let Some(db) = test_db("recreate_missing").await else {
        return;
    };
    let session = db.connect().await;
    assert!(!introspect::table_exists(&session, LEADS).await.unwrap());

    let outcome = catalog::recreate_leads().apply(&session).await.unwrap();
    assert_eq!(outcome.rows_affected, 0);
    assert!(introspect::table_exists(&session, LEADS).await.unwrap());

    session.close().await;
}

#[tokio::test]
async fn seed_admin_upserts_one_row() {
    let Some(db) = test_db("seed_admin").await else {
        return;
    };
    let session = db.connect().await;
    session
        .client()
        .batch_execute(&create_table_sql(&catalog::users_table()))
        .await
        .unwrap();

    let seed = |password: &str| AdminSeed {
        email: "admin@x.com".into(),
        password: password.into(),
        name: Some("Admin".into()),
    };

    let first = rekon::seed_admin(&session, &seed("first")).await.unwrap();
    assert_eq!(first.status, Status::Inserted);
    let row = first.row.as_ref().unwrap();
    assert_eq!(row["email"], "admin@x.com");
    assert_eq!(row["role"], "admin");
    assert_eq!(row["password"], rekon::MASK);
    let hash_after_first = stored_hash(&session).await;
    assert!(rekon::password::verify("first", &hash_after_first));

    let second = rekon::seed_admin(&session, &seed("first")).await.unwrap();
    assert_eq!(second.status, Status::Updated);
    assert_eq!(stored_hash(&session).await, hash_after_first);

    let third = rekon::seed_admin(&session, &seed("second")).await.unwrap();
    assert_eq!(third.status, Status::Updated);
    let hash_after_third = stored_hash(&session).await;
    assert!(rekon::password::verify("second", &hash_after_third));
    assert!(!rekon::password::verify("first", &hash_after_third));

    assert_eq!(count(&session, "SELECT count(*) FROM users").await, 1);
    assert_eq!(
        count(&session, "SELECT count(*) FROM users WHERE role = 'admin'").await,
        1
    );

    session.close().await;
}

#[tokio::test]
async fn upsert_same_key_keeps_one_row() {
    let Some(db) = test_db("upsert").await else {
        return;
    };
    let session = db.connect().await;
    session
        .client()
        .batch_execute(&create_table_sql(&catalog::users_table()))
        .await
        .unwrap();

    let upsert = |name: &str| {
        Action::Upsert(
            Upsert::new(USERS, "email")
                .set("email", "jo@x.com")
                .set("password", "not-a-hash")
                .set("name", name),
        )
    };
    let first = upsert("Jo").apply(&session).await.unwrap();
    assert_eq!(first.status, Status::Inserted);
    let second = upsert("Joanna").apply(&session).await.unwrap();
    assert_eq!(second.status, Status::Updated);
    assert_eq!(second.row.as_ref().unwrap()["name"], "Joanna");
    assert_eq!(second.row.as_ref().unwrap()["id"], first.row.as_ref().unwrap()["id"]);
    assert_eq!(count(&session, "SELECT count(*) FROM users").await, 1);

    session.close().await;
}

#[tokio::test]
async fn not_null_violation_is_constraint_error() {
    let Some(db) = test_db("constraint").await else {
        return;
    };
    let session = db.connect().await;
    session
        .client()
        .batch_execute(&create_table_sql(&catalog::users_table()))
        .await
        .unwrap();

    let err = Action::Upsert(
        Upsert::new(USERS, "email")
            .set("email", "x@y.z")
            .set("password", Value::Null),
    )
    .apply(&session)
    .await
    .unwrap_err();
    match err {
        Error::ConstraintViolation { operation, .. } => assert_eq!(operation, "upsert users"),
        other => panic!("expected constraint violation, got {other:?}"),
    }

    session.close().await;
}

#[tokio::test]
async fn add_column_to_missing_table_is_schema_conflict() {
    let Some(db) = test_db("missing_table").await else {
        return;
    };
    let session = db.connect().await;

    let described = introspect::describe(&session, COURSES).await.unwrap();
    assert!(!described.exists());

    let err = catalog::add_course_active().apply(&session).await.unwrap_err();
    match err {
        Error::SchemaConflict {
            operation, code, ..
        } => {
            assert_eq!(operation, "add column courses.is_active");
            assert_eq!(code, "42P01");
        }
        other => panic!("expected schema conflict, got {other:?}"),
    }

    session.close().await;
}

#[tokio::test]
async fn backfill_with_wrong_value_type_is_schema_conflict() {
    let Some(db) = test_db("wrong_type").await else {
        return;
    };
    let session = db.connect().await;
    create_courses(&session).await;
    catalog::add_course_active().apply(&session).await.unwrap();

    let err = Action::Backfill {
        table: COURSES.into(),
        column: "is_active".into(),
        value: Value::text("yes"),
    }
    .apply(&session)
    .await
    .unwrap_err();
    match err {
        Error::SchemaConflict {
            operation,
            code,
            message,
        } => {
            assert_eq!(operation, "backfill courses.is_active");
            assert_eq!(code, "42804");
            assert!(message.starts_with("error serializing parameter 0: "), "{message}");
            assert!(message.contains("bool"), "{message}");
        }
        other => panic!("expected schema conflict, got {other:?}"),
    }

    session.close().await;
}

#[tokio::test]
async fn unknown_schema_is_configuration_error() {
    let Some(db) = test_db("unknown_schema").await else {
        return;
    };
    let settings = Settings::from_lookup(|key| match key {
        DATABASE_URL => Some(db.url.clone()),
        TLS_MODE => Some("disable".into()),
        SCHEMA => Some("rekon_test_unknown_schemaa".into()),
        _ => None,
    })
    .unwrap();

    let err = Session::connect(&settings).await.err().unwrap();
    match err {
        Error::Configuration(message) => {
            assert!(message.starts_with("REKON_SCHEMA="), "{message}")
        }
        other => panic!("expected configuration error, got {other:?}"),
    }

    // The correctly spelled schema still connects
    db.connect().await.close().await;
}

#[tokio::test]
async fn unreachable_host_is_connection_error() {
    let settings = Settings::from_lookup(|key| match key {
        DATABASE_URL => Some("postgres://nobody@127.0.0.1:1/nothing".into()),
        TLS_MODE => Some("disable".into()),
        _ => None,
    })
    .unwrap();
    let err = Session::connect(&settings).await.err().unwrap();
    assert!(matches!(err, Error::Connection { .. }), "{err:?}");
}

#[tokio::test]
async fn missing_database_url_fails_before_connecting() {
    let err = Settings::from_lookup(|_| None).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}
