//! Shared Postgres setup for integration tests.
//!
//! Uses `REKON_TEST_DATABASE_URL` when set, otherwise starts a throwaway
//! container. When neither is possible (no Docker), tests skip.

#![allow(dead_code)]

use rekon::config::{DATABASE_URL, SCHEMA, TLS_MODE};
use rekon::{Session, Settings};
use std::collections::HashMap;
use std::time::Duration;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio_postgres::NoTls;

pub struct TestDb {
    pub url: String,
    pub settings: Settings,
    _container: Option<ContainerAsync<Postgres>>,
}

impl TestDb {
    pub async fn connect(&self) -> Session {
        Session::connect(&self.settings)
            .await
            .expect("failed to connect to test database")
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rekon=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Prepare an empty schema named after the test, or `None` to skip.
pub async fn test_db(name: &str) -> Option<TestDb> {
    init_tracing();

    let (url, container) = match std::env::var("REKON_TEST_DATABASE_URL") {
        Ok(url) => (url, None),
        Err(_) => match Postgres::default().start().await {
            Ok(container) => {
                let host = container.get_host().await.ok()?;
                let port = container.get_host_port_ipv4(5432).await.ok()?;
                let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");
                (url, Some(container))
            }
            Err(e) => {
                eprintln!("skipping {name}: no REKON_TEST_DATABASE_URL and no docker ({e})");
                return None;
            }
        },
    };

    let schema = format!("rekon_test_{name}");
    let client = connect_with_retry(&url).await;
    client
        .batch_execute(&format!(
            "DROP SCHEMA IF EXISTS \"{schema}\" CASCADE; CREATE SCHEMA \"{schema}\";"
        ))
        .await
        .expect("failed to create test schema");

    let vars: HashMap<&str, String> = [
        (DATABASE_URL, url.clone()),
        (TLS_MODE, "disable".to_string()),
        (SCHEMA, schema),
    ]
    .into_iter()
    .collect();
    let settings = Settings::from_lookup(|key| vars.get(key).cloned()).expect("valid settings");

    Some(TestDb {
        url,
        settings,
        _container: container,
    })
}

async fn connect_with_retry(url: &str) -> tokio_postgres::Client {
    let mut attempts = 0;
    loop {
        match tokio_postgres::connect(url, NoTls).await {
            Ok((client, connection)) => {
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        eprintln!("test setup connection error: {e}");
                    }
                });
                return client;
            }
            Err(e) if attempts < 20 => {
                attempts += 1;
                eprintln!("postgres not ready ({e}), retrying");
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
            Err(e) => panic!("failed to connect to postgres: {e}"),
        }
    }
}
