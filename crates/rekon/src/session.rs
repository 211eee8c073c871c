//! Connection acquisition and release.

use crate::config::SCHEMA;
use crate::error::{Context, error_chain};
use crate::traced::{Connection, ConnectionExt};
use crate::{Error, Result, Settings, Target, TlsMode, tls};
use rekon_schema::quote_ident;
use std::future::Future;
use std::pin::Pin;
use tokio::task::JoinHandle;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row, Socket, Transaction};
use tracing::{debug, error, info, warn};

/// One live database connection.
///
/// Owns the client and the task driving the socket. The connection is
/// released when the session is dropped, on every path out of the owning
/// scope including `?` returns and panics; [`Session::close`] additionally
/// waits for the socket task to finish. There is no retry: a failed connect
/// is returned to the caller as-is.
pub struct Session {
    client: Client,
    driver: JoinHandle<()>,
    target: Target,
}

impl Session {
    /// Connect using `settings`, then apply the session settings.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let target = settings.target();
        info!(%target, "connecting");

        if settings.tls == TlsMode::InsecureAcceptAnyCert {
            warn!("TLS certificate verification is disabled for this connection");
        }

        let config = settings.pg_config();
        let (client, driver) = match tls::connector(settings.tls)? {
            Some(tls) => establish(config, tls).await,
            None => establish(config, tokio_postgres::NoTls).await,
        }
        .map_err(|e| Error::Connection {
            operation: "connect".into(),
            message: error_chain(&e),
        })?;

        let session = Self {
            client,
            driver,
            target,
        };

        session
            .traced()
            .batch_execute("SET client_min_messages TO WARNING")
            .await
            .context("configure session")?;
        if let Some(schema) = &settings.schema {
            session.use_schema(schema).await?;
        }

        debug!("connected");
        Ok(session)
    }

    /// Point `search_path` at `schema` and confirm it took effect.
    ///
    /// Postgres accepts a `search_path` naming a schema that does not exist,
    /// after which `current_schema()` is NULL and every table looks absent.
    async fn use_schema(&self, schema: &str) -> Result<()> {
        let sql = format!("SET search_path TO {}", quote_ident(schema));
        self.traced()
            .batch_execute(&sql)
            .await
            .context("set search_path")?;

        let current: Option<String> = self
            .traced()
            .query_one("SELECT current_schema()::text", &[])
            .await
            .context("check search_path")?
            .get(0);
        if current.as_deref() != Some(schema) {
            return Err(Error::Configuration(format!(
                "{SCHEMA}={schema:?} does not name a schema on this database"
            )));
        }
        Ok(())
    }

    /// Where this session is connected.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Start a transaction on this session.
    pub async fn transaction(&mut self) -> Result<Transaction<'_>> {
        self.client.transaction().await.context("begin transaction")
    }

    /// Close the connection and wait for the socket task to wind down.
    pub async fn close(self) {
        let Self { client, driver, .. } = self;
        drop(client);
        if let Err(e) = driver.await {
            error!(error = %e, "connection task failed");
        }
        info!("connection released");
    }
}

async fn establish<T>(
    config: &tokio_postgres::Config,
    tls: T,
) -> std::result::Result<(Client, JoinHandle<()>), tokio_postgres::Error>
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let (client, connection) = config.connect(tls).await?;
    let driver = tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "database connection error");
        }
    });
    Ok((client, driver))
}

type BoxFuture<'a, T> =
    Pin<Box<dyn Future<Output = std::result::Result<T, tokio_postgres::Error>> + Send + 'a>>;

impl Connection for Session {
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, u64> {
        Connection::execute(&self.client, sql, params)
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Vec<Row>> {
        Connection::query(&self.client, sql, params)
    }

    fn query_opt<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Option<Row>> {
        Connection::query_opt(&self.client, sql, params)
    }

    fn query_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Row> {
        Connection::query_one(&self.client, sql, params)
    }

    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, ()> {
        Connection::batch_execute(&self.client, sql)
    }
}
