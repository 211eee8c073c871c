//! Settings read from the process environment.
//!
//! `DATABASE_URL` is the single source of truth for where to connect. A
//! `.env` file in the working directory is loaded first, so operators can
//! keep credentials out of their shell history and out of source.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::config::{Host, SslMode};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const TLS_MODE: &str = "REKON_TLS";
pub const SCHEMA: &str = "REKON_SCHEMA";
pub const CONNECT_TIMEOUT: &str = "REKON_CONNECT_TIMEOUT_SECS";
pub const ADMIN_EMAIL: &str = "ADMIN_EMAIL";
pub const ADMIN_PASSWORD: &str = "ADMIN_PASSWORD";
pub const ADMIN_NAME: &str = "ADMIN_NAME";

/// Transport security for the database connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Plain TCP.
    Disable,
    /// TLS as negotiated by the URL's `sslmode`, certificates verified
    /// against the Mozilla root set.
    #[default]
    Verify,
    /// TLS with certificate and hostname checks turned off. Anyone on the
    /// path can impersonate the server; only for hosted instances with
    /// self-signed certificates, and only when asked for by name.
    InsecureAcceptAnyCert,
}

impl FromStr for TlsMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "disable" | "off" => Ok(TlsMode::Disable),
            "" | "verify" => Ok(TlsMode::Verify),
            "insecure-accept-any-cert" => Ok(TlsMode::InsecureAcceptAnyCert),
            other => Err(Error::Configuration(format!(
                "{TLS_MODE}={other:?} is not one of disable, verify, insecure-accept-any-cert"
            ))),
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsMode::Disable => write!(f, "disable"),
            TlsMode::Verify => write!(f, "verify"),
            TlsMode::InsecureAcceptAnyCert => write!(f, "insecure-accept-any-cert"),
        }
    }
}

/// Connection settings for one process run.
#[derive(Clone)]
pub struct Settings {
    pg: tokio_postgres::Config,
    /// Transport security mode.
    pub tls: TlsMode,
    /// Schema to reconcile in (sets `search_path`); `None` keeps the server default.
    pub schema: Option<String>,
}

impl Settings {
    /// Load settings from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = lookup(DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Configuration(format!("{DATABASE_URL} is not set")))?;

        let mut pg: tokio_postgres::Config = url.parse().map_err(|e| {
            Error::Configuration(format!("{DATABASE_URL} is not a valid connection string: {e}"))
        })?;
        if pg.get_hosts().is_empty() {
            return Err(Error::Configuration(format!("{DATABASE_URL} names no host")));
        }

        let tls = match lookup(TLS_MODE) {
            Some(v) => v.parse()?,
            None => TlsMode::default(),
        };
        if tls == TlsMode::Disable {
            pg.ssl_mode(SslMode::Disable);
        }

        if let Some(raw) = lookup(CONNECT_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Configuration(format!("{CONNECT_TIMEOUT}={raw:?} is not a number of seconds"))
            })?;
            pg.connect_timeout(Duration::from_secs(secs));
        }

        let schema = lookup(SCHEMA).filter(|s| !s.trim().is_empty());

        Ok(Self { pg, tls, schema })
    }

    /// The parsed driver configuration.
    pub fn pg_config(&self) -> &tokio_postgres::Config {
        &self.pg
    }

    /// A printable description of where this connects, without the password.
    pub fn target(&self) -> Target {
        let host = match self.pg.get_hosts().first() {
            Some(Host::Tcp(h)) => h.clone(),
            #[cfg(unix)]
            Some(Host::Unix(p)) => p.display().to_string(),
            None => String::new(),
        };
        let user = self.pg.get_user().unwrap_or("postgres").to_owned();
        Target {
            port: self.pg.get_ports().first().copied().unwrap_or(5432),
            database: self.pg.get_dbname().unwrap_or(&user).to_owned(),
            has_password: self.pg.get_password().is_some(),
            host,
            user,
            tls: self.tls,
            schema: self.schema.clone(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("target", &self.target().to_string())
            .finish()
    }
}

/// Where a session connects, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub has_password: bool,
    pub tls: TlsMode,
    pub schema: Option<String>,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = if self.has_password { ":***" } else { "" };
        write!(
            f,
            "postgres://{}{}@{}:{}/{} (tls: {})",
            self.user, secret, self.host, self.port, self.database, self.tls
        )?;
        if let Some(schema) = &self.schema {
            write!(f, " schema {}", schema)?;
        }
        Ok(())
    }
}

/// Inputs for the admin bootstrap seed.
#[derive(Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

impl AdminSeed {
    /// Load from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Configuration(format!("{key} is not set")))
        };
        let email = required(ADMIN_EMAIL)?.trim().to_owned();
        if !email.contains('@') {
            return Err(Error::Configuration(format!(
                "{ADMIN_EMAIL}={email:?} is not an email address"
            )));
        }
        Ok(Self {
            email,
            password: required(ADMIN_PASSWORD)?,
            name: lookup(ADMIN_NAME).filter(|v| !v.trim().is_empty()),
        })
    }
}

impl fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .field("password", &"***")
            .field("name", &self.name)
            .finish()
    }
}
