//! Shared plumbing for the rekon executables.
//!
//! Every executable follows the same shape: load settings, connect, apply,
//! print the outcome, release the connection. Progress and summaries go to
//! stdout; logs and errors go to stderr.

use owo_colors::OwoColorize;
use rekon::{Action, AdminSeed, Outcome, Session, Settings};
use std::process::ExitCode;
use tracing::error;

/// Install the stderr log subscriber. `RUST_LOG` overrides the default.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rekon=info")),
        )
        .init();
}

/// Load settings from the environment and connect.
pub async fn connect() -> rekon::Result<Session> {
    let settings = Settings::from_env()?;
    connect_with(&settings).await
}

pub async fn connect_with(settings: &Settings) -> rekon::Result<Session> {
    println!("{} {}", "connecting to".dimmed(), settings.target());
    Session::connect(settings).await
}

/// Connect, apply one action, print its outcome.
pub async fn apply(action: Action) -> rekon::Result<Outcome> {
    let session = connect().await?;
    if action.is_destructive() {
        println!(
            "{} {} discards every row in {}",
            "warning:".yellow().bold(),
            action.label(),
            action.table()
        );
    }
    let result = action.apply(&session).await;
    session.close().await;
    let outcome = result?;
    print!("{}", outcome);
    Ok(outcome)
}

/// Connect and upsert the admin account described by the environment.
pub async fn seed_admin() -> rekon::Result<Outcome> {
    let settings = Settings::from_env()?;
    let seed = AdminSeed::from_env()?;
    let session = connect_with(&settings).await?;
    println!("{} {}", "seeding admin".dimmed(), seed.email);
    let result = rekon::seed_admin(&session, &seed).await;
    session.close().await;
    let outcome = result?;
    print!("{}", outcome);
    Ok(outcome)
}

/// Turn a run result into the process exit status, printing any error.
pub fn finish<T>(result: rekon::Result<T>) -> ExitCode {
    match result {
        Ok(_) => {
            println!("{}", "done".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "run failed");
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
