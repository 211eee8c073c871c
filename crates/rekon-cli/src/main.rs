use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use rekon::{MigrationRunner, catalog, introspect};
use std::process::ExitCode;

/// Idempotent schema reconciliation for Postgres.
///
/// Connection settings come from the environment: DATABASE_URL (required),
/// REKON_TLS, REKON_SCHEMA and REKON_CONNECT_TIMEOUT_SECS. A `.env` file in
/// the working directory is read first.
#[derive(Parser, Debug)]
#[command(name = "rekon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show which migrations are applied and which are pending
    Status,
    /// Apply pending migrations in version order
    Migrate {
        /// Also apply migrations that drop tables
        #[arg(long)]
        allow_destructive: bool,
    },
    /// Print the columns of a table as the database reports them
    Inspect {
        /// Table name
        table: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    rekon_cli::init_logging();

    let result = match cli.command {
        Command::Status => status().await,
        Command::Migrate { allow_destructive } => migrate(allow_destructive).await,
        Command::Inspect { table } => inspect(&table).await,
    };
    rekon_cli::finish(result)
}

async fn status() -> rekon::Result<()> {
    let mut session = rekon_cli::connect().await?;
    let result = MigrationRunner::new(&mut session, catalog::migrations())
        .status()
        .await;
    session.close().await;

    let status = result?;
    println!("{} migrations:", status.len());
    for m in &status {
        let state = match m.applied_at {
            Some(at) => format!("applied {}", at.format("%Y-%m-%d %H:%M:%S UTC"))
                .green()
                .to_string(),
            None => "pending".yellow().to_string(),
        };
        let flag = if m.destructive {
            format!(" {}", "destructive".red())
        } else {
            String::new()
        };
        println!("  {} {} [{}]{}", m.version.bold(), m.name, state, flag);
    }
    Ok(())
}

async fn migrate(allow_destructive: bool) -> rekon::Result<()> {
    let mut session = rekon_cli::connect().await?;
    let result = MigrationRunner::new(&mut session, catalog::migrations())
        .allow_destructive(allow_destructive)
        .migrate()
        .await;
    session.close().await;

    let ran = result?;
    if ran.is_empty() {
        println!("nothing to apply");
    }
    for m in &ran {
        println!("{} {} {}", "applied".green(), m.version.bold(), m.name);
        for outcome in &m.outcomes {
            print!("{}", outcome);
        }
    }
    Ok(())
}

async fn inspect(table: &str) -> rekon::Result<()> {
    let session = rekon_cli::connect().await?;
    let result = introspect::describe(&session, table).await;
    session.close().await;
    print!("{}", result?);
    Ok(())
}
