//! Drop and recreate `leads`. Every existing lead is discarded.

use rekon::catalog;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    rekon_cli::init_logging();
    rekon_cli::finish(rekon_cli::apply(catalog::recreate_leads()).await)
}
