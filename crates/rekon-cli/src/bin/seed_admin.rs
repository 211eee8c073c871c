//! Insert or update the admin account from `ADMIN_EMAIL`, `ADMIN_PASSWORD`
//! and optionally `ADMIN_NAME`.

use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    rekon_cli::init_logging();
    rekon_cli::finish(rekon_cli::seed_admin().await)
}
