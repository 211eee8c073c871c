//! Set `courses.is_active` to true where it is NULL.

use rekon::catalog;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    rekon_cli::init_logging();
    rekon_cli::finish(rekon_cli::apply(catalog::backfill_course_active()).await)
}
