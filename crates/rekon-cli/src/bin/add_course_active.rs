//! Add `courses.is_active` (boolean, default true) if it is missing.

use rekon::catalog;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    rekon_cli::init_logging();
    rekon_cli::finish(rekon_cli::apply(catalog::add_course_active()).await)
}
