//! Admin account bootstrap.

use crate::action::{Action, Upsert};
use crate::catalog::USERS;
use crate::error::Context;
use crate::report::Outcome;
use crate::traced::{Connection, ConnectionExt};
use crate::{AdminSeed, Result, password};
use rekon_schema::select_by_key_sql;
use tracing::debug;

/// Role written on the seeded account.
pub const ADMIN_ROLE: &str = "admin";

/// Build the upsert for the admin account.
///
/// `stored_hash` is the password hash currently on the row, if any. When it
/// already verifies `seed.password` it is written back unchanged, so repeated
/// runs with the same password leave the row as it was.
pub fn admin_upsert(seed: &AdminSeed, stored_hash: Option<&str>) -> Result<Upsert> {
    let hashword = match stored_hash {
        Some(h) if password::verify(&seed.password, h) => {
            debug!("stored password hash still matches");
            h.to_owned()
        }
        _ => password::hash(&seed.password)?,
    };

    let mut upsert = Upsert::new(USERS, "email")
        .set("email", seed.email.as_str())
        .set("password", hashword)
        .set("role", ADMIN_ROLE);
    if let Some(name) = &seed.name {
        upsert = upsert.set("name", name.as_str());
    }
    Ok(upsert)
}

/// Insert or update the admin account in `users`, keyed on email.
pub async fn seed_admin<C: Connection>(conn: &C, seed: &AdminSeed) -> Result<Outcome> {
    let stored = conn
        .traced()
        .query_opt(&select_by_key_sql(USERS, "password", "email"), &[&seed.email])
        .await
        .context(format!("look up {}", USERS))?;
    let stored_hash: Option<String> = stored.and_then(|row| row.get(0));

    let upsert = admin_upsert(seed, stored_hash.as_deref())?;
    Action::Upsert(upsert).apply(conn).await
}
