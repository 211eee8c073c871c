//! Identifier quoting.

use std::fmt;

/// A Postgres identifier, displayed double-quoted with embedded quotes doubled.
///
/// ```
/// use rekon_schema::Ident;
/// assert_eq!(Ident("leads").to_string(), "\"leads\"");
/// assert_eq!(Ident("bla\"h").to_string(), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.as_ref().replace('"', "\"\""))
    }
}

/// Quote a table or column name.
///
/// Always quotes, so reserved words like `user` or `order` work as table
/// names.
pub fn quote_ident(name: &str) -> String {
    Ident(name).to_string()
}
