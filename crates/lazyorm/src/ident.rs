//! Safe SQL identifier handling.
//!
//! Values are always bound as parameters, but table and column names cannot be, so every
//! identifier that reaches SQL text passes through this module first.
//!
//! - A name part must match `[A-Za-z_][A-Za-z0-9_]*` and be at most
//!   [`MAX_IDENTIFIER_LEN`] bytes long.
//! - [`Ident`] additionally accepts dotted qualification (`schema.table`, `alias.column`),
//!   validating every part with the same rule.
//!
//! # Example
//! ```ignore
//! use lazyorm::{Ident, validate_identifier};
//!
//! validate_identifier("users")?;
//! let t = Ident::parse("public.users")?;
//! assert!(Ident::parse("id; DROP TABLE users;").is_err());
//! # Ok::<(), lazyorm::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};
use std::fmt;

/// PostgreSQL truncates identifiers longer than `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Validate a single (unqualified) identifier and return it unchanged.
pub fn validate_identifier(name: &str) -> OrmResult<&str> {
    if name.is_empty() {
        return Err(OrmError::validation("Identifier cannot be empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(OrmError::validation(format!(
            "Identifier '{}…' exceeds {MAX_IDENTIFIER_LEN} characters",
            name.chars().take(MAX_IDENTIFIER_LEN).collect::<String>()
        )));
    }

    let mut chars = name.chars();
    // Non-empty checked above.
    let first = chars.next().unwrap_or('_');
    if !(first == '_' || first.is_ascii_alphabetic()) {
        return Err(OrmError::validation(format!(
            "Invalid identifier '{name}': must start with a letter or underscore"
        )));
    }
    if let Some(bad) = chars.find(|c| !(*c == '_' || c.is_ascii_alphanumeric())) {
        return Err(OrmError::validation(format!(
            "Invalid character '{bad}' in identifier '{name}'"
        )));
    }
    Ok(name)
}

/// A validated SQL identifier, optionally qualified (`schema.table`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    parts: Vec<String>,
}

impl Ident {
    /// Parse a possibly dotted identifier, validating each part.
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::validation("Identifier cannot be empty"));
        }
        let mut parts = Vec::new();
        for part in s.split('.') {
            if part.is_empty() {
                return Err(OrmError::validation(format!(
                    "Empty identifier segment in '{s}'"
                )));
            }
            parts.push(validate_identifier(part)?.to_string());
        }
        Ok(Self { parts })
    }

    /// Parse an identifier that must not be qualified.
    pub fn simple(s: &str) -> OrmResult<Self> {
        Ok(Self {
            parts: vec![validate_identifier(s)?.to_string()],
        })
    }

    /// The last (unqualified) part, e.g. `users` for `public.users`.
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    pub fn is_qualified(&self) -> bool {
        self.parts.len() > 1
    }

    /// The qualifying part directly before the name, if any.
    pub fn schema(&self) -> Option<&str> {
        let n = self.parts.len();
        (n > 1).then(|| self.parts[n - 2].as_str())
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        self.parts.join(".")
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(part);
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Convert an input into an [`Ident`].
///
/// This is mainly for ergonomics in builder APIs.
pub trait IntoIdent {
    fn into_ident(self) -> OrmResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> OrmResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> OrmResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(&self)
    }
}

impl IntoIdent for &String {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        let ident = Ident::parse("users").unwrap();
        assert_eq!(ident.to_sql(), "users");
        assert!(!ident.is_qualified());
    }

    #[test]
    fn ident_dotted() {
        let ident = Ident::parse("public.users").unwrap();
        assert_eq!(ident.to_sql(), "public.users");
        assert_eq!(ident.name(), "users");
    }

    #[test]
    fn simple_rejects_qualified() {
        assert!(Ident::simple("public.users").is_err());
    }

    #[test]
    fn validate_accepts_underscore_and_digits() {
        assert_eq!(validate_identifier("_user_2").unwrap(), "_user_2");
    }

    #[test]
    fn rejects_injection_attempt() {
        let err = validate_identifier("id; DROP TABLE users;").unwrap_err();
        assert!(err.is_validation());
        assert!(Ident::parse("id; DROP TABLE users;").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_identifier("").is_err());
        assert!(Ident::parse("").is_err());
    }

    #[test]
    fn rejects_start_digit() {
        assert!(validate_identifier("1table").is_err());
    }

    #[test]
    fn rejects_space_quote_and_dollar() {
        assert!(validate_identifier("my table").is_err());
        assert!(validate_identifier("\"users\"").is_err());
        assert!(validate_identifier("var$1").is_err());
        assert!(validate_identifier("naïve").is_err());
    }

    #[test]
    fn rejects_double_and_trailing_dot() {
        assert!(Ident::parse("schema..table").is_err());
        assert!(Ident::parse("schema.").is_err());
        assert!(Ident::parse(".table").is_err());
    }

    #[test]
    fn enforces_length_bound() {
        let ok = "a".repeat(MAX_IDENTIFIER_LEN);
        let too_long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(validate_identifier(&ok).is_ok());
        assert!(validate_identifier(&too_long).is_err());
    }
}
