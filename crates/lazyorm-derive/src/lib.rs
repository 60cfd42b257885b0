//! Derive macros for lazyorm
//!
//! Provides `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod record;

/// Derive `Record` and `ToValues` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use lazyorm::Record;
///
/// #[derive(Debug, Record)]
/// #[orm(table = "users")]
/// struct User {
///     id: i64,
///     username: String,
///     #[orm(column = "email_address")]
///     email: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Default table for builders (snake_case struct name otherwise)
/// - `#[orm(model = "name")]` - Cache identity (struct name otherwise)
/// - `#[orm(column = "name")]` - Map field to a different column name
///
/// Field types: `bool`, `i16`, `i32`, `i64`, `f32`, `f64`, `String`, `NaiveDate`,
/// `NaiveDateTime`, or `Option` of any of them (nullable).
#[proc_macro_derive(Record, attributes(orm))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
