#![doc = include_str!("../README.md")]

//! Procedural macros for tablemap.

#![forbid(unsafe_code)]

mod condition;

use proc_macro::TokenStream;
use syn::parse_macro_input;

/// Turns a closure over an entity into a `tablemap::condition::Condition` tree.
///
/// Field accesses on the closure parameter become properties; any other sub-expression is
/// evaluated in the caller's scope and captured as a value. Expressions that cannot be
/// represented (calls on properties other than `contains`, `starts_with`, `ends_with` and
/// `eq`, arithmetic on properties, and so on) become `Unsupported` nodes, so compiling the
/// tree fails instead of producing approximate SQL.
///
/// # Example
///
/// ```rust,ignore
/// let min_age = 18;
/// let ids = vec![1, 2, 3];
/// let condition = tablemap::condition!(|p| p.age >= min_age
///     && (p.last_name.starts_with("Sm") || ids.contains(&p.id))
///     && !p.is_deleted);
/// let predicate = condition.compile()?;
/// ```
#[proc_macro]
pub fn condition(input: TokenStream) -> TokenStream {
    let closure = parse_macro_input!(input as condition::ConditionClosure);
    condition::expand(&closure).into()
}
