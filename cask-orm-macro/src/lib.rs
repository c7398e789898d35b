//! # Cask ORM Procedural Macros
//!
//! Provides `#[derive(Model)]`, re-exported by the `cask-orm` crate.
//!
//! ## Architecture
//!
//! - **`lib.rs`** (this file): entry point
//! - **`attributes.rs`**: `#[orm(...)]` parsing
//! - **`derive_model.rs`**: code generation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cask_orm::Model;
//! use chrono::NaiveDateTime;
//!
//! fn positive(value: &cask_orm::Value) -> Result<(), String> {
//!     match value.as_i64() {
//!         Some(n) if n > 0 => Ok(()),
//!         _ => Err("must be positive".to_string()),
//!     }
//! }
//!
//! #[derive(Model, Debug, Clone)]
//! #[orm(table = "tec_occurrences")]
//! struct Occurrence {
//!     #[orm(primary_key, auto_increment)]
//!     occurrence_id: i64,
//!
//!     #[orm(index, validate = "positive")]
//!     post_id: i64,
//!
//!     #[orm(unique, size = 40)]
//!     hash: String,
//!
//!     start_date: NaiveDateTime,
//!
//!     duration: Option<i64>,
//!
//!     #[orm(create_time)]
//!     updated_at: Option<NaiveDateTime>,
//! }
//! ```
//!
//! The table name defaults to the snake_case struct name. Column types,
//! formats and nullability come from each field type's `FieldValue`
//! implementation, so `Option<T>` columns are nullable.
//!
//! ## Generated Field Constants
//!
//! ```rust,ignore
//! // For struct Occurrence, the macro generates:
//! pub mod occurrence_fields {
//!     pub const OCCURRENCE_ID: &str = "occurrence_id";
//!     pub const POST_ID: &str = "post_id";
//!     // ...
//! }
//!
//! db.model::<Occurrence>().equals(occurrence_fields::POST_ID, 23).models().await;
//! ```

#![warn(missing_docs)]

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attributes;
mod derive_model;

/// Derives `cask_orm::Model` for a struct with named fields.
///
/// See the crate documentation for the supported `#[orm(...)]` attributes.
#[proc_macro_derive(Model, attributes(orm))]
pub fn model_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    derive_model::expand(ast).unwrap_or_else(syn::Error::into_compile_error).into()
}
