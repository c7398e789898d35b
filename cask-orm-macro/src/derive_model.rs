//! # Model Derive Macro Implementation
//!
//! Expands `#[derive(Model)]` into:
//!
//! 1. an `impl cask_orm::Model` with `table_name`, `columns`, `to_row` and
//!    `from_row`, where every column takes its format, DDL type and
//!    nullability from the field type's `FieldValue` implementation,
//! 2. a `<model>_fields` module with one constant per column name.
//!
//! ```rust,ignore
//! // Input struct:
//! #[derive(Model, Clone)]
//! struct Occurrence {
//!     #[orm(primary_key, auto_increment)]
//!     occurrence_id: i64,
//!     #[orm(unique, size = 40)]
//!     hash: String,
//! }
//!
//! // Generated implementation (abridged):
//! impl cask_orm::Model for Occurrence {
//!     fn table_name() -> &'static str { "occurrence" }
//!     fn columns() -> Vec<cask_orm::ColumnInfo> { /* ... */ }
//!     fn to_row(&self) -> cask_orm::Row { /* ... */ }
//!     fn from_row(row: &cask_orm::Row) -> Result<Self, cask_orm::Error> { /* ... */ }
//! }
//!
//! pub mod occurrence_fields {
//!     pub const OCCURRENCE_ID: &str = "occurrence_id";
//!     pub const HASH: &str = "hash";
//! }
//! ```

// ============================================================================
// External Crate Imports
// ============================================================================

use heck::{ToShoutySnakeCase, ToSnakeCase};
use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Ident, ext::IdentExt};

// ============================================================================
// Internal Crate Imports
// ============================================================================

use crate::attributes::{self, FieldAttrs};

// ============================================================================
// Macro Expansion Function
// ============================================================================

/// Expands the `#[derive(Model)]` macro.
///
/// Fails on anything but a struct with named fields, or on a malformed
/// `#[orm(...)]` attribute.
pub fn expand(ast: DeriveInput) -> syn::Result<TokenStream> {
    let struct_name = &ast.ident;
    let vis = &ast.vis;

    let fields = match &ast.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields,
            _ => return Err(syn::Error::new_spanned(struct_name, "Model must have named fields")),
        },
        _ => return Err(syn::Error::new_spanned(struct_name, "Model must be a struct")),
    };

    let snake_name = struct_name.unraw().to_string().to_snake_case();
    let table_name = attributes::table_name(&ast.attrs)?.unwrap_or_else(|| snake_name.clone());

    let mut column_defs = Vec::new();
    let mut to_row_sets = Vec::new();
    let mut from_row_fields = Vec::new();
    let mut field_consts = Vec::new();

    for field in &fields.named {
        let Some(ident) = &field.ident else { continue };
        let ty = &field.ty;
        let column = ident.unraw().to_string();
        let attrs = FieldAttrs::parse(&field.attrs)?;

        let FieldAttrs { primary_key, auto_increment, unique, index, create_time, .. } = attrs;
        let size = match attrs.size {
            Some(size) => quote! { Some(#size) },
            None => quote! { None },
        };
        let validator = match &attrs.validate {
            Some(path) => quote! { Some(#path as cask_orm::Validator) },
            None => quote! { None },
        };

        column_defs.push(quote! {
            cask_orm::ColumnInfo {
                name: #column,
                sql_type: <#ty as cask_orm::FieldValue>::SQL_TYPE,
                format: <#ty as cask_orm::FieldValue>::FORMAT,
                is_primary_key: #primary_key,
                auto_increment: #auto_increment,
                is_nullable: <#ty as cask_orm::FieldValue>::NULLABLE,
                unique: #unique,
                index: #index,
                size: #size,
                create_time: #create_time,
                validator: #validator,
            }
        });

        to_row_sets.push(quote! {
            row.set(#column, cask_orm::FieldValue::to_value(&self.#ident));
        });

        from_row_fields.push(quote! {
            #ident: <#ty as cask_orm::FieldValue>::from_value(row.get(#column).cloned().unwrap_or_default())
                .map_err(|e| e.in_column(#column))?
        });

        let const_name = Ident::new(&column.to_shouty_snake_case(), Span::call_site());
        field_consts.push(quote! {
            pub const #const_name: &str = #column;
        });
    }

    let fields_mod = format_ident!("{}_fields", snake_name);

    Ok(quote! {
        impl cask_orm::Model for #struct_name {
            fn table_name() -> &'static str {
                #table_name
            }

            fn columns() -> Vec<cask_orm::ColumnInfo> {
                vec![#(#column_defs),*]
            }

            fn to_row(&self) -> cask_orm::Row {
                let mut row = cask_orm::Row::new();
                #(#to_row_sets)*
                row
            }

            fn from_row(row: &cask_orm::Row) -> Result<Self, cask_orm::Error> {
                Ok(Self {
                    #(#from_row_fields),*
                })
            }
        }

        /// Column names of the model.
        #[allow(dead_code)]
        #vis mod #fields_mod {
            #(#field_consts)*
        }
    })
}
