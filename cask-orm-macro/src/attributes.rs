//! # `#[orm(...)]` Attribute Parsing
//!
//! Struct level:
//!
//! - `#[orm(table = "tec_occurrences")]` - table name without prefix
//!
//! Field level:
//!
//! - `#[orm(primary_key)]` - primary key column
//! - `#[orm(auto_increment)]` - database assigned key (requires `primary_key`)
//! - `#[orm(unique)]` - `UNIQUE` constraint, also a point-lookup key
//! - `#[orm(index)]` - secondary index
//! - `#[orm(size = N)]` - maximum text length, `VARCHAR(N)` in DDL
//! - `#[orm(create_time)]` - filled with `CURRENT_TIMESTAMP` by the database
//! - `#[orm(validate = "path::to::fn")]` - custom validator,
//!   `fn(&Value) -> Result<(), String>`

use syn::{Attribute, LitInt, LitStr, Path};

/// Options of one field.
#[derive(Default)]
pub struct FieldAttrs {
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub index: bool,
    pub size: Option<usize>,
    pub create_time: bool,
    pub validate: Option<Path>,
}

impl FieldAttrs {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut parsed = FieldAttrs::default();

        for attr in attrs.iter().filter(|a| a.path().is_ident("orm")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary_key") {
                    parsed.primary_key = true;
                } else if meta.path.is_ident("auto_increment") {
                    parsed.auto_increment = true;
                } else if meta.path.is_ident("unique") {
                    parsed.unique = true;
                } else if meta.path.is_ident("index") {
                    parsed.index = true;
                } else if meta.path.is_ident("create_time") {
                    parsed.create_time = true;
                } else if meta.path.is_ident("size") {
                    let value: LitInt = meta.value()?.parse()?;
                    parsed.size = Some(value.base10_parse::<usize>()?);
                } else if meta.path.is_ident("validate") {
                    let value: LitStr = meta.value()?.parse()?;
                    parsed.validate = Some(value.parse::<Path>()?);
                } else {
                    return Err(meta.error("unsupported orm field attribute"));
                }
                Ok(())
            })?;

            if parsed.auto_increment && !parsed.primary_key {
                return Err(syn::Error::new_spanned(attr, "`auto_increment` requires `primary_key`"));
            }
        }

        Ok(parsed)
    }
}

/// The `table = "..."` option of the struct, if any.
pub fn table_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut table = None;

    for attr in attrs.iter().filter(|a| a.path().is_ident("orm")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                table = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported orm struct attribute"))
            }
        })?;
    }

    Ok(table)
}
