//! Ready-made schema changes used by the command-line tool.
//!
//! Each recipe is an ordinary declare-then-save sequence on a
//! [`TableDescriptor`]; they exist so the same shapes are produced every
//! time.

use tracing::info;

use crate::catalog::Catalog;
use crate::constraint::PRIMARY_KEY_NAME;
use crate::error::{Error, Result};
use crate::table::TableDescriptor;

/// Name of the version table [`add_backup`] creates for `table`.
#[must_use]
pub fn backup_table_name(table: &str) -> String {
    format!("{table}_versions")
}

/// Primary key column of a version table.
pub const VERSION_ID_FIELD: &str = "version_id";

/// Adds `CreatedOn`, `CreatedBy`, `ModifiedOn` and `ModifiedBy` columns,
/// each name prefixed with `prefix`, right after the primary key.
///
/// # Errors
///
/// Returns `AlreadyExists` if one of the columns exists, and any error
/// from loading or saving the table.
pub async fn add_timestamps(
    catalog: &Catalog,
    table: &str,
    prefix: &str,
) -> Result<TableDescriptor> {
    let mut descriptor = catalog.get(table).await?;
    let mut previous = descriptor
        .primary_key_fields()
        .first()
        .map(|name| (*name).to_owned())
        .or_else(|| descriptor.field_names().next().map(str::to_owned))
        .ok_or_else(|| Error::InvariantViolation(format!("table '{table}' has no fields")))?;

    for (suffix, is_date) in [
        ("CreatedOn", true),
        ("CreatedBy", false),
        ("ModifiedOn", true),
        ("ModifiedBy", false),
    ] {
        let name = format!("{prefix}{suffix}");
        if descriptor.get(&name).is_some() {
            return Err(Error::already_exists("field", name));
        }
        let field = if is_date {
            descriptor.date_time(name.clone())
        } else {
            descriptor.big_int(name.clone())
        };
        let _ = field.not_nullable().after(previous);
        previous = name;
    }

    let saved = descriptor.save().await?;
    info!(table = %table, "Added timestamp columns");
    Ok(saved)
}

/// Creates `<table>_versions`, a copy of `table` that can hold many rows
/// per original id.
///
/// The copy's primary key column loses its AUTO_INCREMENT and primary
/// key, gains a plain index, and a new auto-incrementing
/// [`VERSION_ID_FIELD`] becomes the first column and primary key. An
/// existing version table is dropped first when `replace` is set.
///
/// # Errors
///
/// Returns `AlreadyExists` if the version table exists and `replace` is
/// not set, `NotFound` if `table` has no primary key, and any error from
/// copying or saving.
pub async fn add_backup(catalog: &Catalog, table: &str, replace: bool) -> Result<TableDescriptor> {
    let source = catalog.get(table).await?;
    let id_field = source
        .primary_key_fields()
        .first()
        .map(|name| (*name).to_owned())
        .ok_or_else(|| Error::not_found("constraint", PRIMARY_KEY_NAME))?;

    let backup = backup_table_name(table);
    replace_existing(catalog, &backup, replace).await?;

    let mut versions = source.copy(&backup).await?;
    if let Some(field) = versions.field_mut(&id_field) {
        let _ = field.not_auto_increment().not_primary_key().index()?;
    }
    versions.delete_constraint(PRIMARY_KEY_NAME)?;
    let _ = versions
        .big_int(VERSION_ID_FIELD)
        .unsigned()
        .auto_increment()
        .primary_key()
        .first();

    let saved = versions.save().await?;
    info!(table = %table, backup = %backup, "Added version table");
    Ok(saved)
}

/// Creates a pivot table linking two tables through `left_id` and
/// `right_id`, with bookkeeping columns named with `prefix`.
///
/// # Errors
///
/// Returns `AlreadyExists` if the table exists and `replace` is not set,
/// and any error from saving.
pub async fn add_pivot(
    catalog: &Catalog,
    table: &str,
    left_id: &str,
    right_id: &str,
    prefix: &str,
    replace: bool,
) -> Result<TableDescriptor> {
    if left_id == right_id {
        return Err(Error::InvariantViolation(format!(
            "pivot table '{table}' needs two different id columns"
        )));
    }
    replace_existing(catalog, table, replace).await?;

    let mut pivot = catalog.create_table(table).await?;
    let _ = pivot
        .big_int(format!("{prefix}Id"))
        .unsigned()
        .primary_key()
        .auto_increment();
    let _ = pivot.date_time(format!("{prefix}CreatedOn")).index()?;
    let _ = pivot.big_int(format!("{prefix}CreatedBy")).index()?;
    let _ = pivot.date_time(format!("{prefix}ModifiedOn")).index()?;
    let _ = pivot.big_int(format!("{prefix}ModifiedBy")).index()?;
    let _ = pivot.bool(format!("{prefix}Disabled")).index()?;
    let _ = pivot.bool(format!("{prefix}Deleted")).index()?;
    let _ = pivot.big_int(left_id).unsigned().index()?;
    let _ = pivot.big_int(right_id).unsigned().index()?;

    let saved = pivot.save().await?;
    info!(table = %table, left = %left_id, right = %right_id, "Added pivot table");
    Ok(saved)
}

async fn replace_existing(catalog: &Catalog, table: &str, replace: bool) -> Result<()> {
    if !catalog.table_exists(table).await? {
        return Ok(());
    }
    if !replace {
        return Err(Error::already_exists("table", table));
    }
    catalog.delete_table(table).await
}
