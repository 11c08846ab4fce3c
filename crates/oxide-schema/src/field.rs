//! Field descriptors.
//!
//! A [`FieldDescriptor`] pairs the shape a caller declares ([`FieldDef`])
//! with the shape the database had when the table was loaded. Mutation goes
//! through [`FieldMut`], which borrows the owning table so that rules
//! spanning several fields (a single inline primary key, never deleting the
//! last field) can be enforced.

use std::ops::Deref;

use serde::Serialize;

use crate::change::Change;
use crate::error::{Error, Result};
use crate::table::TableDescriptor;

/// Column data types the engine can compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataType {
    /// Integer; `length` is the width in bytes (1, 2, 3, 4 or 8).
    Int,
    /// Text; `length` is the maximum number of characters.
    Text,
    /// Date and time.
    DateTime,
    /// Boolean.
    Boolean,
}

/// Where a column is placed when it is added or altered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Position {
    /// Leave the column where the database puts it.
    #[default]
    Unspecified,
    /// Make it the first column.
    First,
    /// Place it right after the named column.
    After(String),
}

/// A column default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    /// `DEFAULT NULL`.
    Null,
    /// `DEFAULT TRUE` / `DEFAULT FALSE`.
    Bool(bool),
    /// An integer literal.
    Integer(i64),
    /// A quoted string literal.
    Text(String),
    /// A raw SQL expression such as `CURRENT_TIMESTAMP`.
    Expression(String),
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// The declared shape of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Column name.
    pub name: String,
    /// Data type.
    pub data_type: DataType,
    /// Integer width in bytes or maximum text length.
    pub length: Option<u64>,
    /// Whether an integer column is signed.
    pub signed: bool,
    /// Default value, if any.
    pub default: Option<DefaultValue>,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column auto-increments.
    pub auto_increment: bool,
    /// Whether the column is the table's inline primary key.
    pub primary: bool,
    /// Placement when added or altered.
    pub position: Position,
}

impl FieldDef {
    /// Creates a NOT NULL, signed field with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            length: None,
            signed: true,
            default: None,
            nullable: false,
            auto_increment: false,
            primary: false,
            position: Position::Unspecified,
        }
    }

    /// Sets the length.
    #[must_use]
    pub const fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }
}

/// A field of a [`TableDescriptor`] together with its diff state.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub(crate) def: FieldDef,
    committed: Option<FieldDef>,
    pub(crate) deleted: bool,
    pub(crate) altered: bool,
}

impl FieldDescriptor {
    /// A field declared in memory that does not exist yet.
    pub(crate) const fn declared(def: FieldDef) -> Self {
        Self {
            def,
            committed: None,
            deleted: false,
            altered: false,
        }
    }

    /// A field loaded from the database.
    pub(crate) fn loaded(def: FieldDef) -> Self {
        Self {
            committed: Some(def.clone()),
            def,
            deleted: false,
            altered: false,
        }
    }

    /// The declared shape.
    #[must_use]
    pub const fn def(&self) -> &FieldDef {
        &self.def
    }

    /// The current (possibly renamed) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// The name the column has in the database, or the declared name for
    /// a field that does not exist yet.
    #[must_use]
    pub fn committed_name(&self) -> &str {
        self.committed.as_ref().map_or(&self.def.name, |c| &c.name)
    }

    /// The shape the database had when this field was loaded.
    #[must_use]
    pub const fn committed(&self) -> Option<&FieldDef> {
        self.committed.as_ref()
    }

    /// Data type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.def.data_type
    }

    /// Integer width or text length.
    #[must_use]
    pub const fn length(&self) -> Option<u64> {
        self.def.length
    }

    /// Whether an integer column is signed.
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.def.signed
    }

    /// Default value.
    #[must_use]
    pub const fn default_value(&self) -> Option<&DefaultValue> {
        self.def.default.as_ref()
    }

    /// Whether the column accepts NULL.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.def.nullable
    }

    /// Whether the column auto-increments.
    #[must_use]
    pub const fn is_auto_increment(&self) -> bool {
        self.def.auto_increment
    }

    /// Whether the column is the inline primary key.
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.def.primary
    }

    /// Placement when added or altered.
    #[must_use]
    pub const fn position(&self) -> &Position {
        &self.def.position
    }

    /// True until the field has been saved and reloaded.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.committed.is_none()
    }

    /// True once `delete()` has been called and not undone.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// True once any mutator has touched the field.
    #[must_use]
    pub const fn is_altered(&self) -> bool {
        self.altered
    }

    /// What saving would do to this column.
    #[must_use]
    pub fn change(&self) -> Change<FieldDef> {
        Change::between(&self.def, self.committed.as_ref(), self.deleted)
    }
}

/// Mutable handle to one field of a table.
///
/// Every mutator marks the field as altered and returns the handle, so
/// calls chain:
///
/// ```ignore
/// table.big_int("id").unsigned().auto_increment().primary_key();
/// ```
#[derive(Debug)]
pub struct FieldMut<'a> {
    table: &'a mut TableDescriptor,
    index: usize,
}

impl<'a> FieldMut<'a> {
    pub(crate) fn new(table: &'a mut TableDescriptor, index: usize) -> Self {
        Self { table, index }
    }

    fn update(self, apply: impl FnOnce(&mut FieldDef)) -> Self {
        let field = &mut self.table.fields[self.index];
        field.altered = true;
        apply(&mut field.def);
        self
    }

    /// Sets the data type.
    #[must_use]
    pub fn data_type(self, data_type: DataType) -> Self {
        self.update(|def| def.data_type = data_type)
    }

    /// Sets the integer width or text length.
    #[must_use]
    pub fn length(self, length: u64) -> Self {
        self.update(|def| def.length = Some(length))
    }

    /// Makes an integer column signed.
    #[must_use]
    pub fn signed(self) -> Self {
        self.update(|def| def.signed = true)
    }

    /// Makes an integer column unsigned.
    #[must_use]
    pub fn unsigned(self) -> Self {
        self.update(|def| def.signed = false)
    }

    /// Allows NULL.
    #[must_use]
    pub fn nullable(self) -> Self {
        self.update(|def| def.nullable = true)
    }

    /// Disallows NULL.
    #[must_use]
    pub fn not_nullable(self) -> Self {
        self.update(|def| def.nullable = false)
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(self, value: impl Into<DefaultValue>) -> Self {
        let value = value.into();
        self.update(|def| def.default = Some(value))
    }

    /// Removes the default value.
    #[must_use]
    pub fn no_default(self) -> Self {
        self.update(|def| def.default = None)
    }

    /// Makes the column auto-increment.
    #[must_use]
    pub fn auto_increment(self) -> Self {
        self.update(|def| def.auto_increment = true)
    }

    /// Stops the column auto-incrementing.
    #[must_use]
    pub fn not_auto_increment(self) -> Self {
        self.update(|def| def.auto_increment = false)
    }

    /// Makes this the table's inline primary key.
    ///
    /// Any other field flagged as primary loses the flag, and the column
    /// becomes NOT NULL.
    #[must_use]
    pub fn primary_key(self) -> Self {
        let index = self.index;
        for (i, other) in self.table.fields.iter_mut().enumerate() {
            if i != index && other.def.primary {
                other.def.primary = false;
                other.altered = true;
            }
        }
        self.update(|def| {
            def.primary = true;
            def.nullable = false;
        })
    }

    /// Drops the inline primary key flag.
    #[must_use]
    pub fn not_primary_key(self) -> Self {
        self.update(|def| def.primary = false)
    }

    /// Places the column first.
    #[must_use]
    pub fn first(self) -> Self {
        self.update(|def| def.position = Position::First)
    }

    /// Places the column after another one.
    #[must_use]
    pub fn after(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.update(|def| def.position = Position::After(name))
    }

    /// Renames the column. The committed name is kept for the DDL.
    #[must_use]
    pub fn rename(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.update(|def| def.name = name)
    }

    /// Adds a single-column, non-unique index named after this field.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if a constraint with that name exists.
    pub fn index(self) -> Result<Self> {
        let name = self.table.fields[self.index].def.name.clone();
        self.table.index(name.clone(), [name])?;
        Ok(self)
    }

    /// Marks the field for deletion.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if this is the last field of the table
    /// that is not already deleted.
    pub fn delete(self) -> Result<Self> {
        let index = self.index;
        let remaining = self
            .table
            .fields
            .iter()
            .enumerate()
            .filter(|(i, f)| *i != index && !f.deleted)
            .count();
        if remaining == 0 {
            return Err(Error::InvariantViolation(format!(
                "cannot delete '{}', the last field of table '{}'; delete the table instead",
                self.table.fields[index].name(),
                self.table.name()
            )));
        }
        Ok(self.update_deleted(true))
    }

    /// Clears a pending deletion.
    #[must_use]
    pub fn undelete(self) -> Self {
        self.update_deleted(false)
    }

    fn update_deleted(self, deleted: bool) -> Self {
        let field = &mut self.table.fields[self.index];
        field.deleted = deleted;
        field.altered = true;
        self
    }
}

impl Deref for FieldMut<'_> {
    type Target = FieldDescriptor;

    fn deref(&self) -> &FieldDescriptor {
        &self.table.fields[self.index]
    }
}
