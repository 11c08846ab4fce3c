//! Table descriptors and the save plan compiler.
//!
//! A [`TableDescriptor`] is an owned checkout of one table: mutate it in
//! memory, then [`TableDescriptor::save`] compiles the difference from the
//! committed shape into DDL, runs it and hands back a freshly loaded
//! descriptor.

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::change::Change;
use crate::connection::TableMetadata;
use crate::constraint::{ConstraintDef, ConstraintDescriptor, ConstraintKind, PRIMARY_KEY_NAME};
use crate::error::{Error, Result};
use crate::field::{DataType, FieldDef, FieldDescriptor, FieldMut, Position};

/// What a planned statement does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Creates the table.
    CreateTable,
    /// Adds, alters or drops columns and drops constraints.
    AlterTable,
    /// Adds one constraint to an existing table.
    AddConstraint,
    /// Drops the table.
    DropTable,
}

/// One statement of a [`SavePlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStatement {
    /// What the statement does.
    pub kind: StatementKind,
    /// The SQL text.
    pub sql: String,
}

/// The ordered statements saving a table would run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePlan {
    table: String,
    statements: Vec<PlannedStatement>,
}

impl SavePlan {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_owned(),
            statements: Vec::new(),
        }
    }

    fn push(&mut self, kind: StatementKind, sql: String) {
        debug!(table = %self.table, sql = %sql, "Planned statement");
        self.statements.push(PlannedStatement { kind, sql });
    }

    /// The table this plan applies to.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The statements in execution order.
    #[must_use]
    pub fn statements(&self) -> &[PlannedStatement] {
        &self.statements
    }

    /// The SQL of every statement in execution order.
    #[must_use]
    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.sql.as_str()).collect()
    }

    /// Returns true if saving would run nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }
}

/// A table with its fields and constraints.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    name: String,
    pub(crate) fields: Vec<FieldDescriptor>,
    constraints: Vec<ConstraintDescriptor>,
    new: bool,
    deleted: bool,
    catalog: Catalog,
}

impl TableDescriptor {
    /// A table that does not exist yet.
    pub(crate) fn declared(name: impl Into<String>, catalog: Catalog) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            constraints: Vec::new(),
            new: true,
            deleted: false,
            catalog,
        }
    }

    /// A table loaded from introspected metadata.
    ///
    /// Loaded fields record their physical neighbour; an ALTER repeats it
    /// only once the caller moves the column.
    pub(crate) fn loaded(metadata: &TableMetadata, catalog: Catalog) -> Self {
        let mut previous: Option<&str> = None;
        let fields = metadata
            .columns
            .iter()
            .map(|column| {
                let position = previous.map_or(Position::First, |p| Position::After(p.to_owned()));
                previous = Some(column.name.as_str());
                FieldDescriptor::loaded(FieldDef {
                    name: column.name.clone(),
                    data_type: column.data_type,
                    length: column.length,
                    signed: column.signed,
                    default: column.default.clone(),
                    nullable: column.nullable,
                    auto_increment: column.auto_increment,
                    primary: false,
                    position,
                })
            })
            .collect();
        let constraints = metadata
            .indexes
            .iter()
            .map(|index| {
                ConstraintDescriptor::loaded(ConstraintDef::new(
                    index.name.clone(),
                    index.kind,
                    index.unique,
                    index.field_names.clone(),
                ))
            })
            .collect();
        Self {
            name: metadata.name.clone(),
            fields,
            constraints,
            new: false,
            deleted: false,
            catalog,
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True until the table has been created.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.new
    }

    /// True once `delete()` has been called and not undone.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// The catalog this table belongs to.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// All fields in declaration order, deleted ones included.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Names of the fields that are not deleted.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|f| !f.is_deleted()).map(FieldDescriptor::name)
    }

    /// All constraints, deleted ones included.
    #[must_use]
    pub fn constraints(&self) -> &[ConstraintDescriptor] {
        &self.constraints
    }

    // ==================== Fields ====================

    /// Declares a new field and returns a handle to configure it.
    pub fn field(&mut self, name: impl Into<String>, data_type: DataType) -> FieldMut<'_> {
        self.fields
            .push(FieldDescriptor::declared(FieldDef::new(name, data_type)));
        let index = self.fields.len() - 1;
        FieldMut::new(self, index)
    }

    /// Declares a 4-byte integer field.
    pub fn int(&mut self, name: impl Into<String>) -> FieldMut<'_> {
        self.field(name, DataType::Int).length(4)
    }

    /// Declares an 8-byte integer field.
    pub fn big_int(&mut self, name: impl Into<String>) -> FieldMut<'_> {
        self.field(name, DataType::Int).length(8)
    }

    /// Declares a VARCHAR field.
    pub fn varchar(&mut self, name: impl Into<String>, length: u64) -> FieldMut<'_> {
        self.field(name, DataType::Text).length(length)
    }

    /// Declares a TEXT field.
    pub fn text(&mut self, name: impl Into<String>) -> FieldMut<'_> {
        self.field(name, DataType::Text).length(65_535)
    }

    /// Declares a boolean field.
    pub fn bool(&mut self, name: impl Into<String>) -> FieldMut<'_> {
        self.field(name, DataType::Boolean)
    }

    /// Declares a DATETIME field.
    pub fn date_time(&mut self, name: impl Into<String>) -> FieldMut<'_> {
        self.field(name, DataType::DateTime)
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    /// Finds a field by its current name, deleted fields included.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.position_of(name).map(|i| &self.fields[i])
    }

    /// Returns a handle to mutate an existing field.
    pub fn field_mut(&mut self, name: &str) -> Option<FieldMut<'_>> {
        let index = self.position_of(name)?;
        Some(FieldMut::new(self, index))
    }

    /// Marks a field for deletion.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such field and
    /// `InvariantViolation` if it is the last one.
    pub fn delete_field(&mut self, name: &str) -> Result<&mut Self> {
        let field = self
            .field_mut(name)
            .ok_or_else(|| Error::not_found("field", name))?;
        let _ = field.delete()?;
        Ok(self)
    }

    // ==================== Constraints ====================

    /// Declares a new constraint.
    ///
    /// A primary key is always named `PRIMARY`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if a non-deleted constraint has the same
    /// name, or if the table already has a primary key.
    pub fn constraint<I, S>(
        &mut self,
        name: impl Into<String>,
        kind: ConstraintKind,
        unique: bool,
        field_names: I,
    ) -> Result<&mut ConstraintDescriptor>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let def = ConstraintDef::new(
            name,
            kind,
            unique,
            field_names.into_iter().map(Into::into).collect(),
        );
        if self.live_constraint(&def.name).is_some() {
            return Err(match kind {
                ConstraintKind::Primary => Error::already_exists("primary key", &self.name),
                ConstraintKind::Index => Error::already_exists("constraint", def.name),
            });
        }
        self.constraints.push(ConstraintDescriptor::declared(def));
        let index = self.constraints.len() - 1;
        Ok(&mut self.constraints[index])
    }

    /// Declares the table's primary key.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the table already has one.
    pub fn primary_key<I, S>(&mut self, field_names: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraint(PRIMARY_KEY_NAME, ConstraintKind::Primary, true, field_names)?;
        Ok(self)
    }

    /// Declares a non-unique index.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the name is taken.
    pub fn index<I, S>(&mut self, name: impl Into<String>, field_names: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraint(name, ConstraintKind::Index, false, field_names)?;
        Ok(self)
    }

    /// Declares a unique index.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the name is taken.
    pub fn unique_index<I, S>(
        &mut self,
        name: impl Into<String>,
        field_names: I,
    ) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraint(name, ConstraintKind::Index, true, field_names)?;
        Ok(self)
    }

    fn live_constraint(&self, name: &str) -> Option<usize> {
        self.constraints
            .iter()
            .position(|c| !c.is_deleted() && c.name() == name)
    }

    /// Finds a non-deleted constraint by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is none.
    pub fn get_constraint(&self, name: &str) -> Result<&ConstraintDescriptor> {
        self.live_constraint(name)
            .map(|i| &self.constraints[i])
            .ok_or_else(|| Error::not_found("constraint", name))
    }

    /// Finds a constraint by name, deleted ones included, for mutation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is none.
    pub fn constraint_mut(&mut self, name: &str) -> Result<&mut ConstraintDescriptor> {
        let index = self
            .live_constraint(name)
            .or_else(|| self.constraints.iter().position(|c| c.name() == name))
            .ok_or_else(|| Error::not_found("constraint", name))?;
        Ok(&mut self.constraints[index])
    }

    /// Marks a constraint for deletion.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such non-deleted constraint.
    pub fn delete_constraint(&mut self, name: &str) -> Result<&mut Self> {
        let index = self
            .live_constraint(name)
            .ok_or_else(|| Error::not_found("constraint", name))?;
        self.constraints[index].delete();
        Ok(self)
    }

    /// The primary key, declared as a constraint or inline on a field.
    #[must_use]
    pub fn primary_key_fields(&self) -> Vec<&str> {
        if let Ok(pk) = self.get_constraint(PRIMARY_KEY_NAME) {
            return pk.field_names().iter().map(String::as_str).collect();
        }
        self.fields
            .iter()
            .filter(|f| !f.is_deleted() && f.is_primary())
            .map(FieldDescriptor::name)
            .collect()
    }

    // ==================== Lifecycle ====================

    /// Marks the whole table for dropping on the next save.
    pub fn delete(&mut self) -> &mut Self {
        self.deleted = true;
        self
    }

    /// Clears a pending table drop.
    pub fn undelete(&mut self) -> &mut Self {
        self.deleted = false;
        self
    }

    /// Compiles the statements `save()` would run, without running them.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for fields with no column type,
    /// `InvariantViolation` when an existing constraint was altered in
    /// place or a new table has no fields.
    pub fn plan(&self) -> Result<SavePlan> {
        let dialect = self.catalog.dialect();
        let mut plan = SavePlan::new(&self.name);

        if self.deleted {
            if !self.new {
                plan.push(StatementKind::DropTable, dialect.drop_table(&self.name));
            }
            return Ok(plan);
        }

        let mut fragments = Vec::new();
        for field in &self.fields {
            if let Some(fragment) = dialect.field_fragment(field, self.new)? {
                fragments.push(fragment);
            }
        }

        let mut added = Vec::new();
        for constraint in &self.constraints {
            match constraint.change() {
                Change::Removed(old) if !self.new => fragments.push(dialect.drop_constraint(&old)),
                Change::Added => added.push(constraint.def()),
                Change::Modified(old) => {
                    return Err(Error::InvariantViolation(format!(
                        "constraint '{}' of table '{}' was altered in place; delete it and declare a new one",
                        old.name, self.name
                    )))
                }
                Change::Removed(_) | Change::Unchanged => {}
            }
        }

        if self.new {
            if fragments.is_empty() {
                return Err(Error::InvariantViolation(format!(
                    "table '{}' has no fields",
                    self.name
                )));
            }
            fragments.extend(added.iter().map(|c| dialect.constraint_definition(c)));
            plan.push(
                StatementKind::CreateTable,
                dialect.create_table(&self.name, &fragments),
            );
        } else {
            if !fragments.is_empty() {
                plan.push(
                    StatementKind::AlterTable,
                    dialect.alter_table(&self.name, &fragments),
                );
            }
            for constraint in added {
                plan.push(
                    StatementKind::AddConstraint,
                    dialect.add_constraint(&self.name, constraint),
                );
            }
        }

        Ok(plan)
    }

    /// Compiles a CREATE TABLE statement reproducing the current shape,
    /// whatever the table's state.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for fields with no column type.
    pub fn create_statement(&self) -> Result<String> {
        let dialect = self.catalog.dialect();
        let mut definitions = Vec::new();
        for field in self.fields.iter().filter(|f| !f.is_deleted()) {
            definitions.push(dialect.column_definition(field.def(), false)?);
        }
        definitions.extend(
            self.constraints
                .iter()
                .filter(|c| !c.is_deleted())
                .map(|c| dialect.constraint_definition(c.def())),
        );
        Ok(dialect.create_table(&self.name, &definitions))
    }

    /// Applies pending changes and returns the table as reloaded from the
    /// database.
    ///
    /// Saving with nothing to change runs no statement and returns the
    /// descriptor as is. A dropped table is returned as is, marked deleted.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::plan`], `SaveAborted` when a statement
    /// fails (earlier statements stay applied), and introspection errors
    /// from the reload.
    pub async fn save(self) -> Result<Self> {
        let plan = self.plan()?;
        if plan.is_empty() {
            debug!(table = %self.name, "No schema changes to save");
            return Ok(self);
        }

        self.catalog.apply(&plan).await?;

        if self.deleted {
            info!(table = %self.name, "Dropped table");
            return Ok(self);
        }
        if self.new {
            info!(table = %self.name, "Created table");
        } else {
            info!(table = %self.name, statements = plan.len(), "Altered table");
        }
        self.catalog.get(&self.name).await
    }

    /// Creates an empty table with the same structure under a new name and
    /// returns it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if this table has not been created yet,
    /// `AlreadyExists` if the target exists, and driver errors.
    pub async fn copy(&self, new_name: &str) -> Result<Self> {
        if self.new {
            return Err(Error::not_found("table", &self.name));
        }
        if self.catalog.table_exists(new_name).await? {
            return Err(Error::already_exists("table", new_name));
        }
        let sql = self.catalog.dialect().copy_table(&self.name, new_name);
        self.catalog.execute(&sql).await?;
        info!(from = %self.name, to = %new_name, "Copied table structure");
        self.catalog.get(new_name).await
    }
}
