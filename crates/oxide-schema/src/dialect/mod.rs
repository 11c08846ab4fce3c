//! SQL dialects.
//!
//! A dialect turns descriptors and values into SQL text. Only the rules
//! that are the same for every database live in the default methods; the
//! rest is up to each implementation.

mod mysql;

pub use mysql::MySqlDialect;

use std::fmt::Debug;

use crate::change::Change;
use crate::constraint::{ConstraintDef, ConstraintKind};
use crate::error::Result;
use crate::field::{DefaultValue, FieldDef, FieldDescriptor, Position};
use crate::value::{Value, DATETIME_FORMAT};

/// Trait for database-specific SQL generation.
pub trait DialectCompiler: Debug + Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the column type for a field.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when the width or length has no column type.
    fn type_name(&self, field: &FieldDef) -> Result<String>;

    /// Returns the auto-increment keyword for this dialect.
    fn auto_increment_keyword(&self) -> &'static str;

    /// Renders a placement clause, if the dialect supports one.
    fn position_clause(&self, position: &Position) -> Option<String>;

    /// Fragment that alters an existing column, `old_name` being its
    /// committed name.
    fn alter_column(&self, old_name: &str, definition: &str) -> String;

    /// Fragment that drops a constraint.
    fn drop_constraint(&self, constraint: &ConstraintDef) -> String;

    /// Clause limiting a SELECT to one page.
    fn limit_clause(&self, offset: u64, count: u64) -> String {
        format!("LIMIT {count} OFFSET {offset}")
    }

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quote a string literal.
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Renders a value for inline use in a statement.
    fn render_value(&self, value: &Value) -> String {
        match value {
            Value::Null => String::from("NULL"),
            Value::Bool(true) => String::from("TRUE"),
            Value::Bool(false) => String::from("FALSE"),
            Value::Int(n) => n.to_string(),
            // Quoted so NaN and infinities stay valid SQL; MySQL coerces the text back.
            Value::Float(f) => self.quote_string(&f.to_string()),
            Value::Text(s) => self.quote_string(s),
            Value::DateTime(at) => self.quote_string(&at.format(DATETIME_FORMAT).to_string()),
            // `IN ()` is a syntax error; `IN (NULL)` matches nothing.
            Value::IntList(items) if items.is_empty() => String::from("(NULL)"),
            Value::IntList(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                format!("({})", items.join(", "))
            }
        }
    }

    /// Renders a default literal.
    fn default_literal(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::Null => String::from("NULL"),
            DefaultValue::Bool(true) => String::from("TRUE"),
            DefaultValue::Bool(false) => String::from("FALSE"),
            DefaultValue::Integer(n) => n.to_string(),
            DefaultValue::Text(s) => self.quote_string(s),
            DefaultValue::Expression(expr) => expr.clone(),
        }
    }

    /// Returns the DEFAULT clause of a column, if it has one.
    ///
    /// Auto-increment columns never get one. Without an explicit default a
    /// nullable column gets `DEFAULT NULL` and a NOT NULL column nothing.
    fn default_clause(&self, field: &FieldDef) -> Option<String> {
        if field.auto_increment {
            return None;
        }
        match &field.default {
            Some(value) => Some(format!("DEFAULT {}", self.default_literal(value))),
            None if field.nullable => Some(String::from("DEFAULT NULL")),
            None => None,
        }
    }

    /// Generates column definition SQL.
    ///
    /// Order: name, type, nullability, default, auto-increment, inline
    /// primary key, then placement when `with_position` is set.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::type_name`] errors.
    fn column_definition(&self, field: &FieldDef, with_position: bool) -> Result<String> {
        let mut parts = vec![self.quote_identifier(&field.name), self.type_name(field)?];

        parts.push(if field.nullable { "NULL" } else { "NOT NULL" }.to_string());

        if let Some(default) = self.default_clause(field) {
            parts.push(default);
        }
        if field.auto_increment {
            parts.push(self.auto_increment_keyword().to_string());
        }
        if field.primary {
            parts.push("PRIMARY KEY".to_string());
        }
        if with_position {
            if let Some(position) = self.position_clause(&field.position) {
                parts.push(position);
            }
        }

        Ok(parts.join(" "))
    }

    /// Compiles the fragment a field contributes to its table's statement.
    ///
    /// For a new table that is the bare column definition (placement is
    /// implied by declaration order); for an existing table it is an ADD,
    /// CHANGE or DROP fragment, or nothing when the column is unchanged.
    /// A CHANGE carries FIRST/AFTER only if the position differs from the
    /// loaded one.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::type_name`] errors.
    fn field_fragment(
        &self,
        field: &FieldDescriptor,
        table_is_new: bool,
    ) -> Result<Option<String>> {
        if table_is_new {
            if field.is_deleted() {
                return Ok(None);
            }
            return self.column_definition(field.def(), false).map(Some);
        }
        Ok(match field.change() {
            Change::Removed(old) => {
                Some(format!("DROP COLUMN {}", self.quote_identifier(&old.name)))
            }
            Change::Added => Some(format!(
                "ADD COLUMN {}",
                self.column_definition(field.def(), true)?
            )),
            Change::Modified(old) => {
                // Placement is repeated only when the caller moved the column.
                let moved = old.position != field.def().position;
                Some(self.alter_column(&old.name, &self.column_definition(field.def(), moved)?))
            }
            Change::Unchanged => None,
        })
    }

    /// Quoted, comma-separated column list in parentheses.
    fn column_list(&self, names: &[String]) -> String {
        let names: Vec<String> = names.iter().map(|n| self.quote_identifier(n)).collect();
        format!("({})", names.join(", "))
    }

    /// Definition of a constraint inside CREATE TABLE or after ADD.
    fn constraint_definition(&self, constraint: &ConstraintDef) -> String {
        let columns = self.column_list(&constraint.field_names);
        match (constraint.kind, constraint.unique) {
            (ConstraintKind::Primary, _) => format!("PRIMARY KEY {columns}"),
            (_, true) => format!(
                "UNIQUE INDEX {} {columns}",
                self.quote_identifier(&constraint.name)
            ),
            (_, false) => format!("INDEX {} {columns}", self.quote_identifier(&constraint.name)),
        }
    }

    /// Generates CREATE TABLE SQL.
    fn create_table(&self, table: &str, definitions: &[String]) -> String {
        format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(table),
            definitions.join(", ")
        )
    }

    /// Generates one ALTER TABLE statement from several fragments.
    fn alter_table(&self, table: &str, fragments: &[String]) -> String {
        format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(table),
            fragments.join(", ")
        )
    }

    /// Generates an ALTER TABLE statement adding one constraint.
    fn add_constraint(&self, table: &str, constraint: &ConstraintDef) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.constraint_definition(constraint)
        )
    }

    /// Generates DROP TABLE SQL.
    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table))
    }

    /// Generates SQL creating an empty table with another table's structure.
    fn copy_table(&self, from: &str, to: &str) -> String {
        format!(
            "CREATE TABLE {} LIKE {}",
            self.quote_identifier(to),
            self.quote_identifier(from)
        )
    }
}
