//! MySQL dialect.

use crate::constraint::{ConstraintDef, ConstraintKind};
use crate::error::{Error, Result};
use crate::field::{DataType, FieldDef, Position};

use super::DialectCompiler;

/// Text lengths that map to the MySQL TEXT family.
const TEXT_TYPES: [(u64, &str); 4] = [
    (255, "TINYTEXT"),
    (65_535, "TEXT"),
    (16_777_215, "MEDIUMTEXT"),
    (4_294_967_295, "LONGTEXT"),
];

/// MySQL dialect for schema changes and queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectCompiler for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn type_name(&self, field: &FieldDef) -> Result<String> {
        match field.data_type {
            DataType::Int => {
                let base = match field.length {
                    Some(1) => "TINYINT",
                    Some(2) => "SMALLINT",
                    Some(3) => "MEDIUMINT",
                    Some(4) => "INT",
                    Some(8) => "BIGINT",
                    other => {
                        return Err(Error::Configuration(format!(
                            "field '{}' has integer width {}; expected 1, 2, 3, 4 or 8 bytes",
                            field.name,
                            describe_length(other)
                        )))
                    }
                };
                Ok(if field.signed {
                    base.to_string()
                } else {
                    format!("{base} UNSIGNED")
                })
            }
            DataType::Text => match field.length {
                Some(n) if (1..255).contains(&n) => Ok(format!("VARCHAR({n})")),
                Some(n) => TEXT_TYPES
                    .iter()
                    .find(|(max, _)| *max == n)
                    .map(|(_, name)| (*name).to_string())
                    .ok_or_else(|| text_length_error(field)),
                None => Err(text_length_error(field)),
            },
            DataType::DateTime => Ok("DATETIME".to_string()),
            DataType::Boolean => Ok("TINYINT(1)".to_string()),
        }
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn position_clause(&self, position: &Position) -> Option<String> {
        match position {
            Position::Unspecified => None,
            Position::First => Some("FIRST".to_string()),
            Position::After(name) => Some(format!("AFTER {}", self.quote_identifier(name))),
        }
    }

    fn alter_column(&self, old_name: &str, definition: &str) -> String {
        format!("CHANGE COLUMN {} {definition}", self.quote_identifier(old_name))
    }

    fn drop_constraint(&self, constraint: &ConstraintDef) -> String {
        match constraint.kind {
            ConstraintKind::Primary => "DROP PRIMARY KEY".to_string(),
            ConstraintKind::Index => {
                format!("DROP INDEX {}", self.quote_identifier(&constraint.name))
            }
        }
    }

    fn limit_clause(&self, offset: u64, count: u64) -> String {
        format!("LIMIT {offset}, {count}")
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn quote_string(&self, value: &str) -> String {
        let mut quoted = String::with_capacity(value.len() + 2);
        quoted.push('\'');
        for c in value.chars() {
            match c {
                '\'' => quoted.push_str("''"),
                '\\' => quoted.push_str("\\\\"),
                '\0' => quoted.push_str("\\0"),
                '\n' => quoted.push_str("\\n"),
                '\r' => quoted.push_str("\\r"),
                '\u{1a}' => quoted.push_str("\\Z"),
                _ => quoted.push(c),
            }
        }
        quoted.push('\'');
        quoted
    }
}

fn describe_length(length: Option<u64>) -> String {
    length.map_or_else(|| "unset".to_string(), |n| n.to_string())
}

fn text_length_error(field: &FieldDef) -> Error {
    Error::Configuration(format!(
        "field '{}' has text length {}; expected less than 255, or exactly 255, 65535, 16777215 or 4294967295",
        field.name,
        describe_length(field.length)
    ))
}
