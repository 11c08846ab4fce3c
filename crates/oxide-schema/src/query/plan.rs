//! Dialect-independent description of a query.

use crate::value::Value;

use super::condition::Condition;

/// Kind of statement a query compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// `SELECT ... FROM ...`
    #[default]
    Select,
    /// `UPDATE ... SET ... WHERE ...`
    Update,
    /// `INSERT INTO ... SET ...`
    Insert,
}

/// `left_alias.left_field <op> right_alias.right_field` in a JOIN's ON clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCondition {
    /// Alias on the left-hand side.
    pub left_alias: String,
    /// Field on the left-hand side.
    pub left_field: String,
    /// Comparison operator.
    pub operator: String,
    /// Alias on the right-hand side.
    pub right_alias: String,
    /// Field on the right-hand side.
    pub right_field: String,
}

/// A table taking part in a SELECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Table name.
    pub name: String,
    /// Alias used by selects and conditions.
    pub alias: String,
    /// ON conditions attaching it to the tables before it.
    pub join_conditions: Vec<JoinCondition>,
}

/// One item of the select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectItem {
    /// Alias of the source table.
    pub table_alias: String,
    /// Field name, or `*`.
    pub field: String,
    /// Output column name.
    pub output_alias: Option<String>,
}

/// Everything needed to compile a query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPlan {
    /// Tables in join order; the first is the FROM anchor.
    pub tables: Vec<TableRef>,
    /// Target of an UPDATE or INSERT.
    pub target: Option<String>,
    /// Select list; empty means `*`.
    pub selects: Vec<SelectItem>,
    /// SET assignments in insertion order, one per field.
    pub sets: Vec<(String, Value)>,
    /// Root WHERE list.
    pub wheres: Vec<Condition>,
    /// Statement kind.
    pub mode: QueryMode,
    /// Page number, starting at 1.
    pub page: u64,
    /// Rows per page; 0 disables pagination.
    pub page_size: u64,
}

impl QueryPlan {
    /// Offset of the first row of the current page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        let page = if self.page < 1 { 1 } else { self.page };
        (page - 1).saturating_mul(self.page_size)
    }
}
