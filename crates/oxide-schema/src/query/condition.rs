//! Condition trees for WHERE clauses.

use crate::value::Value;

/// How a condition joins the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    /// `AND`
    #[default]
    And,
    /// `OR`
    Or,
}

impl Conjunction {
    /// The SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Comparison operators accepted in predicates.
pub const OPERATORS: [&str; 13] = [
    "=", "!=", "<>", "<", ">", "<=", ">=", "LIKE", "NOT LIKE", "IN", "NOT IN", "IS", "IS NOT",
];

/// A single comparison, `alias.field <op> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Alias of the table the field belongs to.
    pub table_alias: String,
    /// Field name.
    pub field: String,
    /// Operator as given, upper-cased.
    pub operator: String,
    /// Right-hand operand.
    pub value: Value,
    /// Joins this predicate to the previous element of its list.
    pub conjunction: Conjunction,
}

impl Predicate {
    /// The operator actually compiled.
    ///
    /// Equality against NULL becomes `IS` and against an integer list
    /// becomes `IN`; the negated forms follow.
    #[must_use]
    pub fn effective_operator(&self) -> &str {
        match (self.operator.as_str(), &self.value) {
            ("=", Value::Null) => "IS",
            ("!=" | "<>", Value::Null) => "IS NOT",
            ("=", Value::IntList(_)) => "IN",
            ("!=" | "<>", Value::IntList(_)) => "NOT IN",
            (op, _) => op,
        }
    }
}

/// A parenthesized list of conditions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    /// Conjunction set when the group was opened, or `None` to use its
    /// first child's.
    pub conjunction: Option<Conjunction>,
    /// Members of the group.
    pub children: Vec<Condition>,
}

/// A node of a WHERE tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// A single predicate.
    Leaf(Predicate),
    /// A nested group.
    Group(Group),
}

impl Condition {
    /// The conjunction that joins this node to its previous sibling.
    ///
    /// A group without its own conjunction takes its first child's,
    /// recursively.
    #[must_use]
    pub fn leading_conjunction(&self) -> Conjunction {
        match self {
            Self::Leaf(predicate) => predicate.conjunction,
            Self::Group(group) => group.conjunction.unwrap_or_else(|| {
                group
                    .children
                    .first()
                    .map_or(Conjunction::And, Self::leading_conjunction)
            }),
        }
    }
}
