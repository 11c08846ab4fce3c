//! Fluent query builder.

use tracing::debug;

use crate::cursor::ResultCursor;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::value::Value;

use super::compile::QueryCompiler;
use super::condition::{Condition, Conjunction, Group, Predicate, OPERATORS};
use super::plan::{JoinCondition, QueryMode, QueryPlan, SelectItem, TableRef};

/// Builds SELECT, UPDATE and INSERT statements with joins, nested AND/OR
/// groups and pagination.
///
/// Mistakes such as joining without two tables are remembered and
/// reported by [`QueryBuilder::build`], so calls can chain freely.
///
/// ```ignore
/// let sql = engine
///     .query()
///     .table("users", "u")
///     .table("orders", "o")
///     .cond_on("u", "id", "=", "o", "user_id")
///     .where_("u", "active", "=", true)
///     .group()
///     .where_("o", "total", ">", 100)
///     .or()
///     .where_("o", "status", "=", vec![1, 2])
///     .group_end()
///     .quantity(20)
///     .page(2)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    engine: Engine,
    plan: QueryPlan,
    pending: Option<Conjunction>,
    open_groups: Vec<Group>,
    explicit_groups: bool,
    misuse: Option<String>,
}

impl QueryBuilder {
    /// Creates an empty SELECT builder.
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            plan: QueryPlan {
                page: 1,
                ..QueryPlan::default()
            },
            pending: None,
            open_groups: Vec::new(),
            explicit_groups: false,
            misuse: None,
        }
    }

    fn misuse(mut self, message: impl Into<String>) -> Self {
        if self.misuse.is_none() {
            self.misuse = Some(message.into());
        }
        self
    }

    /// Adds a table. The first table is the FROM anchor; later ones are
    /// LEFT JOINed.
    #[must_use]
    pub fn table(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        if self.plan.mode != QueryMode::Select {
            return self.misuse("tables cannot be added to an UPDATE or INSERT");
        }
        self.plan.tables.push(TableRef {
            name: name.into(),
            alias: alias.into(),
            join_conditions: Vec::new(),
        });
        self
    }

    /// Joins the last table to the one before it on a column both share.
    #[must_use]
    pub fn cond(self, field: &str) -> Self {
        let count = self.plan.tables.len();
        if count < 2 {
            return self.misuse("cond() needs at least two tables");
        }
        let left = self.plan.tables[count - 2].alias.clone();
        let right = self.plan.tables[count - 1].alias.clone();
        self.cond_on(&left, field, "=", &right, field)
    }

    /// Adds an explicit ON condition to the last table.
    #[must_use]
    pub fn cond_on(
        mut self,
        left_alias: &str,
        left_field: &str,
        operator: &str,
        right_alias: &str,
        right_field: &str,
    ) -> Self {
        if self.plan.tables.len() < 2 {
            return self.misuse("join conditions need at least two tables");
        }
        let Some(operator) = normalize_operator(operator) else {
            return self.misuse(format!("unsupported operator '{operator}'"));
        };
        if let Some(table) = self.plan.tables.last_mut() {
            table.join_conditions.push(JoinCondition {
                left_alias: left_alias.to_owned(),
                left_field: left_field.to_owned(),
                operator,
                right_alias: right_alias.to_owned(),
                right_field: right_field.to_owned(),
            });
        }
        self
    }

    /// Selects a field under its own name.
    #[must_use]
    pub fn select(self, alias: &str, field: &str) -> Self {
        let output = (field != "*").then(|| field.to_owned());
        self.push_select(alias, field, output)
    }

    /// Selects a field under another name.
    #[must_use]
    pub fn select_as(self, alias: &str, field: &str, output_alias: &str) -> Self {
        self.push_select(alias, field, Some(output_alias.to_owned()))
    }

    fn push_select(mut self, alias: &str, field: &str, output_alias: Option<String>) -> Self {
        if self.plan.mode != QueryMode::Select {
            return self.misuse("selects are only valid in a SELECT");
        }
        self.plan.selects.push(SelectItem {
            table_alias: alias.to_owned(),
            field: field.to_owned(),
            output_alias,
        });
        self
    }

    /// Adds a predicate to the innermost open group, or the root list.
    ///
    /// It is joined to the previous element with the conjunction set by
    /// [`Self::or`] / [`Self::and`], `AND` by default.
    #[must_use]
    pub fn where_(
        mut self,
        alias: &str,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Self {
        let Some(operator) = normalize_operator(operator) else {
            return self.misuse(format!("unsupported operator '{operator}'"));
        };
        let predicate = Predicate {
            table_alias: alias.to_owned(),
            field: field.to_owned(),
            operator,
            value: value.into(),
            conjunction: self.pending.take().unwrap_or_default(),
        };
        self.push_condition(Condition::Leaf(predicate));
        self
    }

    fn push_condition(&mut self, condition: Condition) {
        match self.open_groups.last_mut() {
            Some(group) => group.children.push(condition),
            None => self.plan.wheres.push(condition),
        }
    }

    /// Joins the next condition with `OR`.
    #[must_use]
    pub fn or(mut self) -> Self {
        self.pending = Some(Conjunction::Or);
        self
    }

    /// Joins the next condition with `AND`.
    #[must_use]
    pub fn and(mut self) -> Self {
        self.pending = Some(Conjunction::And);
        self
    }

    /// Opens a parenthesized group.
    ///
    /// By default the group is joined to its previous sibling with the
    /// conjunction of its first member. With [`Self::explicit_groups`] it
    /// takes the conjunction pending when it is opened.
    #[must_use]
    pub fn group(mut self) -> Self {
        let conjunction = if self.explicit_groups {
            Some(self.pending.take().unwrap_or_default())
        } else {
            None
        };
        self.open_groups.push(Group {
            conjunction,
            children: Vec::new(),
        });
        self
    }

    /// Closes the innermost group. Empty groups are dropped.
    #[must_use]
    pub fn group_end(mut self) -> Self {
        let Some(group) = self.open_groups.pop() else {
            return self.misuse("group_end() without a matching group()");
        };
        if !group.children.is_empty() {
            self.push_condition(Condition::Group(group));
        }
        self
    }

    /// Makes groups use the conjunction pending when they are opened
    /// instead of their first member's.
    #[must_use]
    pub fn explicit_groups(mut self) -> Self {
        self.explicit_groups = true;
        self
    }

    /// Assigns a value; a later assignment to the same field replaces it.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.plan.sets.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.plan.sets.push((field, value)),
        }
        self
    }

    /// Turns the builder into an UPDATE of `table`.
    #[must_use]
    pub fn update(self, table: impl Into<String>) -> Self {
        self.target(QueryMode::Update, table.into())
    }

    /// Turns the builder into an INSERT into `table`.
    #[must_use]
    pub fn insert(self, table: impl Into<String>) -> Self {
        self.target(QueryMode::Insert, table.into())
    }

    fn target(mut self, mode: QueryMode, table: String) -> Self {
        if self.plan.mode != QueryMode::Select
            || !self.plan.tables.is_empty()
            || !self.plan.selects.is_empty()
        {
            return self.misuse(
                "update() and insert() cannot be combined with tables, selects or each other",
            );
        }
        self.plan.mode = mode;
        self.plan.target = Some(table);
        self
    }

    /// Rows per page; 0 disables pagination.
    #[must_use]
    pub fn quantity(mut self, quantity: u64) -> Self {
        self.plan.page_size = quantity;
        self
    }

    /// Page number, starting at 1.
    #[must_use]
    pub fn page(mut self, page: u64) -> Self {
        self.plan.page = page;
        self
    }

    /// Returns the validated plan.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for misuse recorded while building, unclosed
    /// groups, a SELECT without tables, or an UPDATE/INSERT without
    /// assignments.
    pub fn plan(&self) -> Result<QueryPlan> {
        if let Some(message) = &self.misuse {
            return Err(Error::InvalidQuery(message.clone()));
        }
        if !self.open_groups.is_empty() {
            return Err(Error::InvalidQuery(format!(
                "{} group(s) left open",
                self.open_groups.len()
            )));
        }
        match self.plan.mode {
            QueryMode::Select if self.plan.tables.is_empty() => {
                return Err(Error::InvalidQuery("SELECT without a table".into()))
            }
            QueryMode::Select if !self.plan.sets.is_empty() => {
                return Err(Error::InvalidQuery("SET is only valid in UPDATE or INSERT".into()))
            }
            QueryMode::Update | QueryMode::Insert if self.plan.sets.is_empty() => {
                return Err(Error::InvalidQuery("UPDATE and INSERT need at least one set()".into()))
            }
            QueryMode::Insert if !self.plan.wheres.is_empty() => {
                return Err(Error::InvalidQuery("INSERT cannot have WHERE conditions".into()))
            }
            _ => {}
        }
        Ok(self.plan.clone())
    }

    /// Compiles the query.
    ///
    /// # Errors
    ///
    /// Same as [`Self::plan`].
    pub fn build(&self) -> Result<String> {
        let plan = self.plan()?;
        let sql = QueryCompiler::new(self.engine.dialect(), self.engine.database()).compile(&plan);
        debug!(sql = %sql, "Compiled query");
        Ok(sql)
    }

    /// Runs the query.
    ///
    /// A SELECT returns a lazy cursor; an UPDATE or INSERT runs right away
    /// and the cursor reports the affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`Self::build`] errors and, for UPDATE/INSERT, driver errors.
    pub async fn run(self) -> Result<ResultCursor> {
        let sql = self.build()?;
        let connection = self.engine.connection().clone();
        match self.plan.mode {
            QueryMode::Select => Ok(ResultCursor::open(connection, sql)),
            QueryMode::Update | QueryMode::Insert => ResultCursor::execute(connection, sql).await,
        }
    }
}

fn normalize_operator(operator: &str) -> Option<String> {
    let normalized = operator.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    OPERATORS.contains(&normalized.as_str()).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::catalog_with;

    fn query() -> QueryBuilder {
        let (catalog, _) = catalog_with(vec![]);
        Engine::from_catalog(catalog).query()
    }

    #[test]
    fn test_operator_normalization() {
        assert_eq!(normalize_operator(" not   like ").as_deref(), Some("NOT LIKE"));
        assert_eq!(normalize_operator("; DROP"), None);
    }

    #[test]
    fn test_unknown_operator_is_reported_at_build() {
        let q = query().table("t", "t1").where_("t1", "a", "=~", 1);
        assert!(matches!(q.build(), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_cond_needs_two_tables() {
        let q = query().table("t", "t1").cond("id");
        assert!(matches!(q.build(), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_unbalanced_groups() {
        let open = query().table("t", "t1").group().where_("t1", "a", "=", 1);
        assert!(matches!(open.build(), Err(Error::InvalidQuery(_))));
        let closed_twice = query().table("t", "t1").group_end();
        assert!(matches!(closed_twice.build(), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_update_after_table_is_misuse() {
        let q = query().table("t", "t1").update("t").set("a", 1);
        assert!(matches!(q.build(), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_set_replaces_previous_value() {
        let plan = query().update("t").set("a", 1).set("b", 2).set("a", 3).plan().unwrap();
        assert_eq!(
            plan.sets,
            vec![("a".to_string(), Value::Int(3)), ("b".to_string(), Value::Int(2))]
        );
    }

    #[test]
    fn test_empty_group_is_dropped() {
        let plan = query().table("t", "t1").group().group_end().plan().unwrap();
        assert!(plan.wheres.is_empty());
    }
}
