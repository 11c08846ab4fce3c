//! Compiles a [`QueryPlan`] to SQL text.

use crate::dialect::DialectCompiler;

use super::condition::{Condition, Predicate};
use super::plan::{QueryMode, QueryPlan, SelectItem, TableRef};

pub(crate) struct QueryCompiler<'a> {
    dialect: &'a dyn DialectCompiler,
    database: Option<&'a str>,
}

impl<'a> QueryCompiler<'a> {
    pub(crate) fn new(dialect: &'a dyn DialectCompiler, database: Option<&'a str>) -> Self {
        Self { dialect, database }
    }

    /// Joins the non-empty segments head, tables, SET, WHERE and LIMIT.
    pub(crate) fn compile(&self, plan: &QueryPlan) -> String {
        let segments = [
            self.head(plan),
            self.tables(plan),
            self.sets(plan),
            self.wheres(plan),
            self.limit(plan),
        ];
        segments
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn head(&self, plan: &QueryPlan) -> String {
        match plan.mode {
            QueryMode::Update => "UPDATE".to_string(),
            QueryMode::Insert => "INSERT INTO".to_string(),
            QueryMode::Select if plan.selects.is_empty() => "SELECT *".to_string(),
            QueryMode::Select => {
                let items: Vec<String> = plan.selects.iter().map(|s| self.select_item(s)).collect();
                format!("SELECT {}", items.join(", "))
            }
        }
    }

    fn select_item(&self, item: &SelectItem) -> String {
        let field = if item.field == "*" {
            "*".to_string()
        } else {
            self.quote(&item.field)
        };
        let column = format!("{}.{field}", self.quote(&item.table_alias));
        match &item.output_alias {
            Some(alias) => format!("{column} AS {}", self.quote(alias)),
            None => column,
        }
    }

    fn qualified_table(&self, name: &str) -> String {
        match self.database {
            Some(database) => format!("{}.{}", self.quote(database), self.quote(name)),
            None => self.quote(name),
        }
    }

    fn tables(&self, plan: &QueryPlan) -> String {
        match plan.mode {
            QueryMode::Update | QueryMode::Insert => plan
                .target
                .as_deref()
                .map(|t| self.quote(t))
                .unwrap_or_default(),
            QueryMode::Select => {
                let tables: Vec<String> = plan.tables.iter().map(|t| self.table_ref(t)).collect();
                format!("FROM {}", tables.join(" LEFT JOIN "))
            }
        }
    }

    fn table_ref(&self, table: &TableRef) -> String {
        let mut sql = format!(
            "{} AS {}",
            self.qualified_table(&table.name),
            self.quote(&table.alias)
        );
        if !table.join_conditions.is_empty() {
            let conditions: Vec<String> = table
                .join_conditions
                .iter()
                .map(|c| {
                    format!(
                        "{}.{} {} {}.{}",
                        self.quote(&c.left_alias),
                        self.quote(&c.left_field),
                        c.operator,
                        self.quote(&c.right_alias),
                        self.quote(&c.right_field)
                    )
                })
                .collect();
            sql.push_str(" ON ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql
    }

    fn sets(&self, plan: &QueryPlan) -> String {
        if plan.sets.is_empty() {
            return String::new();
        }
        let assignments: Vec<String> = plan
            .sets
            .iter()
            .map(|(field, value)| {
                format!("{} = {}", self.quote(field), self.dialect.render_value(value))
            })
            .collect();
        format!("SET {}", assignments.join(", "))
    }

    fn wheres(&self, plan: &QueryPlan) -> String {
        if plan.wheres.is_empty() {
            return String::new();
        }
        let omit_alias = plan.mode == QueryMode::Update;
        format!("WHERE {}", self.condition_list(&plan.wheres, omit_alias))
    }

    /// Every element but the first of a list is prefixed by its conjunction.
    fn condition_list(&self, conditions: &[Condition], omit_alias: bool) -> String {
        conditions
            .iter()
            .enumerate()
            .map(|(i, condition)| {
                let body = match condition {
                    Condition::Leaf(predicate) => self.predicate(predicate, omit_alias),
                    Condition::Group(group) => {
                        format!("({})", self.condition_list(&group.children, omit_alias))
                    }
                };
                if i == 0 {
                    body
                } else {
                    format!("{} {body}", condition.leading_conjunction().as_sql())
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn predicate(&self, predicate: &Predicate, omit_alias: bool) -> String {
        let field = if omit_alias {
            self.quote(&predicate.field)
        } else {
            format!(
                "{}.{}",
                self.quote(&predicate.table_alias),
                self.quote(&predicate.field)
            )
        };
        format!(
            "{field} {} {}",
            predicate.effective_operator(),
            self.dialect.render_value(&predicate.value)
        )
    }

    fn limit(&self, plan: &QueryPlan) -> String {
        if plan.mode != QueryMode::Select || plan.page_size == 0 {
            return String::new();
        }
        self.dialect.limit_clause(plan.offset(), plan.page_size)
    }
}
