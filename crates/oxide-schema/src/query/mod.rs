//! Query building and compilation.

mod builder;
mod compile;
mod condition;
mod plan;

pub use builder::QueryBuilder;
pub use condition::{Condition, Conjunction, Group, Predicate, OPERATORS};
pub use plan::{JoinCondition, QueryMode, QueryPlan, SelectItem, TableRef};
