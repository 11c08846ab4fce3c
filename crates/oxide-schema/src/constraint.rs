//! Constraint descriptors: primary keys and indexes.

use crate::change::Change;

/// Name MySQL gives every primary key.
pub const PRIMARY_KEY_NAME: &str = "PRIMARY";

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// The table's primary key.
    Primary,
    /// A secondary index, unique or not.
    Index,
}

/// The declared shape of a constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDef {
    /// Constraint name; always `PRIMARY` for primary keys.
    pub name: String,
    /// Kind of constraint.
    pub kind: ConstraintKind,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Indexed columns, in order.
    pub field_names: Vec<String>,
}

impl ConstraintDef {
    /// Creates a constraint definition, normalizing the primary key name.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: ConstraintKind,
        unique: bool,
        field_names: Vec<String>,
    ) -> Self {
        let name = match kind {
            ConstraintKind::Primary => PRIMARY_KEY_NAME.to_owned(),
            ConstraintKind::Index => name.into(),
        };
        Self {
            name,
            kind,
            unique: unique || kind == ConstraintKind::Primary,
            field_names,
        }
    }
}

/// A constraint of a table together with its diff state.
#[derive(Debug, Clone)]
pub struct ConstraintDescriptor {
    def: ConstraintDef,
    committed: Option<ConstraintDef>,
    deleted: bool,
    altered: bool,
}

impl ConstraintDescriptor {
    pub(crate) const fn declared(def: ConstraintDef) -> Self {
        Self {
            def,
            committed: None,
            deleted: false,
            altered: false,
        }
    }

    pub(crate) fn loaded(def: ConstraintDef) -> Self {
        Self {
            committed: Some(def.clone()),
            def,
            deleted: false,
            altered: false,
        }
    }

    /// The declared shape.
    #[must_use]
    pub const fn def(&self) -> &ConstraintDef {
        &self.def
    }

    /// Constraint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Kind of constraint.
    #[must_use]
    pub const fn kind(&self) -> ConstraintKind {
        self.def.kind
    }

    /// Whether the index enforces uniqueness.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.def.unique
    }

    /// Indexed columns.
    #[must_use]
    pub fn field_names(&self) -> &[String] {
        &self.def.field_names
    }

    /// The shape the database had when this constraint was loaded.
    #[must_use]
    pub const fn committed(&self) -> Option<&ConstraintDef> {
        self.committed.as_ref()
    }

    /// True until the constraint has been saved and reloaded.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.committed.is_none()
    }

    /// True once `delete()` has been called and not undone.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// True once any mutator has touched the constraint.
    #[must_use]
    pub const fn is_altered(&self) -> bool {
        self.altered
    }

    /// Marks the constraint for deletion.
    pub fn delete(&mut self) -> &mut Self {
        self.deleted = true;
        self.altered = true;
        self
    }

    /// Clears a pending deletion.
    pub fn undelete(&mut self) -> &mut Self {
        self.deleted = false;
        self.altered = true;
        self
    }

    /// Changes uniqueness. Existing constraints cannot be altered in
    /// place, so saving this on a loaded index fails; delete it and
    /// create a new one instead.
    pub fn set_unique(&mut self, unique: bool) -> &mut Self {
        self.def.unique = unique;
        self.altered = true;
        self
    }

    /// Replaces the indexed columns. See [`Self::set_unique`].
    pub fn set_field_names<I, S>(&mut self, field_names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.def.field_names = field_names.into_iter().map(Into::into).collect();
        self.altered = true;
        self
    }

    /// What saving would do to this constraint.
    #[must_use]
    pub fn change(&self) -> Change<ConstraintDef> {
        Change::between(&self.def, self.committed.as_ref(), self.deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_is_always_named_primary() {
        let def = ConstraintDef::new(
            "pk_widgets",
            ConstraintKind::Primary,
            false,
            vec!["id".into()],
        );
        assert_eq!(def.name, PRIMARY_KEY_NAME);
        assert!(def.unique);
    }

    #[test]
    fn test_altering_loaded_constraint_is_modified() {
        let mut constraint = ConstraintDescriptor::loaded(ConstraintDef::new(
            "label",
            ConstraintKind::Index,
            false,
            vec!["label".into()],
        ));
        assert!(constraint.change().is_unchanged());
        constraint.set_unique(true);
        assert!(matches!(constraint.change(), Change::Modified(old) if !old.unique));
    }

    #[test]
    fn test_delete_then_undelete() {
        let mut constraint = ConstraintDescriptor::loaded(ConstraintDef::new(
            "label",
            ConstraintKind::Index,
            false,
            vec!["label".into()],
        ));
        constraint.delete();
        assert!(matches!(constraint.change(), Change::Removed(_)));
        constraint.undelete();
        assert!(constraint.change().is_unchanged());
        assert!(constraint.is_altered());
    }
}
