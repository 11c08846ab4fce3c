//! Pending changes between a declared shape and its committed snapshot.

/// What saving a descriptor would do to the database.
///
/// Computed on demand from the declared definition and the snapshot taken
/// when the descriptor was loaded, so it can never drift from either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    /// Nothing to emit.
    Unchanged,
    /// The item does not exist yet and must be created.
    Added,
    /// The item exists with the contained committed shape and must be altered.
    Modified(T),
    /// The item exists with the contained committed shape and must be dropped.
    Removed(T),
}

impl<T> Change<T> {
    /// Returns true when saving would emit nothing for this item.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// Computes the change for an item with the given declared shape,
    /// committed snapshot and deletion flag.
    pub(crate) fn between(declared: &T, committed: Option<&T>, deleted: bool) -> Self
    where
        T: Clone + PartialEq,
    {
        match (committed, deleted) {
            (None, true) => Self::Unchanged,
            (None, false) => Self::Added,
            (Some(old), true) => Self::Removed(old.clone()),
            (Some(old), false) if old != declared => Self::Modified(old.clone()),
            (Some(_), false) => Self::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_deleted_is_unchanged() {
        assert_eq!(Change::between(&1, None, true), Change::Unchanged);
        assert_eq!(Change::between(&1, None, false), Change::<i32>::Added);
    }

    #[test]
    fn test_existing_item() {
        assert_eq!(Change::between(&1, Some(&1), false), Change::Unchanged);
        assert_eq!(Change::between(&2, Some(&1), false), Change::Modified(1));
        assert_eq!(Change::between(&2, Some(&1), true), Change::Removed(1));
    }
}
