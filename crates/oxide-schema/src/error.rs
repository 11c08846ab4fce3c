//! Error types for schema and query operations.

/// Boxed error coming from a database driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while describing, saving or querying tables.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A table, field or constraint looked up by name does not exist.
    #[error("{kind} '{name}' does not exist")]
    NotFound {
        /// What was looked up (`table`, `field`, `constraint`).
        kind: &'static str,
        /// The name that was looked up.
        name: String,
    },

    /// A table or constraint with this name already exists.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// What was being created.
        kind: &'static str,
        /// The conflicting name.
        name: String,
    },

    /// An operation would leave a descriptor in a state the database
    /// cannot represent.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A field declares a width or length with no column type.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The query builder was used in a way that cannot be compiled.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The database rejected a statement or the connection failed.
    #[error("Database error: {source}")]
    Driver {
        /// The statement being run, when there was one.
        sql: Option<String>,
        /// The underlying driver error.
        #[source]
        source: BoxError,
    },

    /// A multi-statement save failed part-way through.
    ///
    /// MySQL commits DDL implicitly, so the statements in `applied` are
    /// already in effect.
    #[error("Saving table '{table}' aborted at `{failed}` after {} applied statement(s)", .applied.len())]
    SaveAborted {
        /// The table being saved.
        table: String,
        /// Statements that ran successfully before the failure.
        applied: Vec<String>,
        /// The statement that failed.
        failed: String,
        /// Why it failed.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Creates a `NotFound` error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates an `AlreadyExists` error.
    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Wraps a driver error raised while running `sql`.
    pub fn driver(sql: Option<&str>, source: impl Into<BoxError>) -> Self {
        Self::Driver {
            sql: sql.map(str::to_owned),
            source: source.into(),
        }
    }

    /// Returns true for `NotFound` errors.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for schema and query operations.
pub type Result<T> = std::result::Result<T, Error>;
