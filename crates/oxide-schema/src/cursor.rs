//! Lazy, replayable result cursors.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::connection::{Connection, RowStream};
use crate::error::Result;
use crate::row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorKind {
    Rows,
    Statement,
}

/// Rows of an executed query, pulled from the connection on demand.
///
/// The cursor remembers its SQL so it can be replayed with
/// [`ResultCursor::reset`]. It also implements [`Stream`], yielding the
/// same rows [`ResultCursor::get`] would.
pub struct ResultCursor {
    connection: Arc<dyn Connection>,
    sql: String,
    kind: CursorKind,
    stream: Option<RowStream>,
    buffered: VecDeque<Row>,
    current: Option<Row>,
    key: Option<usize>,
    consumed: usize,
    rows_affected: u64,
}

impl fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCursor")
            .field("sql", &self.sql)
            .field("kind", &self.kind)
            .field("open", &self.stream.is_some())
            .field("buffered", &self.buffered.len())
            .field("key", &self.key)
            .field("rows_affected", &self.rows_affected)
            .finish_non_exhaustive()
    }
}

impl ResultCursor {
    /// Starts a query; no row is read until asked for.
    pub(crate) fn open(connection: Arc<dyn Connection>, sql: String) -> Self {
        debug!(sql = %sql, "Opening cursor");
        let stream = connection.fetch(&sql);
        Self {
            connection,
            sql,
            kind: CursorKind::Rows,
            stream: Some(stream),
            buffered: VecDeque::new(),
            current: None,
            key: None,
            consumed: 0,
            rows_affected: 0,
        }
    }

    /// Runs a statement that returns no rows.
    pub(crate) async fn execute(connection: Arc<dyn Connection>, sql: String) -> Result<Self> {
        debug!(sql = %sql, "Executing SQL");
        let rows_affected = connection.execute(&sql).await?;
        Ok(Self {
            connection,
            sql,
            kind: CursorKind::Statement,
            stream: None,
            buffered: VecDeque::new(),
            current: None,
            key: None,
            consumed: 0,
            rows_affected,
        })
    }

    /// The SQL this cursor runs.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Rows changed by an UPDATE or INSERT.
    #[must_use]
    pub const fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Id generated by the last INSERT on the connection.
    #[must_use]
    pub fn last_insert_id(&self) -> u64 {
        self.connection.last_insert_id()
    }

    fn advance(&mut self, row: &Row) {
        self.current = Some(row.clone());
        self.key = Some(self.key.map_or(0, |k| k + 1));
        self.consumed += 1;
    }

    /// Reads the next row, or `None` at the end.
    ///
    /// # Errors
    ///
    /// Returns driver errors raised while reading.
    pub async fn get(&mut self) -> Result<Option<&Row>> {
        match self.next().await.transpose()? {
            Some(_) => Ok(self.current.as_ref()),
            None => Ok(None),
        }
    }

    /// Reads every remaining row.
    ///
    /// # Errors
    ///
    /// Returns driver errors raised while reading.
    pub async fn get_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await.transpose()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Total number of rows: consumed so far plus remaining.
    ///
    /// The remaining rows are read and kept so `get()` still returns them.
    /// For an UPDATE or INSERT this is the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns driver errors raised while reading.
    pub async fn count(&mut self) -> Result<u64> {
        if self.kind == CursorKind::Statement {
            return Ok(self.rows_affected);
        }
        if let Some(mut stream) = self.stream.take() {
            while let Some(row) = stream.try_next().await? {
                self.buffered.push_back(row);
            }
        }
        Ok((self.consumed + self.buffered.len()) as u64)
    }

    /// Releases the underlying stream. Rows not read yet are lost until
    /// [`Self::reset`].
    pub fn close(&mut self) {
        self.stream = None;
        self.buffered.clear();
    }

    /// Replays the query from the start.
    ///
    /// A query whose stream is still open with nothing read or buffered is
    /// left alone. An UPDATE or INSERT is always executed again.
    ///
    /// # Errors
    ///
    /// Returns driver errors from re-executing a statement.
    pub async fn reset(&mut self) -> Result<()> {
        let pristine = self.kind == CursorKind::Rows
            && self.stream.is_some()
            && self.consumed == 0
            && self.buffered.is_empty();
        if pristine {
            return Ok(());
        }
        self.close();
        self.current = None;
        self.key = None;
        self.consumed = 0;
        debug!(sql = %self.sql, "Replaying query");
        match self.kind {
            CursorKind::Rows => self.stream = Some(self.connection.fetch(&self.sql)),
            CursorKind::Statement => self.rows_affected = self.connection.execute(&self.sql).await?,
        }
        Ok(())
    }

    /// Replays the query and reads its first row.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reset`] and [`Self::get`].
    pub async fn rewind(&mut self) -> Result<Option<&Row>> {
        self.reset().await?;
        self.get().await
    }

    /// The row last returned by `get()`.
    #[must_use]
    pub const fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    /// Zero-based index of the current row, `None` before the first.
    #[must_use]
    pub const fn key(&self) -> Option<usize> {
        self.key
    }

    /// True while positioned on a row.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.current.is_some()
    }
}

impl Stream for ResultCursor {
    type Item = Result<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if let Some(row) = this.buffered.pop_front() {
            this.advance(&row);
            return Poll::Ready(Some(Ok(row)));
        }
        let Some(stream) = this.stream.as_mut() else {
            this.current = None;
            return Poll::Ready(None);
        };
        match stream.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(row))) => {
                this.advance(&row);
                Poll::Ready(Some(Ok(row)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
            Poll::Ready(None) => {
                this.stream = None;
                this.current = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
