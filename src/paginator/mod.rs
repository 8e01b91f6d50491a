//! Cursor-based paginators over the two S3 listing APIs.
//!
//! A paginator is single-use and moves in one direction: once its state is
//! [`PaginatorState::Exhausted`] it never becomes active again, and asking it
//! for another page is an error
//! ([`S3purgeError::NoMorePages`](crate::types::error::S3purgeError::NoMorePages)).
//! Callers guard every `next_page()` with `has_more_pages()`:
//!
//! ```no_run
//! # async fn drain(storage: s3purge_rs::storage::Storage) -> anyhow::Result<()> {
//! use s3purge_rs::paginator::versions::ListObjectVersionsPaginator;
//!
//! let token = s3purge_rs::create_cancellation_token();
//! let mut paginator = ListObjectVersionsPaginator::new(storage, "my-bucket", None, 1000);
//! while paginator.has_more_pages() {
//!     let page = paginator.next_page(&token).await?;
//!     println!("{} versions", page.versions.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod objects;
pub mod versions;

/// Page size requested from the listing APIs when none is configured.
pub const DEFAULT_MAX_KEYS: i32 = 1000;

/// Cursor state of a paginator.
///
/// `Active(None)` is the state before the first request; `Active(Some(c))`
/// carries the markers of the previous response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginatorState<C> {
    Active(Option<C>),
    Exhausted,
}

impl<C> PaginatorState<C> {
    pub fn new() -> Self {
        PaginatorState::Active(None)
    }

    pub fn has_more(&self) -> bool {
        matches!(self, PaginatorState::Active(_))
    }

    /// The cursor to send with the next request, if any.
    pub fn cursor(&self) -> Option<&C> {
        match self {
            PaginatorState::Active(cursor) => cursor.as_ref(),
            PaginatorState::Exhausted => None,
        }
    }

    /// Move to the cursor of the next page, or to `Exhausted` when there is
    /// none. Has no effect once exhausted.
    pub fn advance(&mut self, next: Option<C>) {
        if !self.has_more() {
            return;
        }
        *self = match next {
            Some(cursor) => PaginatorState::Active(Some(cursor)),
            None => PaginatorState::Exhausted,
        };
    }

    pub fn exhaust(&mut self) {
        *self = PaginatorState::Exhausted;
    }
}

impl<C> Default for PaginatorState<C> {
    fn default() -> Self {
        Self::new()
    }
}
