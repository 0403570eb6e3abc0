//! Pagination parameters for find cursors.
//!
//! Pages are 1-indexed. A page number of `0` or `1` both address the first page, and a page
//! size of `0` means "no limit".

use serde::{Deserialize, Serialize};

/// Parameters selecting one page of a result set.
///
/// # Example
///
/// ```ignore
/// use docmodel::page::PaginationParams;
///
/// let params = PaginationParams::new(2, 10);
/// assert_eq!(params.skip(), Some(10));
/// assert_eq!(params.limit(), Some(10));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: u64,
    /// Number of items per page; `0` disables the limit.
    pub per_page: u64,
}

impl PaginationParams {
    /// Creates new pagination parameters.
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    /// Number of documents to skip, or `None` for the first page.
    ///
    /// ```ignore
    /// assert_eq!(PaginationParams::new(3, 20).skip(), Some(40));
    /// assert_eq!(PaginationParams::new(1, 20).skip(), None);
    /// ```
    pub fn skip(&self) -> Option<u64> {
        (self.page > 1).then(|| (self.page - 1).saturating_mul(self.per_page))
    }

    /// Maximum number of documents to return, or `None` when the page size is `0`.
    pub fn limit(&self) -> Option<u64> {
        (self.per_page != 0).then_some(self.per_page)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}
