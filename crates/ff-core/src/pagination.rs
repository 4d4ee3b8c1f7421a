//! # Pagination
//!
//! Two listing strategies over descending collections:
//! - offset pages (`page(n)`), which shift when rows are removed concurrently;
//! - id cursors (`before(max_id)`), which are unaffected by newer inserts.

use serde::Serialize;

/// One numbered page of an offset-paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Clamps caller-supplied page numbers; pages are 1-based.
pub fn normalize_page(page: u32) -> u32 {
    page.max(1)
}

/// Row offset of a (normalized) page.
pub fn page_offset(page: u32, per_page: u32) -> i64 {
    i64::from(normalize_page(page) - 1) * i64::from(per_page)
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let page = normalize_page(page);
        let seen = u64::from(page) * u64::from(per_page);
        Self {
            items,
            page,
            per_page,
            total,
            has_prev: page > 1,
            has_next: seen < total,
        }
    }

    /// Replaces the items while keeping the page metadata.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            has_prev: self.has_prev,
            has_next: self.has_next,
        }
    }
}

/// One batch of an id-cursor listing.
///
/// `next_cursor` is the smallest id of the batch; feed it back as `max_id`.
/// An empty batch means the stream is exhausted and carries no cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<i64>,
}

impl<T> CursorPage<T> {
    pub fn from_batch(items: Vec<T>, id_of: impl Fn(&T) -> i64) -> Self {
        let next_cursor = items.iter().map(&id_of).min();
        Self { items, next_cursor }
    }

    pub fn with_items<U>(self, items: Vec<U>) -> CursorPage<U> {
        CursorPage { items, next_cursor: self.next_cursor }
    }
}
