use crate::error::{CoreError, Result};
use std::ops::Range;

/// Page and page-selector indices over a collection of `len` items.
///
/// The collection itself is not stored here, every derivation takes its current
/// length so a refreshed snapshot can never leave stale bounds behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    page_scale: usize,
    current_page: usize,
    window_scale: usize,
    window_index: usize,
}

impl Pagination {
    /// Both scales are raised to at least 1.
    #[must_use]
    pub fn new(page_scale: usize, window_scale: usize) -> Self {
        Self {
            page_scale: page_scale.max(1),
            current_page: 0,
            window_scale: window_scale.max(1),
            window_index: 0,
        }
    }

    #[must_use]
    pub const fn page_scale(&self) -> usize {
        self.page_scale
    }

    #[must_use]
    pub const fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub const fn window_index(&self) -> usize {
        self.window_index
    }

    #[must_use]
    pub const fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.page_scale)
    }

    /// Range of the current page within the collection
    #[must_use]
    pub fn page_range(&self, len: usize) -> Range<usize> {
        let start = (self.current_page * self.page_scale).min(len);
        let end = ((self.current_page + 1) * self.page_scale).min(len);
        start..end
    }

    /// Number of page-selector windows
    #[must_use]
    pub const fn window_total(&self, len: usize) -> usize {
        self.total_pages(len).div_ceil(self.window_scale)
    }

    /// Page numbers shown by the page selector
    #[must_use]
    pub fn window_pages(&self, len: usize) -> Range<usize> {
        let total = self.total_pages(len);
        let start = (self.window_index * self.window_scale).min(total);
        let end = ((self.window_index + 1) * self.window_scale).min(total);
        start..end
    }

    /// Switch to `page`.
    ///
    /// # Errors
    ///
    /// Returns `PageOutOfRange` unless `page` is an existing page, or page 0 of an
    /// empty collection.
    pub fn toggle_page(&mut self, page: usize, len: usize) -> Result<()> {
        let total = self.total_pages(len);
        if page >= total.max(1) {
            return Err(CoreError::PageOutOfRange { page, total });
        }
        self.current_page = page;
        Ok(())
    }

    /// Jump to the page that contains the absolute index `index`; returns the index
    /// within that page.
    pub fn reveal(&mut self, index: usize) -> usize {
        self.current_page = index / self.page_scale;
        index % self.page_scale
    }

    /// Shift the page-selector window forward; stays on the last window.
    pub fn next_window(&mut self, len: usize) -> bool {
        if self.window_index + 1 >= self.window_total(len) {
            return false;
        }
        self.window_index += 1;
        true
    }

    /// Shift the page-selector window back; stays on the first window.
    pub fn prev_window(&mut self) -> bool {
        if self.window_index == 0 {
            return false;
        }
        self.window_index -= 1;
        true
    }

    /// Pull both indices back into range after the collection length changed.
    pub fn clamp(&mut self, len: usize) {
        let last_page = self.total_pages(len).saturating_sub(1);
        self.current_page = self.current_page.min(last_page);
        let last_window = self.window_total(len).saturating_sub(1);
        self.window_index = self.window_index.min(last_window);
    }
}
