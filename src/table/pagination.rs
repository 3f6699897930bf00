use serde::{Deserialize, Serialize, Serializer};

use super::filter::Filters;

/// Page, size, totals and query state of one list view.
///
/// The owner (a resource or a handler) mutates it; the table only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableState {
    pub current_page: u32,
    pub rows_per_page: u32,
    pub total_pages: u32,
    pub total_count: Option<u64>,
    pub loading: bool,
    pub search: String,
    pub filters: Filters,
}

impl TableState {
    pub fn new(rows_per_page: u32) -> Self {
        Self {
            current_page: 1,
            rows_per_page: rows_per_page.max(1),
            total_pages: 0,
            total_count: None,
            loading: false,
            search: String::new(),
            filters: Filters::default(),
        }
    }

    /// Start at a page requested before totals are known; `clamp` fixes it
    /// once the server answers.
    pub fn at_page(mut self, page: u32) -> Self {
        self.current_page = page.max(1);
        self
    }

    /// Move to `page` if it exists. Returns whether the page changed.
    pub fn set_page(&mut self, page: u32) -> bool {
        let upper = self.total_pages.max(1);
        if page < 1 || page > upper || page == self.current_page {
            return false;
        }
        self.current_page = page;
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.current_page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> bool {
        self.set_page(self.current_page.saturating_sub(1))
    }

    /// Changing the page size always goes back to the first page.
    pub fn set_rows_per_page(&mut self, rows_per_page: u32) {
        self.rows_per_page = rows_per_page.max(1);
        self.current_page = 1;
    }

    /// A new search term restarts at page 1. Returns whether it changed.
    pub fn set_search(&mut self, search: impl Into<String>) -> bool {
        let search = search.into();
        if search == self.search {
            return false;
        }
        self.search = search;
        self.current_page = 1;
        true
    }

    pub fn set_filters(&mut self, filters: Filters) {
        self.filters = filters;
        self.current_page = 1;
    }

    pub fn clear_filters(&mut self) {
        self.set_filters(Filters::default());
    }

    /// Record what the server reported for the page just fetched.
    /// Returns true when the current page had to be pulled back.
    pub fn apply_server_page(&mut self, total_pages: u32, current_page: Option<u32>, total_count: Option<u64>) -> bool {
        self.total_pages = total_pages;
        self.total_count = total_count;
        if let Some(page) = current_page.filter(|p| *p >= 1) {
            self.current_page = page;
        }
        self.clamp()
    }

    /// Keep `current_page <= total_pages` whenever `total_pages > 0`.
    pub fn clamp(&mut self) -> bool {
        if self.current_page == 0 {
            self.current_page = 1;
            return true;
        }
        if self.total_pages > 0 && self.current_page > self.total_pages {
            self.current_page = self.total_pages;
            return true;
        }
        false
    }

    /// 1-based running number of the `index`-th row on this page.
    pub fn serial(&self, index: usize) -> u64 {
        (self.current_page.saturating_sub(1) as u64) * self.rows_per_page as u64 + index as u64 + 1
    }

    /// Page buttons: a window of `visible` pages around the current one,
    /// plus the first and last pages with gaps where pages are skipped.
    pub fn page_numbers(&self, visible: u32) -> Vec<PageItem> {
        let total = self.total_pages;
        if total == 0 {
            return Vec::new();
        }
        let visible = visible.max(1);

        let start = self.current_page.saturating_sub(visible / 2).max(1);
        let end = (start + visible - 1).min(total);

        let mut pages = Vec::new();
        if start > 1 {
            pages.push(PageItem::Page(1));
            if start > 2 {
                pages.push(PageItem::Gap);
            }
        }
        pages.extend((start..=end).map(PageItem::Page));
        if end < total {
            if end < total - 1 {
                pages.push(PageItem::Gap);
            }
            pages.push(PageItem::Page(total));
        }
        pages
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Gap,
}

impl Serialize for PageItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageItem::Page(page) => serializer.serialize_u32(*page),
            PageItem::Gap => serializer.serialize_str("..."),
        }
    }
}
