//! Pagination value objects
//!
//! Page numbers are 1-based at the API boundary because that is what callers
//! (and their UIs) think in; the 0-based offset only exists in the compiled
//! [`PageWindow`]. The page number is clamped to a minimum of 1 everywhere;
//! there is no erroring offset path.

use serde::{Deserialize, Serialize};

/// Inbound page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number; values below 1 are treated as 1
    #[serde(rename = "pageNumber")]
    pub page_number: u32,
    /// Number of records per page
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    /// Whether a count query should be issued alongside the page query
    #[serde(rename = "needCount", default = "default_need_count")]
    pub need_count: bool,
}

fn default_need_count() -> bool {
    true
}

impl PageRequest {
    pub fn of(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number,
            page_size,
            need_count: true,
        }
    }

    /// First page of ten records, counting enabled
    pub fn default_page() -> Self {
        Self::of(1, 10)
    }

    /// Skip the count query
    pub fn without_count(mut self) -> Self {
        self.need_count = false;
        self
    }

    /// The clamped page number, never below 1
    pub fn page_number(&self) -> u32 {
        self.page_number.max(1)
    }

    /// 0-based offset derived from the clamped page number
    pub fn offset(&self) -> i64 {
        i64::from(self.page_number() - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// Compile into the outbound window
    pub fn window(&self) -> PageWindow {
        PageWindow {
            offset: self.offset(),
            limit: self.limit(),
            need_count: self.need_count,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::default_page()
    }
}

/// Compiled page window handed to the persistence engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub offset: i64,
    pub limit: i64,
    #[serde(rename = "needCount")]
    pub need_count: bool,
}

impl PageWindow {
    /// 1-based page number this window corresponds to
    pub fn current_page(&self) -> i64 {
        if self.limit <= 0 {
            return 1;
        }
        self.offset / self.limit + 1
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination<T> {
    #[serde(rename = "currentPage")]
    pub current_page: i64,
    #[serde(rename = "pageSize")]
    pub page_size: i64,
    /// Total matching records, or -1 when no count query was issued
    pub total: i64,
    pub records: Vec<T>,
}

impl<T> Pagination<T> {
    /// Assemble a page from a compiled window and the engine's row/count output
    ///
    /// `total` is `None` when the window disabled counting.
    pub fn from_window(window: PageWindow, total: Option<i64>, records: Vec<T>) -> Self {
        Self {
            current_page: window.current_page(),
            page_size: window.limit,
            total: total.unwrap_or(-1),
            records,
        }
    }

    /// Total number of pages, or -1 when the total is unknown
    pub fn total_pages(&self) -> i64 {
        if self.total < 0 {
            return -1;
        }
        if self.page_size <= 0 {
            return 0;
        }
        self.total / self.page_size + i64::from(self.total % self.page_size > 0)
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.total >= 0 && self.current_page < self.total_pages()
    }

    /// Map the records, keeping the page shape
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Pagination<U> {
        Pagination {
            current_page: self.current_page,
            page_size: self.page_size,
            total: self.total,
            records: self.records.into_iter().map(f).collect(),
        }
    }

    /// Paginate an in-memory list
    pub fn paging(page_number: u32, page_size: u32, data: Vec<T>) -> Self {
        let request = PageRequest::of(page_number, page_size);
        let total = data.len() as i64;
        let start = (request.offset() as usize).min(data.len());
        let end = (start + page_size as usize).min(data.len());
        let records = data.into_iter().skip(start).take(end - start).collect();
        Self {
            current_page: i64::from(request.page_number()),
            page_size: i64::from(page_size),
            total,
            records,
        }
    }
}
