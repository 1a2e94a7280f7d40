use serde::{Deserialize, Serialize};

use crate::constants::MAX_PAGE_SIZE;

/// Limit/offset window requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None, crate::constants::DEFAULT_PAGE_SIZE)
    }
}

impl PageRequest {
    pub fn new(limit: Option<i64>, offset: Option<i64>, page_size: i64) -> Self {
        Self {
            limit: limit.unwrap_or(page_size).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0).max(0),
        }
    }

    pub fn with_limit(self, limit: i64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            ..self
        }
    }

    pub fn with_offset(self, offset: i64) -> Self {
        Self {
            offset: offset.max(0),
            ..self
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PageContext<T> {
    pub count: i64,
    pub next_offset: Option<i64>,
    pub previous_offset: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(results: Vec<T>, total_rows: i64, page: PageRequest) -> Self {
        let end = page.offset.saturating_add(page.limit);
        let next_offset = if end < total_rows { Some(end) } else { None };

        let previous_offset = if page.offset > 0 {
            Some((page.offset - page.limit).max(0))
        } else {
            None
        };

        Self {
            count: total_rows,
            next_offset,
            previous_offset,
            results,
        }
    }
}
