//! Limit/offset paging for the admin list endpoints.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?limit=&offset=` query parameters.
#[derive(Debug, Deserialize, Default)]
pub struct PaginationQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl PaginationQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    /// Rows matching the filter across all pages
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl<T> Paginated<T> {
    /// Wrap a `(items, total)` page as returned by the `*_paginated` queries.
    pub fn from_page((items, total): (Vec<T>, i64), query: &PaginationQuery) -> Self {
        let limit = query.limit();
        let offset = query.offset();
        let has_more = offset + (items.len() as i64) < total;
        Self {
            items,
            total,
            limit,
            offset,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        let query = |limit| PaginationQuery {
            limit: Some(limit),
            offset: Some(-4),
        };
        assert_eq!(query(0).limit(), 1);
        assert_eq!(query(500).limit(), MAX_PAGE_SIZE);
        assert_eq!(query(10).offset(), 0);
        assert_eq!(PaginationQuery::default().limit(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn has_more_tracks_remaining_rows() {
        let query = PaginationQuery {
            limit: Some(2),
            offset: Some(2),
        };
        let page = Paginated::from_page((vec![1, 2], 5), &query);
        assert!(page.has_more);
        let last = Paginated::from_page((vec![5], 5), &PaginationQuery {
            limit: Some(2),
            offset: Some(4),
        });
        assert!(!last.has_more);
    }
}
