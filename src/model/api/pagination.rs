use mongodb::{bson::Document, options::FindOptions};
use serde::{Deserialize, Serialize};

/// Query parameters selecting one page of a listing. Pages are numbered
/// from 1 and hold at most 100 items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromForm, UriDisplayQuery)]
pub struct PaginationRequest {
    #[field(default = 1, validate = range(1..))]
    pub page_num: u32,
    #[field(default = 20, validate = range(1..=100))]
    pub page_size: u32,
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: 20,
        }
    }
}

impl PaginationRequest {
    /// Number of items before this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page_num.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Find options for this page, in the given order.
    pub fn find_options(&self, sort: Document) -> FindOptions {
        FindOptions::builder()
            .skip(self.skip())
            .limit(i64::from(self.page_size))
            .sort(sort)
            .build()
    }

    pub fn to_paginated<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
            },
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub page_num: u32,
    pub page_size: u32,
    pub total: u64,
}

/// One page of a listing, plus where it sits in the whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub pagination: PaginationResult,
    pub items: Vec<T>,
}
