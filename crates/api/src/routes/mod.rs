//! Route handlers, grouped by resource.

pub mod books;
pub mod genres;
pub mod health;
pub mod metrics;
pub mod orders;

use serde::Deserialize;
use store::{Page, SortDir};

use crate::error::ApiError;

/// Common listing query parameters (`?page=&limit=&search=&sort=&dir=`).
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
}

impl ListParams {
    pub fn page(&self) -> Page {
        Page::new(self.page.unwrap_or(1), self.limit.unwrap_or(10))
    }

    pub fn sort_dir(&self) -> Result<SortDir, ApiError> {
        match self.dir.as_deref() {
            None => Ok(SortDir::default()),
            Some("asc") => Ok(SortDir::Asc),
            Some("desc") => Ok(SortDir::Desc),
            Some(other) => Err(ApiError::BadRequest(format!(
                "invalid sort direction: {other}"
            ))),
        }
    }
}
