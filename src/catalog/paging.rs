//! Query-string parameters of the list endpoints and the pagination envelope.

use crate::catalog_store::{ListFilter, ListQuery, Sort, SortField, SortOrder, Window};
use crate::error::{ServiceError, ServiceResult};
use crate::reference::parse_id;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;
pub const MAX_LATEST: usize = 50;
pub const DEFAULT_BY_ARTIST_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub artist_id: Option<String>,
    pub album_id: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

fn optional_filter_id(field: &'static str, raw: &Option<String>) -> ServiceResult<Option<String>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_id(field, raw).map(Some),
    }
}

impl ListParams {
    pub fn page(&self) -> ServiceResult<usize> {
        match self.page {
            None => Ok(1),
            Some(0) => Err(ServiceError::Validation(
                "page must be at least 1".to_string(),
            )),
            Some(page) => Ok(page),
        }
    }

    pub fn limit(&self) -> ServiceResult<usize> {
        match self.limit {
            None => Ok(DEFAULT_PAGE_SIZE),
            Some(0) => Err(ServiceError::Validation(
                "limit must be at least 1".to_string(),
            )),
            Some(limit) => Ok(limit.min(MAX_PAGE_SIZE)),
        }
    }

    fn sort(&self) -> ServiceResult<Sort> {
        let mut sort = Sort::default();
        if let Some(field) = self.sort.as_deref().filter(|s| !s.is_empty()) {
            sort.field = SortField::parse(field).ok_or_else(|| ServiceError::invalid("sort", field))?;
        }
        match self.order.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("desc") => {}
            Some("asc") => sort.order = SortOrder::Asc,
            Some(other) => return Err(ServiceError::invalid("order", other)),
        }
        Ok(sort)
    }

    /// The store query for this request, with the resolved page and limit.
    pub fn to_query(&self) -> ServiceResult<(usize, usize, ListQuery)> {
        let page = self.page()?;
        let limit = self.limit()?;
        let query = ListQuery {
            filter: ListFilter {
                artist_id: optional_filter_id("artistId", &self.artist_id)?,
                album_id: optional_filter_id("albumId", &self.album_id)?,
                search: self.search.clone(),
            },
            sort: self.sort()?,
            window: Window {
                offset: (page - 1).saturating_mul(limit),
                limit,
            },
        };
        Ok((page, limit, query))
    }
}

/// Clamps a `latest` request limit.
pub fn latest_limit(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_LATEST)
}

pub fn by_artist_limit(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_BY_ARTIST_LIMIT)
        .clamp(1, MAX_PAGE_SIZE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current: usize,
    pub total_pages: usize,
    pub count: usize,
    pub total_items: usize,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, count: usize, total_items: usize) -> Self {
        Pagination {
            current: page,
            total_pages: total_items.div_ceil(limit),
            count,
            total_items,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Entities of one artist, together with the artist's public projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistListing<T> {
    pub artist: crate::catalog_store::ArtistSummary,
    pub items: Vec<T>,
}
