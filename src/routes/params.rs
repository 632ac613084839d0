use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::repository::PageRequest;

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct Pagination {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn normalize(&self) -> (u64, u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }

    pub fn request(&self) -> PageRequest {
        let (_, limit, offset) = self.normalize();
        PageRequest::new(limit, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct ProductQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// Matches product name or sku.
    pub q: Option<String>,
    /// Exact category name.
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct OrderListQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    pub status: Option<String>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct CartListQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// `active`, `abandoned` or `converted`.
    pub status: Option<String>,
}
