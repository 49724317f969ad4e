//! Product listing pipeline: filter, sort, paginate.
//!
//! Everything here is synchronous and works on a borrowed slice; the
//! catalog snapshot is never mutated.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::errors::ServiceError;
use crate::models::Product;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SortMode {
    /// Catalog order
    #[default]
    Default,
    PriceAsc,
    PriceDesc,
    Rating,
}

/// Raw listing parameters as they arrive on the query string.
///
/// Every field is kept as text so malformed values can be coerced instead
/// of rejecting the whole request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub in_stock: Option<String>,
    pub is_new_arrival: Option<String>,
    pub on_sale: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Page-size bounds applied while building criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_SIZE,
            max_limit: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: bool,
    pub new_arrivals_only: bool,
    pub on_sale_only: bool,
    /// Lowercased search needle
    pub search: Option<String>,
    pub sort: SortMode,
    pub page: u64,
    pub limit: u64,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            category: None,
            sub_category: None,
            min_price: None,
            max_price: None,
            in_stock: false,
            new_arrivals_only: false,
            on_sale_only: false,
            search: None,
            sort: SortMode::Default,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_flag(raw: &Option<String>) -> bool {
    present(raw)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

fn parse_price(raw: &Option<String>) -> Option<Decimal> {
    present(raw).and_then(|v| Decimal::from_str(v).ok())
}

impl FilterCriteria {
    /// Coerces raw query parameters.
    ///
    /// Only an explicit non-positive or oversized `limit` is an error;
    /// every other malformed value falls back to its default.
    pub fn from_query(query: &ProductQuery, limits: PageLimits) -> Result<Self, ServiceError> {
        let page = present(&query.page)
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .map(|p| p as u64)
            .unwrap_or(1);

        let limit = match present(&query.limit).and_then(|v| v.parse::<i64>().ok()) {
            None => limits.default_limit,
            Some(l) if l <= 0 => {
                return Err(ServiceError::validation("limit must be a positive integer"));
            }
            Some(l) if l as u64 > limits.max_limit => {
                return Err(ServiceError::validation(format!(
                    "limit cannot exceed {}",
                    limits.max_limit
                )));
            }
            Some(l) => l as u64,
        };

        let sort = present(&query.sort_by)
            .and_then(|v| SortMode::from_str(v).ok())
            .unwrap_or_default();

        Ok(Self {
            category: present(&query.category).map(str::to_string),
            sub_category: present(&query.sub_category).map(str::to_string),
            min_price: parse_price(&query.min_price),
            max_price: parse_price(&query.max_price),
            in_stock: parse_flag(&query.in_stock),
            new_arrivals_only: parse_flag(&query.is_new_arrival),
            on_sale_only: parse_flag(&query.on_sale),
            search: present(&query.search).map(str::to_lowercase),
            sort,
            page,
            limit,
        })
    }

    /// True when `product` satisfies every present criterion.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category) = &self.category {
            if &product.category != category {
                return false;
            }
        }
        if let Some(sub_category) = &self.sub_category {
            if &product.sub_category != sub_category {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if product.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if product.price > max {
                return false;
            }
        }
        if self.in_stock && !product.in_stock() {
            return false;
        }
        if self.new_arrivals_only && !product.is_new_arrival {
            return false;
        }
        if self.on_sale_only && !product.on_sale {
            return false;
        }
        if let Some(needle) = &self.search {
            let in_name = product.name.to_lowercase().contains(needle.as_str());
            if !in_name && !product.description.to_lowercase().contains(needle.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedResult {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

fn sort_products(items: &mut [&Product], mode: SortMode) {
    // slice::sort_by is stable, so ties keep catalog order
    match mode {
        SortMode::Default => {}
        SortMode::PriceAsc => items.sort_by(|a, b| a.price.cmp(&b.price)),
        SortMode::PriceDesc => items.sort_by(|a, b| b.price.cmp(&a.price)),
        SortMode::Rating => items.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
    }
}

/// Filters, sorts and slices `products` according to `criteria`.
pub fn apply(products: &[Product], criteria: &FilterCriteria) -> PaginatedResult {
    let mut matched: Vec<&Product> = products.iter().filter(|p| criteria.matches(p)).collect();
    sort_products(&mut matched, criteria.sort);

    let limit = criteria.limit.max(1);
    let page = criteria.page.max(1);
    let total = matched.len() as u64;
    let total_pages = total.div_ceil(limit);

    let start = usize::try_from((page - 1).saturating_mul(limit)).unwrap_or(usize::MAX);
    let page_items = matched
        .into_iter()
        .skip(start)
        .take(limit as usize)
        .cloned()
        .collect();

    PaginatedResult {
        products: page_items,
        pagination: Pagination {
            total,
            total_pages,
            current_page: page,
            limit,
        },
    }
}
