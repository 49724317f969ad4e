//! Product catalog: listing pipeline, featured selection and admin writes.

pub mod featured;
pub mod filter;
mod product_catalog_service;

pub use featured::select_featured;
pub use filter::{
    FilterCriteria, PageLimits, PaginatedResult, Pagination, ProductQuery, SortMode,
};
pub use product_catalog_service::{NewCategory, NewProduct, ProductCatalogService};
