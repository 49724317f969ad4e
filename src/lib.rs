//! Storefront API Library
//!
//! Product catalog, featured selection and account authentication served
//! over a JSON HTTP API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod rate_limiter;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{extract::DefaultBodyLimit, http::Uri, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthConfig, AuthService};
use crate::cache::TtlCache;
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::repositories::{CatalogRepository, UserRepository};
use crate::services::catalog::{PageLimits, ProductCatalogService};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub catalog: Arc<ProductCatalogService>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires services on top of the given repositories using the settings in `config`.
    pub fn new(
        config: config::AppConfig,
        catalog_repository: Arc<dyn CatalogRepository>,
        user_repository: Arc<dyn UserRepository>,
    ) -> Result<Self, errors::ServiceError> {
        let auth_config = AuthConfig::from_app_config(&config)?;
        let ttl = Duration::from_secs(config.cache_ttl_secs);
        let limits = PageLimits {
            default_limit: config.api_default_page_size,
            max_limit: config.api_max_page_size,
        };

        let catalog = ProductCatalogService::new(
            catalog_repository,
            TtlCache::new(ttl),
            TtlCache::new(ttl),
            limits,
        );

        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            auth: Arc::new(AuthService::new(auth_config, user_repository)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Envelope wrapping every successful JSON payload.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            data: Some(data),
            message: None,
        }
    }
}

/// All resource routes, mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", handlers::products::products_routes())
        .nest("/categories", handlers::categories::categories_routes())
        .nest("/auth", handlers::auth::auth_routes())
}

/// `/api` routes with the JSON body cap and, unless disabled, per-client
/// rate limiting. Each call starts with fresh counters.
fn limited_api_routes(config: &config::AppConfig) -> Router<AppState> {
    let routes = api_routes().layer(DefaultBodyLimit::max(config.max_body_bytes));

    match RateLimitConfig::from_app_config(config) {
        Some(limits) => routes.layer(axum::middleware::from_fn_with_state(
            Arc::new(RateLimiter::new(limits)),
            rate_limiter::rate_limit_middleware,
        )),
        None => routes,
    }
}

/// Builds the complete application router with request-scoped middleware.
///
/// Transport concerns that depend on deployment (CORS, compression,
/// timeouts) are layered on by the binary.
pub fn build_router(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api", limited_api_routes(&state.config))
        .fallback(route_not_found)
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            auth::inject_auth_service,
        ))
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn route_not_found(uri: Uri) -> errors::ServiceError {
    errors::ServiceError::NotFound(format!("Route not found: {}", uri.path()))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_envelope_has_status_and_data() {
        let value = serde_json::to_value(ApiResponse::success(vec![1, 2])).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"], serde_json::json!([1, 2]));
        assert!(value.get("message").is_none());
    }
}
