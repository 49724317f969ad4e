#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use storefront_api::{
    config::AppConfig,
    repositories::{FixtureCatalogRepository, InMemoryUserRepository},
    AppState,
};
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@storefront.test";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

/// Router over the bundled fixture catalog with an in-memory user store
/// and a bootstrapped admin account.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub users: Arc<InMemoryUserRepository>,
    admin_token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let catalog = FixtureCatalogRepository::load(fixtures_dir())
            .await
            .expect("load fixture catalog");
        let users = Arc::new(InMemoryUserRepository::new());
        let state = AppState::new(config, Arc::new(catalog), users.clone())
            .expect("build application state");

        let admin = state
            .auth
            .ensure_admin("Admin", ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("bootstrap admin");
        let admin_token = state.auth.issue_token(&admin).expect("sign admin token");

        Self {
            router: storefront_api::build_router(state.clone()),
            state,
            users,
            admin_token,
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, None, None).await
    }

    /// GET as if it arrived on a connection from `peer`, optionally carrying
    /// an `X-Forwarded-For` header.
    pub async fn get_from(&self, peer: &str, uri: &str, forwarded_for: Option<&str>) -> Response {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(value) = forwarded_for {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut request = builder.body(Body::empty()).expect("failed to build request");
        let peer: SocketAddr = peer.parse().expect("peer address");
        request.extensions_mut().insert(ConnectInfo(peer));

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn post_as_admin(&self, uri: &str, body: Value) -> Response {
        self.request(Method::POST, uri, Some(body), Some(self.admin_token()))
            .await
    }

    /// Registers a regular user and returns the response `data`.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Value {
        let response = self
            .request(
                Method::POST,
                "/api/auth/register",
                Some(json!({"name": name, "email": email, "password": password})),
                None,
            )
            .await;
        assert_eq!(response.status(), 201, "registration failed");
        body_json(response).await["data"].clone()
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
