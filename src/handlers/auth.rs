use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::{
    auth::{AuthRouterExt, AuthUser, LoginRequest, RegisterRequest},
    errors::ServiceError,
    handlers::{
        common::{created_response, success_response, ValidatedJson},
        AppState,
    },
};

pub fn auth_routes() -> Router<AppState> {
    let protected = Router::new().route("/me", get(me)).with_auth();

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .merge(protected)
}

/// Register handler
async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.auth.register(payload).await?;
    Ok(created_response(response))
}

/// Login handler
async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.auth.login(payload).await?;
    Ok(success_response(response))
}

/// Profile of the bearer
async fn me(user: AuthUser) -> impl IntoResponse {
    success_response(user.user)
}
