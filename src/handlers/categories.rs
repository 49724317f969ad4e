use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    auth::AuthRouterExt,
    errors::ServiceError,
    handlers::{
        common::{created_response, success_response, Sanitize, ValidatedJson},
        AppState,
    },
    models::Role,
    services::catalog::NewCategory,
};

pub fn categories_routes() -> Router<AppState> {
    let admin = Router::new()
        .route("/", post(create_category))
        .with_roles(&[Role::Admin]);

    Router::new().route("/", get(list_categories)).merge(admin)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Image is required"))]
    pub image: String,
    #[serde(default)]
    pub sub_categories: Vec<String>,
}

impl Sanitize for CreateCategoryRequest {
    fn sanitize(&mut self) {
        self.name = self.name.trim().to_string();
        self.description = self.description.trim().to_string();
        self.image = self.image.trim().to_string();
        self.sub_categories = self
            .sub_categories
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let categories = state.catalog.list_categories().await?;
    Ok(success_response(categories.as_slice()))
}

/// Create a category (admin)
async fn create_category(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let category = state
        .catalog
        .create_category(NewCategory {
            name: payload.name,
            description: payload.description,
            image: payload.image,
            sub_categories: payload.sub_categories,
        })
        .await?;
    Ok(created_response(category))
}
