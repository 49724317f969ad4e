use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::{
    auth::AuthRouterExt,
    errors::ServiceError,
    handlers::{
        common::{created_response, success_response, Sanitize, ValidatedJson},
        AppState,
    },
    models::{
        product::{validate_dimensions, validate_price},
        Dimensions, Role,
    },
    services::catalog::{NewProduct, ProductQuery},
};

/// Creates the router for product endpoints
pub fn products_routes() -> Router<AppState> {
    let admin = Router::new()
        .route("/", post(create_product))
        .with_roles(&[Role::Admin]);

    Router::new()
        .route("/", get(list_products))
        .route("/featured", get(featured_products))
        .route("/:id", get(get_product))
        .merge(admin)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[serde(default)]
    pub image: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
    pub stock: u32,
    #[serde(default)]
    pub features: Vec<String>,
    #[validate(custom = "validate_dimensions")]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 5.0, message = "Rating must be between 0 and 5"))]
    pub rating: f64,
    #[serde(default)]
    pub reviews: u32,
    #[serde(default)]
    pub is_new_arrival: bool,
    #[serde(default)]
    pub on_sale: bool,
}

impl Sanitize for CreateProductRequest {
    fn sanitize(&mut self) {
        self.name = self.name.trim().to_string();
        self.description = self.description.trim().to_string();
        self.category = self.category.trim().to_string();
        self.sub_category = self.sub_category.trim().to_string();
    }
}

impl From<CreateProductRequest> for NewProduct {
    fn from(request: CreateProductRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
            price: request.price,
            image: request.image,
            category: request.category,
            sub_category: request.sub_category,
            stock: request.stock,
            features: request.features,
            dimensions: request.dimensions,
            colors: request.colors,
            rating: request.rating,
            reviews: request.reviews,
            is_new_arrival: request.is_new_arrival,
            on_sale: request.on_sale,
        }
    }
}

/// List products with filtering, sorting and pagination
async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Query(query) = query
        .map_err(|e| ServiceError::validation(format!("Invalid query: {}", e.body_text())))?;
    let result = state.catalog.list_products(&query).await?;
    Ok(success_response(result))
}

/// Up to eight highly rated products, at most three per category
async fn featured_products(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state.catalog.featured_products().await?;
    Ok(success_response(products))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.catalog.get_product(&id).await?;
    Ok(success_response(product))
}

/// Create a product (admin)
async fn create_product(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.catalog.create_product(payload.into()).await?;
    Ok(created_response(product))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(overrides: serde_json::Value) -> CreateProductRequest {
        let mut base = json!({
            "name": "Sofá",
            "description": "Tres plazas",
            "price": 899.99,
            "category": "sofas",
            "stock": 4,
            "dimensions": {"width": 210, "height": 85, "depth": 95},
            "rating": 4.2,
            "reviews": 12
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn valid_payload_passes() {
        let request = payload(json!({}));
        assert!(request.validate().is_ok());
        let product = NewProduct::from(request);
        assert_eq!(product.price.to_string(), "899.99");
        assert!(!product.is_new_arrival);
    }

    #[test]
    fn invalid_fields_are_reported() {
        let request = payload(json!({
            "price": -1,
            "rating": 7,
            "dimensions": {"width": 0, "height": 85, "depth": 95}
        }));
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("price"));
        assert!(fields.contains_key("rating"));
        assert!(fields.contains_key("dimensions"));
    }

    #[test]
    fn negative_stock_does_not_deserialize() {
        let value = json!({
            "name": "x", "description": "y", "price": 1, "category": "c", "stock": -2,
            "dimensions": {"width": 1, "height": 1, "depth": 1}
        });
        assert!(serde_json::from_value::<CreateProductRequest>(value).is_err());
    }
}
