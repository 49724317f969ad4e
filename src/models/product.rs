use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::ValidationError;

/// A catalog item as served over the wire and stored in fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub image: String,
    /// Id of the owning category.
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
    pub stock: u32,
    #[serde(default)]
    pub features: Vec<String>,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub colors: Vec<String>,
    pub rating: f64,
    pub reviews: u32,
    #[serde(default)]
    pub is_new_arrival: bool,
    #[serde(default)]
    pub on_sale: bool,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl Dimensions {
    pub fn is_positive(&self) -> bool {
        [self.width, self.height, self.depth]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }
}

pub fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("price_negative");
        err.message = Some("Price cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

pub fn validate_dimensions(dimensions: &Dimensions) -> Result<(), ValidationError> {
    if !dimensions.is_positive() {
        let mut err = ValidationError::new("dimensions_not_positive");
        err.message = Some("Dimensions must be positive numbers".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn deserializes_fixture_shape() {
        let product: Product = serde_json::from_value(json!({
            "id": "p-1",
            "name": "Silla Nórdica",
            "description": "Silla de comedor",
            "price": 89.99,
            "image": "https://img.example/p-1.jpg",
            "category": "sillas",
            "subCategory": "comedor",
            "stock": 4,
            "features": ["roble"],
            "dimensions": {"width": 45.0, "height": 80.0, "depth": 50.0},
            "colors": ["natural"],
            "rating": 4.6,
            "reviews": 210,
            "isNewArrival": true,
            "onSale": false
        }))
        .unwrap();

        assert_eq!(product.price, dec!(89.99));
        assert_eq!(product.sub_category, "comedor");
        assert!(product.is_new_arrival);
        assert!(product.in_stock());
    }

    #[test]
    fn serializes_camel_case_with_numeric_price() {
        let product: Product = serde_json::from_value(json!({
            "id": "p-2",
            "name": "Mesa",
            "description": "Mesa baja",
            "price": 120,
            "category": "mesas",
            "stock": 0,
            "dimensions": {"width": 1.0, "height": 1.0, "depth": 1.0},
            "rating": 3.9,
            "reviews": 12
        }))
        .unwrap();

        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["price"], json!(120.0));
        assert_eq!(value["isNewArrival"], json!(false));
        assert_eq!(value["subCategory"], json!(""));
        assert!(value.get("sub_category").is_none());
    }

    #[test]
    fn negative_stock_is_rejected_at_parse_time() {
        let parsed: Result<Product, _> = serde_json::from_value(json!({
            "id": "p-3", "name": "x", "description": "y", "price": 1,
            "category": "c", "stock": -1,
            "dimensions": {"width": 1.0, "height": 1.0, "depth": 1.0},
            "rating": 1.0, "reviews": 0
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn validators_reject_negative_price_and_flat_dimensions() {
        assert!(validate_price(&dec!(0)).is_ok());
        assert!(validate_price(&dec!(-0.01)).is_err());
        assert!(validate_dimensions(&Dimensions {
            width: 1.0,
            height: 0.0,
            depth: 1.0
        })
        .is_err());
    }
}
