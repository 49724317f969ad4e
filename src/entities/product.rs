use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::models::Product;

/// Product entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub price: Decimal,
    pub image: String,
    pub category_id: String,
    pub sub_category: String,
    pub stock: i32,
    #[sea_orm(column_type = "Json")]
    pub features: Json,
    /// `{width, height, depth}`
    #[sea_orm(column_type = "Json")]
    pub dimensions: Json,
    #[sea_orm(column_type = "Json")]
    pub colors: Json,
    pub rating: f64,
    pub reviews: i32,
    pub is_new_arrival: bool,
    pub on_sale: bool,
    /// Insertion time; listing order follows it.
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(Utc::now());
            }
        }
        Ok(active_model)
    }
}

fn to_i32(field: &str, value: u32) -> Result<i32, ServiceError> {
    i32::try_from(value)
        .map_err(|_| ServiceError::validation(format!("{} is too large to store", field)))
}

fn to_u32(field: &str, value: i32) -> Result<u32, ServiceError> {
    u32::try_from(value).map_err(|_| {
        ServiceError::InternalError(format!("stored {} is negative: {}", field, value))
    })
}

impl TryFrom<Model> for Product {
    type Error = ServiceError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Product {
            stock: to_u32("stock", model.stock)?,
            reviews: to_u32("reviews", model.reviews)?,
            features: serde_json::from_value(model.features)?,
            dimensions: serde_json::from_value(model.dimensions)?,
            colors: serde_json::from_value(model.colors)?,
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            image: model.image,
            category: model.category_id,
            sub_category: model.sub_category,
            rating: model.rating,
            is_new_arrival: model.is_new_arrival,
            on_sale: model.on_sale,
        })
    }
}

impl ActiveModel {
    pub fn from_product(product: &Product) -> Result<Self, ServiceError> {
        Ok(ActiveModel {
            id: Set(product.id.clone()),
            name: Set(product.name.clone()),
            description: Set(product.description.clone()),
            price: Set(product.price),
            image: Set(product.image.clone()),
            category_id: Set(product.category.clone()),
            sub_category: Set(product.sub_category.clone()),
            stock: Set(to_i32("stock", product.stock)?),
            features: Set(serde_json::to_value(&product.features)?),
            dimensions: Set(serde_json::to_value(product.dimensions)?),
            colors: Set(serde_json::to_value(&product.colors)?),
            rating: Set(product.rating),
            reviews: Set(to_i32("reviews", product.reviews)?),
            is_new_arrival: Set(product.is_new_arrival),
            on_sale: Set(product.on_sale),
            created_at: ActiveValue::NotSet,
        })
    }
}
