use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::models::Category;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub image: String,
    /// Subcategory slugs, stored as a JSON array.
    #[sea_orm(column_type = "Json")]
    pub sub_categories: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Category {
    type Error = ServiceError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Category {
            id: model.id,
            name: model.name,
            description: model.description,
            image: model.image,
            sub_categories: serde_json::from_value(model.sub_categories)?,
        })
    }
}

impl ActiveModel {
    pub fn from_category(category: &Category) -> Result<Self, ServiceError> {
        Ok(ActiveModel {
            id: sea_orm::Set(category.id.clone()),
            name: sea_orm::Set(category.name.clone()),
            description: sea_orm::Set(category.description.clone()),
            image: sea_orm::Set(category.image.clone()),
            sub_categories: sea_orm::Set(serde_json::to_value(&category.sub_categories)?),
        })
    }
}
