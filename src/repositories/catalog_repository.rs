use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    SqlErr,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{BaseRepository, CatalogRepository, Repository};
use crate::entities::{category, product};
use crate::errors::ServiceError;
use crate::models::{Category, Product};

/// Catalog backed by the `products` and `categories` tables.
#[derive(Debug, Clone)]
pub struct SeaOrmCatalogRepository {
    base: BaseRepository,
}

impl SeaOrmCatalogRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl CatalogRepository for SeaOrmCatalogRepository {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        let models = product::Entity::find()
            .order_by_asc(product::Column::CreatedAt)
            .order_by_asc(product::Column::Id)
            .all(self.base.get_db())
            .await?;
        debug!(count = models.len(), "loaded products from database");
        models.into_iter().map(Product::try_from).collect()
    }

    async fn find_product(&self, id: &str) -> Result<Option<Product>, ServiceError> {
        product::Entity::find_by_id(id.to_string())
            .one(self.base.get_db())
            .await?
            .map(Product::try_from)
            .transpose()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id))]
    async fn insert_product(&self, product: Product) -> Result<Product, ServiceError> {
        let model = product::ActiveModel::from_product(&product)?
            .insert(self.base.get_db())
            .await?;
        Product::try_from(model)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        category::Entity::find()
            .order_by_asc(category::Column::Name)
            .all(self.base.get_db())
            .await?
            .into_iter()
            .map(Category::try_from)
            .collect()
    }

    async fn find_category(&self, id: &str) -> Result<Option<Category>, ServiceError> {
        category::Entity::find_by_id(id.to_string())
            .one(self.base.get_db())
            .await?
            .map(Category::try_from)
            .transpose()
    }

    #[instrument(skip(self, category), fields(category_id = %category.id))]
    async fn insert_category(&self, category: Category) -> Result<Category, ServiceError> {
        let db = self.base.get_db();
        let conflict =
            || ServiceError::Conflict(format!("Category {} already exists", category.name));

        // SQLite's lower() only folds ASCII, so the name comparison runs here;
        // the unique lower(name) index backs it against concurrent inserts.
        let taken = category::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .filter_map(|model| Category::try_from(model).ok())
            .any(|existing| existing.has_name(&category.name));
        if taken {
            return Err(conflict());
        }

        let model = category::ActiveModel::from_category(&category)?
            .insert(db)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => conflict(),
                _ => ServiceError::DatabaseError(e),
            })?;
        Category::try_from(model)
    }

    fn backend_name(&self) -> &'static str {
        "database"
    }
}
