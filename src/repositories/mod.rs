use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Category, Product, User};

pub mod catalog_repository;
pub mod fixture_repository;
pub mod user_repository;

pub use catalog_repository::SeaOrmCatalogRepository;
pub use fixture_repository::FixtureCatalogRepository;
pub use user_repository::{InMemoryUserRepository, SeaOrmUserRepository};

/// Read access to the catalog plus the inserts used by admin writes.
///
/// Listing order is stable across calls; the filter pipeline relies on it
/// for `default` sorting.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>, ServiceError>;
    async fn find_product(&self, id: &str) -> Result<Option<Product>, ServiceError>;
    async fn insert_product(&self, product: Product) -> Result<Product, ServiceError>;
    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError>;
    async fn find_category(&self, id: &str) -> Result<Option<Category>, ServiceError>;
    async fn insert_category(&self, category: Category) -> Result<Category, ServiceError>;
    /// Short backend label reported by the health endpoint.
    fn backend_name(&self) -> &'static str;
}

/// Account storage keyed by id and by normalised email.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ServiceError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
    /// Fails with `DuplicateEmail` when the email is already taken.
    async fn insert(&self, user: User) -> Result<User, ServiceError>;
    /// Returns whether a user was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, ServiceError>;
}

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}
