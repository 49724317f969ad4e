use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use super::CatalogRepository;
use crate::errors::ServiceError;
use crate::models::{Category, Product};

pub const PRODUCTS_FILE: &str = "products.json";
pub const CATEGORIES_FILE: &str = "categories.json";

#[derive(Deserialize)]
struct ProductsFile {
    products: Vec<Product>,
}

#[derive(Deserialize)]
struct CategoriesFile {
    categories: Vec<Category>,
}

/// Catalog held in memory, seeded from JSON fixture files.
///
/// Admin writes only live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct FixtureCatalogRepository {
    products: RwLock<Vec<Product>>,
    categories: RwLock<Vec<Category>>,
}

fn ensure_unique_ids<'a>(
    kind: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ServiceError::InternalError(format!(
                "duplicate {} id in fixtures: {}",
                kind, id
            )));
        }
    }
    Ok(())
}

impl FixtureCatalogRepository {
    pub fn new(products: Vec<Product>, categories: Vec<Category>) -> Result<Self, ServiceError> {
        ensure_unique_ids("product", products.iter().map(|p| p.id.as_str()))?;
        ensure_unique_ids("category", categories.iter().map(|c| c.id.as_str()))?;
        Ok(Self {
            products: RwLock::new(products),
            categories: RwLock::new(categories),
        })
    }

    /// Reads `products.json` and `categories.json` from `dir`.
    #[instrument(skip_all)]
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let dir = dir.as_ref();
        let products: ProductsFile = read_json(&dir.join(PRODUCTS_FILE)).await?;
        let categories: CategoriesFile = read_json(&dir.join(CATEGORIES_FILE)).await?;

        info!(
            dir = %dir.display(),
            products = products.products.len(),
            categories = categories.categories.len(),
            "Loaded catalog fixtures"
        );
        Self::new(products.products, categories.categories)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ServiceError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        ServiceError::InternalError(format!("failed to read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        ServiceError::SerializationError(format!("invalid fixture {}: {}", path.display(), e))
    })
}

#[async_trait]
impl CatalogRepository for FixtureCatalogRepository {
    async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        Ok(self.products.read().await.clone())
    }

    async fn find_product(&self, id: &str) -> Result<Option<Product>, ServiceError> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn insert_product(&self, product: Product) -> Result<Product, ServiceError> {
        let mut products = self.products.write().await;
        if products.iter().any(|p| p.id == product.id) {
            return Err(ServiceError::Conflict(format!(
                "Product {} already exists",
                product.id
            )));
        }
        products.push(product.clone());
        Ok(product)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        Ok(self.categories.read().await.clone())
    }

    async fn find_category(&self, id: &str) -> Result<Option<Category>, ServiceError> {
        Ok(self
            .categories
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn insert_category(&self, category: Category) -> Result<Category, ServiceError> {
        let mut categories = self.categories.write().await;
        if categories
            .iter()
            .any(|c| c.id == category.id || c.has_name(&category.name))
        {
            return Err(ServiceError::Conflict(format!(
                "Category {} already exists",
                category.name
            )));
        }
        categories.push(category.clone());
        Ok(category)
    }

    fn backend_name(&self) -> &'static str {
        "fixtures"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PRODUCTS: &str = r#"{"products": [
        {"id": "1", "name": "Silla", "description": "Silla de roble", "price": 79.5,
         "category": "sillas", "stock": 2,
         "dimensions": {"width": 45, "height": 90, "depth": 50},
         "rating": 4.4, "reviews": 120, "isNewArrival": true},
        {"id": "2", "name": "Mesa", "description": "Mesa extensible", "price": 240,
         "category": "mesas", "stock": 0,
         "dimensions": {"width": 160, "height": 75, "depth": 90},
         "rating": 4.1, "reviews": 40, "onSale": true}
    ]}"#;

    const CATEGORIES: &str = r#"{"categories": [
        {"id": "sillas", "name": "Sillas", "subCategories": ["comedor"]},
        {"id": "mesas", "name": "Mesas"}
    ]}"#;

    fn fixture_dir(products: &str, categories: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PRODUCTS_FILE), products).unwrap();
        std::fs::write(dir.path().join(CATEGORIES_FILE), categories).unwrap();
        dir
    }

    #[tokio::test]
    async fn loads_fixture_files_in_order() {
        let dir = fixture_dir(PRODUCTS, CATEGORIES);
        let repo = FixtureCatalogRepository::load(dir.path()).await.unwrap();

        let products = repo.list_products().await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, "1");
        assert_eq!(repo.find_product("2").await.unwrap().unwrap().name, "Mesa");
        assert!(repo.find_product("3").await.unwrap().is_none());

        let categories = repo.list_categories().await.unwrap();
        assert_eq!(categories[0].sub_categories, vec!["comedor".to_string()]);
    }

    #[tokio::test]
    async fn missing_or_malformed_files_fail() {
        let empty = TempDir::new().unwrap();
        assert!(FixtureCatalogRepository::load(empty.path()).await.is_err());

        let broken = fixture_dir("{\"products\": [", CATEGORIES);
        let err = FixtureCatalogRepository::load(broken.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::SerializationError(_)));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let products = r#"{"products": [
            {"id": "1", "name": "a", "description": "", "price": 1, "category": "c", "stock": 1,
             "dimensions": {"width": 1, "height": 1, "depth": 1}, "rating": 1, "reviews": 1},
            {"id": "1", "name": "b", "description": "", "price": 1, "category": "c", "stock": 1,
             "dimensions": {"width": 1, "height": 1, "depth": 1}, "rating": 1, "reviews": 1}
        ]}"#;
        let dir = fixture_dir(products, CATEGORIES);
        assert!(FixtureCatalogRepository::load(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn inserts_are_appended_and_names_stay_unique() {
        let dir = fixture_dir(PRODUCTS, CATEGORIES);
        let repo = FixtureCatalogRepository::load(dir.path()).await.unwrap();

        let category = Category {
            id: "lamparas".into(),
            name: "Lámparas".into(),
            description: "Iluminación".into(),
            image: "https://img.example/lamparas.jpg".into(),
            sub_categories: vec![],
        };
        repo.insert_category(category.clone()).await.unwrap();
        assert_eq!(repo.list_categories().await.unwrap().len(), 3);

        let mut duplicate = category;
        duplicate.id = "other".into();
        duplicate.name = "LÁMPARAS".into();
        assert!(matches!(
            repo.insert_category(duplicate).await,
            Err(ServiceError::Conflict(_))
        ));
    }
}
