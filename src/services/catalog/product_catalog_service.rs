use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::featured::select_featured;
use super::filter::{apply, FilterCriteria, PageLimits, PaginatedResult, ProductQuery};
use crate::cache::TtlCache;
use crate::errors::{FieldError, ServiceError};
use crate::models::{Category, Dimensions, Product};
use crate::repositories::CatalogRepository;

const PRODUCTS_KEY: &str = "products";
const CATEGORIES_KEY: &str = "categories";

/// Validated input for a new product; the id is assigned on creation.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image: String,
    pub category: String,
    pub sub_category: String,
    pub stock: u32,
    pub features: Vec<String>,
    pub dimensions: Dimensions,
    pub colors: Vec<String>,
    pub rating: f64,
    pub reviews: u32,
    pub is_new_arrival: bool,
    pub on_sale: bool,
}

impl NewProduct {
    fn into_product(self, id: String) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            image: self.image,
            category: self.category,
            sub_category: self.sub_category,
            stock: self.stock,
            features: self.features,
            dimensions: self.dimensions,
            colors: self.colors,
            rating: self.rating,
            reviews: self.reviews,
            is_new_arrival: self.is_new_arrival,
            on_sale: self.on_sale,
        }
    }
}

/// Validated input for a new category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    pub image: String,
    pub sub_categories: Vec<String>,
}

/// Service for browsing and extending the product catalog
pub struct ProductCatalogService {
    repo: Arc<dyn CatalogRepository>,
    products_cache: TtlCache<Arc<Vec<Product>>>,
    categories_cache: TtlCache<Arc<Vec<Category>>>,
    limits: PageLimits,
}

impl std::fmt::Debug for ProductCatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductCatalogService")
            .field("backend", &self.repo.backend_name())
            .field("cache_ttl", &self.products_cache.ttl())
            .field("limits", &self.limits)
            .finish()
    }
}

impl ProductCatalogService {
    pub fn new(
        repo: Arc<dyn CatalogRepository>,
        products_cache: TtlCache<Arc<Vec<Product>>>,
        categories_cache: TtlCache<Arc<Vec<Category>>>,
        limits: PageLimits,
    ) -> Self {
        Self {
            repo,
            products_cache,
            categories_cache,
            limits,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.repo.backend_name()
    }

    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    /// Full product list, served from the cache while fresh.
    pub async fn snapshot(&self) -> Result<Arc<Vec<Product>>, ServiceError> {
        self.products_cache
            .get_or_try_insert_with(PRODUCTS_KEY, || async {
                debug!("Loading product snapshot from store");
                self.repo.list_products().await.map(Arc::new)
            })
            .await
    }

    /// Filters, sorts and paginates the catalog.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<PaginatedResult, ServiceError> {
        let criteria = FilterCriteria::from_query(query, self.limits)?;
        let products = self.snapshot().await?;
        let result = apply(&products, &criteria);
        debug!(
            total = result.pagination.total,
            page = result.pagination.current_page,
            "Listed products"
        );
        Ok(result)
    }

    #[instrument(skip(self))]
    pub async fn featured_products(&self) -> Result<Vec<Product>, ServiceError> {
        let products = self.snapshot().await?;
        Ok(select_featured(&products))
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &str) -> Result<Product, ServiceError> {
        self.repo
            .find_product(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    /// Adds a product under an existing category.
    #[instrument(skip(self, input), fields(name = %input.name, category = %input.category))]
    pub async fn create_product(&self, input: NewProduct) -> Result<Product, ServiceError> {
        if self.repo.find_category(&input.category).await?.is_none() {
            return Err(ServiceError::ValidationError {
                message: "Validation failed".to_string(),
                errors: vec![FieldError::new(
                    "category",
                    format!("Category {} does not exist", input.category),
                )],
            });
        }

        let product = self
            .repo
            .insert_product(input.into_product(Uuid::new_v4().to_string()))
            .await?;
        self.products_cache.clear();

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    pub async fn list_categories(&self) -> Result<Arc<Vec<Category>>, ServiceError> {
        self.categories_cache
            .get_or_try_insert_with(CATEGORIES_KEY, || async {
                self.repo.list_categories().await.map(Arc::new)
            })
            .await
    }

    /// Adds a category; names are unique ignoring case.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, input: NewCategory) -> Result<Category, ServiceError> {
        let existing = self.repo.list_categories().await?;
        if existing.iter().any(|c| c.has_name(&input.name)) {
            return Err(ServiceError::Conflict(format!(
                "Category {} already exists",
                input.name
            )));
        }

        let category = self
            .repo
            .insert_category(Category {
                id: Uuid::new_v4().to_string(),
                name: input.name,
                description: input.description,
                image: input.image,
                sub_categories: input.sub_categories,
            })
            .await?;
        self.categories_cache.clear();

        info!(category_id = %category.id, "Category created");
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::FixtureCatalogRepository;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Counts how often the product list is read from the store. With
    /// `pause_next_read` set, the next read holds its result until resumed.
    struct CountingRepository {
        inner: FixtureCatalogRepository,
        product_reads: AtomicUsize,
        pause_next_read: AtomicBool,
        read_fetched: Notify,
        resume_read: Notify,
    }

    #[async_trait]
    impl CatalogRepository for CountingRepository {
        async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
            self.product_reads.fetch_add(1, Ordering::SeqCst);
            let products = self.inner.list_products().await;
            if self.pause_next_read.swap(false, Ordering::SeqCst) {
                self.read_fetched.notify_one();
                self.resume_read.notified().await;
            }
            products
        }
        async fn find_product(&self, id: &str) -> Result<Option<Product>, ServiceError> {
            self.inner.find_product(id).await
        }
        async fn insert_product(&self, product: Product) -> Result<Product, ServiceError> {
            self.inner.insert_product(product).await
        }
        async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
            self.inner.list_categories().await
        }
        async fn find_category(&self, id: &str) -> Result<Option<Category>, ServiceError> {
            self.inner.find_category(id).await
        }
        async fn insert_category(&self, category: Category) -> Result<Category, ServiceError> {
            self.inner.insert_category(category).await
        }
        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    fn product(id: &str, category: &str, price: Decimal) -> Product {
        NewProduct {
            name: format!("Producto {}", id),
            description: "Madera maciza".into(),
            price,
            image: String::new(),
            category: category.into(),
            sub_category: String::new(),
            stock: 5,
            features: vec![],
            dimensions: Dimensions {
                width: 10.0,
                height: 10.0,
                depth: 10.0,
            },
            colors: vec![],
            rating: 4.5,
            reviews: 250,
            is_new_arrival: true,
            on_sale: false,
        }
        .into_product(id.to_string())
    }

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            image: String::new(),
            sub_categories: vec![],
        }
    }

    fn service(ttl: Duration) -> (ProductCatalogService, Arc<CountingRepository>) {
        let inner = FixtureCatalogRepository::new(
            vec![
                product("1", "sillas", dec!(60)),
                product("2", "sillas", dec!(90)),
                product("3", "mesas", dec!(150)),
            ],
            vec![category("sillas", "Sillas"), category("mesas", "Mesas")],
        )
        .unwrap();
        let repo = Arc::new(CountingRepository {
            inner,
            product_reads: AtomicUsize::new(0),
            pause_next_read: AtomicBool::new(false),
            read_fetched: Notify::new(),
            resume_read: Notify::new(),
        });
        let service = ProductCatalogService::new(
            repo.clone(),
            TtlCache::new(ttl),
            TtlCache::new(ttl),
            PageLimits::default(),
        );
        (service, repo)
    }

    fn new_product(category: &str) -> NewProduct {
        let p = product("ignored", category, dec!(75));
        NewProduct {
            name: "Banco".into(),
            description: p.description,
            price: p.price,
            image: p.image,
            category: p.category,
            sub_category: p.sub_category,
            stock: p.stock,
            features: p.features,
            dimensions: p.dimensions,
            colors: p.colors,
            rating: p.rating,
            reviews: p.reviews,
            is_new_arrival: p.is_new_arrival,
            on_sale: p.on_sale,
        }
    }

    #[tokio::test]
    async fn listing_applies_query() {
        let (service, _) = service(Duration::from_secs(60));
        let query = ProductQuery {
            category: Some("sillas".into()),
            sort_by: Some("price-desc".into()),
            ..ProductQuery::default()
        };
        let result = service.list_products(&query).await.unwrap();
        let ids: Vec<&str> = result.products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(result.pagination.total, 2);
    }

    #[tokio::test]
    async fn oversized_limit_is_rejected() {
        let (service, _) = service(Duration::from_secs(60));
        let query = ProductQuery {
            limit: Some("500".into()),
            ..ProductQuery::default()
        };
        assert!(matches!(
            service.list_products(&query).await,
            Err(ServiceError::ValidationError { .. })
        ));
    }

    #[tokio::test]
    async fn snapshot_is_cached_until_a_write() {
        let (service, repo) = service(Duration::from_secs(60));
        service.snapshot().await.unwrap();
        service.featured_products().await.unwrap();
        assert_eq!(repo.product_reads.load(Ordering::SeqCst), 1);

        service.create_product(new_product("mesas")).await.unwrap();
        let snapshot = service.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(repo.product_reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn read_overlapping_a_write_does_not_cache_stale_products() {
        let (service, repo) = service(Duration::from_secs(60));
        repo.pause_next_read.store(true, Ordering::SeqCst);

        let read = service.snapshot();
        let write = async {
            repo.read_fetched.notified().await;
            let created = service.create_product(new_product("mesas")).await;
            repo.resume_read.notify_one();
            created
        };
        let (stale, created) = tokio::join!(read, write);
        assert_eq!(stale.unwrap().len(), 3);
        let created = created.unwrap();

        let listing = service
            .list_products(&ProductQuery::default())
            .await
            .unwrap();
        assert_eq!(listing.pagination.total, 4);
        assert!(listing.products.iter().any(|p| p.id == created.id));
        assert_eq!(repo.product_reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_ttl_reads_through() {
        let (service, repo) = service(Duration::ZERO);
        service.snapshot().await.unwrap();
        service.snapshot().await.unwrap();
        assert_eq!(repo.product_reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let (service, _) = service(Duration::from_secs(60));
        assert_eq!(service.get_product("3").await.unwrap().category, "mesas");
        let err = service.get_product("nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "Product not found"));
    }

    #[tokio::test]
    async fn product_requires_existing_category() {
        let (service, _) = service(Duration::from_secs(60));
        let err = service
            .create_product(new_product("lamparas"))
            .await
            .unwrap_err();
        match err {
            ServiceError::ValidationError { errors, .. } => assert_eq!(errors[0].field, "category"),
            other => panic!("unexpected error: {:?}", other),
        }

        let created = service.create_product(new_product("sillas")).await.unwrap();
        assert!(Uuid::parse_str(&created.id).is_ok());
        assert_eq!(service.get_product(&created.id).await.unwrap().name, "Banco");
    }

    #[tokio::test]
    async fn category_names_are_unique_ignoring_case() {
        let (service, _) = service(Duration::from_secs(60));
        assert_eq!(service.list_categories().await.unwrap().len(), 2);

        let input = NewCategory {
            name: "Lámparas".into(),
            description: "Iluminación".into(),
            image: "https://img.example/lamparas.jpg".into(),
            sub_categories: vec!["techo".into()],
        };
        let created = service.create_category(input.clone()).await.unwrap();
        assert!(Uuid::parse_str(&created.id).is_ok());
        assert_eq!(service.list_categories().await.unwrap().len(), 3);

        let duplicate = NewCategory {
            name: "SILLAS".into(),
            ..input
        };
        assert!(matches!(
            service.create_category(duplicate).await,
            Err(ServiceError::Conflict(_))
        ));
    }
}
