//! Featured products: eligibility gate, scoring and per-category diversity.

use std::collections::HashMap;

use crate::models::Product;

pub const FEATURED_LIMIT: usize = 8;
pub const MAX_PER_CATEGORY: usize = 3;
pub const MIN_RATING: f64 = 4.0;
pub const MIN_REVIEWS: u32 = 100;

pub fn is_eligible(product: &Product) -> bool {
    product.rating >= MIN_RATING
        && product.reviews >= MIN_REVIEWS
        && product.in_stock()
        && (product.is_new_arrival || product.on_sale)
}

pub fn score(product: &Product) -> f64 {
    let mut score = product.rating * 2.0 + f64::from(product.reviews).log10() * 1.5;
    if product.is_new_arrival {
        score += 1.0;
    }
    if product.on_sale {
        score += 0.5;
    }
    score
}

/// Picks up to [`FEATURED_LIMIT`] eligible products, best score first.
///
/// Admission is greedy: walking in score order, a product is skipped once
/// its category already holds [`MAX_PER_CATEGORY`] picks and is never
/// reconsidered.
pub fn select_featured(products: &[Product]) -> Vec<Product> {
    let mut ranked: Vec<(f64, &Product)> = products
        .iter()
        .filter(|p| is_eligible(p))
        .map(|p| (score(p), p))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut per_category: HashMap<&str, usize> = HashMap::new();
    ranked
        .into_iter()
        .filter(|(_, product)| {
            let admitted = per_category.entry(product.category.as_str()).or_insert(0);
            if *admitted < MAX_PER_CATEGORY {
                *admitted += 1;
                true
            } else {
                false
            }
        })
        .take(FEATURED_LIMIT)
        .map(|(_, product)| product.clone())
        .collect()
}
