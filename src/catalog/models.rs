use serde::{Deserialize, Serialize};

/// A storefront product derived from one catalog row.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub article: String,
    pub brand: String,
    pub category: String,
    pub price: f64,
    pub base_price: f64,
    pub recommended_price: f64,
    pub unit: String,
    pub package: String,
    pub barcode: String,
    pub image: String,
    pub in_stock: bool,
    pub has_special_pricing: bool,
    pub special_offer: String,
    pub discount_percent: String,
    pub special_price: Option<f64>,
    pub description: String,
}

/// Products and categories extracted from one file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedCatalog {
    pub products: Vec<Product>,
    pub categories: Vec<String>,
    /// Data rows read from the source, including skipped ones.
    pub rows_read: usize,
}

impl ParsedCatalog {
    pub fn total_products(&self) -> usize {
        self.products.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Обработано {} товаров из {} категорий",
            self.products.len(),
            self.categories.len()
        )
    }
}
