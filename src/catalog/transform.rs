use crate::catalog::columns::{CatalogField, ColumnAliasTable, RawRow};
use crate::catalog::models::{ParsedCatalog, Product};
use crate::catalog::pricing::{PriceInputs, derive_price, parse_price, round_two};
use std::collections::BTreeSet;

/// Shown when a row has no usable image.
pub const PLACEHOLDER_IMAGE: &str = "/img/dc9855aa-d3ba-40f6-91a6-c00afab470de.jpg";

/// Category for products without a brand.
pub const DEFAULT_CATEGORY: &str = "Канцтовары";

const IMAGE_DIR: &str = "/images/";
const ID_PREFIX: &str = "item_";

/// Turns raw rows into products, dropping blank and nameless rows.
pub fn build_catalog(aliases: &ColumnAliasTable, rows: &[RawRow]) -> ParsedCatalog {
    let mut products = Vec::new();
    let mut categories = BTreeSet::new();

    for (index, row) in rows.iter().enumerate() {
        let Some(product) = row_to_product(aliases, row, index) else {
            continue;
        };
        categories.insert(product.category.clone());
        products.push(product);
    }

    ParsedCatalog {
        products,
        categories: categories.into_iter().collect(),
        rows_read: rows.len(),
    }
}

/// Builds the product for the `index`-th data row, or `None` when the row
/// is blank or has no name.
pub fn row_to_product(aliases: &ColumnAliasTable, row: &RawRow, index: usize) -> Option<Product> {
    if row.values().all(|value| value.trim().is_empty()) {
        return None;
    }

    let name = aliases.resolve_text(row, CatalogField::Name);
    if name.is_empty() {
        return None;
    }

    let brand = aliases.resolve_text(row, CatalogField::Brand);
    let special_offer = aliases.resolve_text(row, CatalogField::SpecialOffer);
    let discount_percent = aliases.resolve_text(row, CatalogField::DiscountPercent);
    let recommended = parse_price(aliases.resolve(row, CatalogField::RecommendedPrice));
    let special_price = parse_price(aliases.resolve(row, CatalogField::SpecialPrice));

    let derived = derive_price(&PriceInputs {
        recommended,
        dealer: parse_price(aliases.resolve(row, CatalogField::DealerPrice)),
        special_offer: &special_offer,
        discount_percent: &discount_percent,
        special_price,
    });

    let category = if brand.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        brand.clone()
    };
    let description = format!("{brand} {name}").trim().to_string();

    Some(Product {
        id: format!("{ID_PREFIX}{index}"),
        name,
        article: aliases.resolve_text(row, CatalogField::Article),
        brand,
        category,
        price: derived.price,
        base_price: derived.base_price,
        recommended_price: round_two(recommended),
        unit: aliases.resolve_text(row, CatalogField::Unit),
        package: aliases.resolve_text(row, CatalogField::Package),
        barcode: aliases.resolve_text(row, CatalogField::Barcode),
        image: normalize_image(aliases.resolve(row, CatalogField::Image)),
        in_stock: true,
        has_special_pricing: derived.has_special_pricing(),
        special_offer,
        discount_percent,
        special_price: (special_price > 0.0).then(|| round_two(special_price)),
        description,
    })
}

/// Maps an image cell onto something the storefront can load.
///
/// URLs and absolute paths pass through, bare file names land under
/// `/images/`, and anything else gets the placeholder.
pub fn normalize_image(raw: &str) -> String {
    let path = raw.trim();
    if path.is_empty() {
        return PLACEHOLDER_IMAGE.to_string();
    }
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with('/') {
        return path.to_string();
    }
    if path.contains('.') {
        return format!("{IMAGE_DIR}{path}");
    }
    PLACEHOLDER_IMAGE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::columns::COLUMN_ALIASES;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn image_paths() {
        assert_eq!(normalize_image("photo.jpg"), "/images/photo.jpg");
        assert_eq!(normalize_image(""), PLACEHOLDER_IMAGE);
        assert_eq!(normalize_image("   "), PLACEHOLDER_IMAGE);
        assert_eq!(
            normalize_image("https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
        assert_eq!(normalize_image("http://x/y"), "http://x/y");
        assert_eq!(normalize_image("/static/p.webp"), "/static/p.webp");
        assert_eq!(normalize_image("нет фото"), PLACEHOLDER_IMAGE);
    }

    #[test]
    fn full_row_maps_every_field() {
        let r = row(&[
            ("Артикул", " EK-123 "),
            ("Бренд", "Erich Krause"),
            ("Наименование", "Ручка шариковая"),
            ("Ед. (единицы измерения)", "шт"),
            ("Цена (Рекомендуемая)", "25,90"),
            ("Цена дилер (по которой идет рассчет)", "19,50"),
            ("Акция!!!", ""),
            ("% скидки", "10"),
            ("Специальная цена!!!", ""),
            ("Упаковка", "50"),
            ("Штрих-код", "4607001234567"),
            ("Фото", "pen.jpg"),
        ]);
        let product = row_to_product(&COLUMN_ALIASES, &r, 3).expect("product");
        assert_eq!(product.id, "item_3");
        assert_eq!(product.article, "EK-123");
        assert_eq!(product.category, "Erich Krause");
        assert_eq!(product.unit, "шт");
        assert_eq!(product.recommended_price, 25.9);
        assert_eq!(product.base_price, 19.5);
        assert_eq!(product.price, 17.55);
        assert!(product.has_special_pricing);
        assert_eq!(product.discount_percent, "10");
        assert_eq!(product.special_price, None);
        assert_eq!(product.package, "50");
        assert_eq!(product.barcode, "4607001234567");
        assert_eq!(product.image, "/images/pen.jpg");
        assert!(product.in_stock);
        assert_eq!(product.description, "Erich Krause Ручка шариковая");
    }

    #[test]
    fn special_price_is_exposed() {
        let r = row(&[
            ("Name", "Маркер"),
            ("Dealer Price", "100"),
            ("Special Price", "77.777"),
        ]);
        let product = row_to_product(&COLUMN_ALIASES, &r, 0).expect("product");
        assert_eq!(product.price, 77.78);
        assert_eq!(product.special_price, Some(77.78));
        assert_eq!(product.base_price, 100.0);
    }

    #[test]
    fn nameless_and_blank_rows_are_dropped() {
        let blank = row(&[("Наименование", "  "), ("Бренд", " ")]);
        assert!(row_to_product(&COLUMN_ALIASES, &blank, 0).is_none());

        let nameless = row(&[("Бренд", "Brauberg"), ("Цена дилер", "10")]);
        assert!(row_to_product(&COLUMN_ALIASES, &nameless, 1).is_none());

        let placeholder = row(&[("Наименование", "nan"), ("Цена дилер", "10")]);
        assert!(row_to_product(&COLUMN_ALIASES, &placeholder, 2).is_none());
    }

    #[test]
    fn no_price_columns_give_zero() {
        let r = row(&[("Наименование", "Ластик")]);
        let product = row_to_product(&COLUMN_ALIASES, &r, 0).expect("product");
        assert_eq!(product.price, 0.0);
        assert_eq!(product.base_price, 0.0);
        assert!(!product.has_special_pricing);
        assert_eq!(product.image, PLACEHOLDER_IMAGE);
    }

    #[test]
    fn catalog_aggregates_categories_and_keeps_order() {
        let rows = vec![
            row(&[("Наименование", "Папка"), ("Бренд", "Brauberg")]),
            row(&[("Наименование", ""), ("Бренд", "")]),
            row(&[("Наименование", "Скрепки"), ("Бренд", "")]),
            row(&[("Наименование", "Тетрадь"), ("Бренд", "Attache")]),
            row(&[("Наименование", "Файл"), ("Бренд", "Brauberg")]),
        ];
        let catalog = build_catalog(&COLUMN_ALIASES, &rows);
        let ids: Vec<&str> = catalog.products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["item_0", "item_2", "item_3", "item_4"]);
        assert_eq!(
            catalog.categories,
            vec!["Attache", "Brauberg", DEFAULT_CATEGORY]
        );
        assert_eq!(catalog.products[1].category, DEFAULT_CATEGORY);
        assert_eq!(catalog.products[1].description, "Скрепки");
        assert_eq!(catalog.rows_read, 5);
        assert_eq!(catalog.summary(), "Обработано 4 товаров из 3 категорий");
    }

    #[test]
    fn product_serializes_camel_case() {
        let r = row(&[("Наименование", "Клей"), ("Цена дилер", "30")]);
        let product = row_to_product(&COLUMN_ALIASES, &r, 0).expect("product");
        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["basePrice"], serde_json::json!(30.0));
        assert_eq!(value["hasSpecialPricing"], serde_json::json!(false));
        assert!(value["specialPrice"].is_null());
        assert_eq!(value["inStock"], serde_json::json!(true));
    }
}
