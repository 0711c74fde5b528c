use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};

/// One data row: header text -> raw cell text.
pub type RawRow = HashMap<String, String>;

/// Canonical product attributes a catalog column can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogField {
    Article,
    Brand,
    Name,
    Unit,
    RecommendedPrice,
    DealerPrice,
    SpecialOffer,
    DiscountPercent,
    SpecialPrice,
    Package,
    Barcode,
    Image,
}

impl CatalogField {
    pub const ALL: [CatalogField; 12] = [
        CatalogField::Article,
        CatalogField::Brand,
        CatalogField::Name,
        CatalogField::Unit,
        CatalogField::RecommendedPrice,
        CatalogField::DealerPrice,
        CatalogField::SpecialOffer,
        CatalogField::DiscountPercent,
        CatalogField::SpecialPrice,
        CatalogField::Package,
        CatalogField::Barcode,
        CatalogField::Image,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            CatalogField::Article => "article",
            CatalogField::Brand => "brand",
            CatalogField::Name => "name",
            CatalogField::Unit => "unit",
            CatalogField::RecommendedPrice => "price_recommended",
            CatalogField::DealerPrice => "price_dealer",
            CatalogField::SpecialOffer => "special_offer",
            CatalogField::DiscountPercent => "discount_percent",
            CatalogField::SpecialPrice => "special_price",
            CatalogField::Package => "package",
            CatalogField::Barcode => "barcode",
            CatalogField::Image => "image",
        }
    }

    pub fn from_canonical_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.canonical_name().eq_ignore_ascii_case(name))
    }
}

/// Header spellings accepted for each field, most specific first.
const ALIASES: &[(CatalogField, &[&str])] = &[
    (CatalogField::Article, &["Артикул", "артикул", "Article"]),
    (CatalogField::Brand, &["Бренд", "бренд", "Brand"]),
    (CatalogField::Name, &["Наименование", "наименование", "Name"]),
    (
        CatalogField::Unit,
        &[
            "Ед.",
            "Ед. (единицы измерения)",
            "единицы измерения",
            "Unit",
        ],
    ),
    (
        CatalogField::RecommendedPrice,
        &[
            "Цена (Рекомендуемая)",
            "рекомендуемая цена",
            "Recommended Price",
        ],
    ),
    (
        CatalogField::DealerPrice,
        &[
            "Цена дилер",
            "Цена дилер (по которой идет рассчет)",
            "дилерская цена",
            "Dealer Price",
        ],
    ),
    (
        CatalogField::SpecialOffer,
        &["Акция!!!", "акция", "Special Offer"],
    ),
    (
        CatalogField::DiscountPercent,
        &["% скидки", "процент скидки", "Discount %"],
    ),
    (
        CatalogField::SpecialPrice,
        &["Специальная цена!!!", "специальная цена", "Special Price"],
    ),
    (
        CatalogField::Package,
        &[
            "Упаковка",
            "упаковка",
            "Упаковка (сколько единиц товара в большой коробке/средней коробки/малой коробки)",
            "Package",
        ],
    ),
    (CatalogField::Barcode, &["Штрих-код", "штрихкод", "Barcode"]),
    (CatalogField::Image, &["Фото", "фото", "Photo", "Image"]),
];

/// Process-wide alias table, built on first use.
pub static COLUMN_ALIASES: Lazy<ColumnAliasTable> = Lazy::new(ColumnAliasTable::builtin);

#[derive(Debug, Clone)]
pub struct ColumnAliasTable {
    aliases: HashMap<CatalogField, Vec<String>>,
}

impl ColumnAliasTable {
    pub fn builtin() -> Self {
        let aliases = ALIASES
            .iter()
            .map(|(field, names)| (*field, names.iter().map(|n| n.to_string()).collect()))
            .collect();
        Self { aliases }
    }

    pub fn aliases(&self, field: CatalogField) -> &[String] {
        self.aliases.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Appends an extra spelling after the built-in ones.
    pub fn with_alias(mut self, field: CatalogField, alias: impl Into<String>) -> Self {
        self.aliases.entry(field).or_default().push(alias.into());
        self
    }

    /// Looks up `field` in `row`, trying each alias in order.
    ///
    /// An alias matches on the exact header first, then on the trimmed,
    /// lowercased header. The first alias that matches wins even when its
    /// cell is empty. Returns an empty string when nothing matches.
    pub fn resolve<'a>(&self, row: &'a RawRow, field: CatalogField) -> &'a str {
        for alias in self.aliases(field) {
            if let Some(value) = row.get(alias) {
                return value;
            }
            let wanted = alias.trim().to_lowercase();
            if let Some((_, value)) = row
                .iter()
                .find(|(key, _)| key.trim().to_lowercase() == wanted)
            {
                return value;
            }
        }
        ""
    }

    /// Header each field would be read from, for fields that match at all.
    pub fn detect_columns(&self, headers: &[String]) -> BTreeMap<&'static str, String> {
        let mut mapping = BTreeMap::new();
        for field in CatalogField::ALL {
            let found = self.aliases(field).iter().find_map(|alias| {
                let wanted = alias.trim().to_lowercase();
                headers
                    .iter()
                    .find(|h| *h == alias)
                    .or_else(|| headers.iter().find(|h| h.trim().to_lowercase() == wanted))
            });
            if let Some(header) = found {
                mapping.insert(field.canonical_name(), header.clone());
            }
        }
        mapping
    }

    /// Resolves and cleans a text field.
    pub fn resolve_text(&self, row: &RawRow, field: CatalogField) -> String {
        clean_text(self.resolve(row, field))
    }
}

/// Trims a cell and blanks out spreadsheet placeholders.
pub fn clean_text(value: &str) -> String {
    let trimmed = value.trim();
    if is_placeholder(trimmed) {
        return String::new();
    }
    trimmed.to_string()
}

pub(crate) fn is_placeholder(value: &str) -> bool {
    matches!(value, "" | "nan" | "None")
}
