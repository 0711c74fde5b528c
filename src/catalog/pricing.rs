use crate::catalog::columns::is_placeholder;

/// Special-offer text that marks a new product rather than a promotion.
pub const NEW_ITEM_MARKER: &str = "Новинка!!!";

const CURRENCY_SYMBOLS: &[char] = &['₽', '$', '€'];

/// Parses a loosely formatted price cell. Never fails: anything that does
/// not parse to a finite, non-negative number yields `0.0`.
///
/// A single comma with no dot is read as the decimal separator; when both
/// appear, commas are thousands separators.
pub fn parse_price(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if is_placeholder(trimmed) {
        return 0.0;
    }

    let mut cleaned: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    let commas = cleaned.matches(',').count();
    let has_dot = cleaned.contains('.');
    if commas == 1 && !has_dot {
        cleaned = cleaned.replace(',', ".");
    } else if commas > 0 && has_dot {
        cleaned = cleaned.replace(',', "");
    }

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(0.0)
}

/// Rounds half away from zero at two decimals. Values too large to scale
/// have no fractional part left and come back unchanged.
pub fn round_two(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}

/// Price-related cells of a single row, already extracted.
#[derive(Debug, Clone, Default)]
pub struct PriceInputs<'a> {
    pub recommended: f64,
    pub dealer: f64,
    pub special_offer: &'a str,
    pub discount_percent: &'a str,
    pub special_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PricingRule {
    SpecialPrice,
    SpecialOffer,
    AbsoluteDiscount,
    PercentDiscount,
    Regular,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedPrice {
    pub price: f64,
    pub base_price: f64,
    pub rule: PricingRule,
}

impl DerivedPrice {
    pub fn has_special_pricing(&self) -> bool {
        self.rule != PricingRule::Regular
    }
}

/// Picks the displayed price. The first applicable rule wins:
/// explicit special price, special-offer text, discount, regular price.
/// A discount above 100 is taken as an absolute price, not a percentage.
pub fn derive_price(inputs: &PriceInputs<'_>) -> DerivedPrice {
    let fallback = if inputs.dealer > 0.0 {
        inputs.dealer
    } else {
        inputs.recommended
    };

    let (price, rule) = if inputs.special_price > 0.0 {
        (inputs.special_price, PricingRule::SpecialPrice)
    } else if is_promotional_offer(inputs.special_offer) {
        let offered = parse_price(inputs.special_offer);
        let price = if offered > 0.0 { offered } else { fallback };
        (price, PricingRule::SpecialOffer)
    } else {
        let discount = if inputs.discount_percent.trim().is_empty() {
            0.0
        } else {
            parse_price(inputs.discount_percent)
        };
        if discount > 100.0 {
            (discount, PricingRule::AbsoluteDiscount)
        } else if discount > 0.0 {
            (
                fallback * (1.0 - discount / 100.0),
                PricingRule::PercentDiscount,
            )
        } else {
            (fallback, PricingRule::Regular)
        }
    };

    DerivedPrice {
        price: round_two(price),
        base_price: round_two(fallback),
        rule,
    }
}

fn is_promotional_offer(offer: &str) -> bool {
    let offer = offer.trim();
    !offer.is_empty() && offer != NEW_ITEM_MARKER
}
