//! Rule-of-thumb retail price estimation in INR.
//!
//! The numbers here are fixed tuning constants with no derivation behind them;
//! they live in [`PriceHeuristics`] so callers can swap the table.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

/// Heuristic prices at or below this are replaced by a generator estimate.
pub const GENERATOR_ESTIMATE_THRESHOLD: i64 = 10;
/// Price used when no estimate can be obtained.
pub const FALLBACK_PRICE: i64 = 50;
/// Generator replies below this are treated as implausible.
pub const MIN_PLAUSIBLE_PRICE: i64 = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct CategoryPrice {
    pub keywords: &'static [&'static str],
    pub domestic: f64,
    pub foreign: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PriceHeuristics {
    pub categories: Vec<CategoryPrice>,
    pub default_price: f64,
    pub premium_brands: &'static [&'static str],
    pub premium_multiplier: f64,
    pub bulk_threshold: u64,
    pub bulk_multiplier: f64,
}

impl Default for PriceHeuristics {
    fn default() -> Self {
        Self {
            categories: vec![
                CategoryPrice {
                    keywords: &["beverage", "drink", "soda"],
                    domestic: 30.0,
                    foreign: 120.0,
                },
                CategoryPrice {
                    keywords: &["snack", "chip", "crisp"],
                    domestic: 20.0,
                    foreign: 150.0,
                },
                CategoryPrice {
                    keywords: &["chocolate", "candy", "sweet"],
                    domestic: 40.0,
                    foreign: 200.0,
                },
                CategoryPrice {
                    keywords: &["dairy", "milk", "yogurt"],
                    domestic: 50.0,
                    foreign: 180.0,
                },
                CategoryPrice {
                    keywords: &["cereal", "breakfast"],
                    domestic: 80.0,
                    foreign: 300.0,
                },
                CategoryPrice {
                    keywords: &["sauce", "condiment"],
                    domestic: 60.0,
                    foreign: 250.0,
                },
            ],
            default_price: 50.0,
            premium_brands: &[
                "coca-cola", "pepsi", "nestle", "unilever", "kellogs", "lays", "doritos",
            ],
            premium_multiplier: 1.5,
            bulk_threshold: 500,
            bulk_multiplier: 1.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeUnit {
    Millilitre,
    Litre,
    Gram,
    Kilogram,
}

impl PriceHeuristics {
    /// Estimates a whole-rupee price from category, brand, origin and any size
    /// mentioned in the product name.
    pub fn estimate(&self, name: &str, brand: &str, category: &str, is_domestic: bool) -> Decimal {
        let category = category.to_lowercase();
        let mut price = self
            .categories
            .iter()
            .find(|rule| rule.keywords.iter().any(|keyword| category.contains(keyword)))
            .map(|rule| if is_domestic { rule.domestic } else { rule.foreign })
            .unwrap_or(self.default_price);

        let brand = brand.to_lowercase();
        if self.premium_brands.iter().any(|premium| brand.contains(premium)) {
            price *= self.premium_multiplier;
        }

        if let Some((quantity, unit)) = size_in_name(&name.to_lowercase()) {
            match unit {
                SizeUnit::Litre | SizeUnit::Kilogram => price *= quantity as f64,
                SizeUnit::Millilitre | SizeUnit::Gram if quantity >= self.bulk_threshold => {
                    price *= self.bulk_multiplier
                }
                _ => {}
            }
        }

        Decimal::from(price.round() as i64)
    }
}

static SIZE_PATTERN: OnceLock<Regex> = OnceLock::new();
static INTEGER_PATTERN: OnceLock<Regex> = OnceLock::new();

fn size_pattern() -> &'static Regex {
    SIZE_PATTERN
        .get_or_init(|| Regex::new(r"([0-9]+)\s*(ml|l|g|kg)").expect("size pattern compiles"))
}

fn integer_pattern() -> &'static Regex {
    INTEGER_PATTERN.get_or_init(|| Regex::new(r"[0-9]+").expect("integer pattern compiles"))
}

/// Finds the first `<digits><optional whitespace><unit>` in a lowercased name.
pub fn size_in_name(name: &str) -> Option<(u64, SizeUnit)> {
    let captures = size_pattern().captures(name)?;
    let unit = match &captures[2] {
        "ml" => SizeUnit::Millilitre,
        "l" => SizeUnit::Litre,
        "g" => SizeUnit::Gram,
        _ => SizeUnit::Kilogram,
    };
    Some((captures[1].parse::<u64>().unwrap_or(u64::MAX), unit))
}

/// Reads the first integer out of a free-text generator reply. Implausibly low
/// or missing values become [`FALLBACK_PRICE`].
pub fn parse_price_reply(reply: &str) -> Decimal {
    let first = integer_pattern().find(reply).and_then(|found| found.as_str().parse::<i64>().ok());

    match first {
        Some(price) if price >= MIN_PLAUSIBLE_PRICE => Decimal::from(price),
        _ => Decimal::from(FALLBACK_PRICE),
    }
}
