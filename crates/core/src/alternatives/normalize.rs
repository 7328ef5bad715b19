//! Keyword classifiers mapping free-text comparison labels onto the closed
//! vocabularies stored on alternative links.
//!
//! Rules are checked in order; the first rule with any keyword contained in the
//! lowercased label wins. Labels matching no rule (including empty or absent
//! ones) map to `similar`.

use crate::domain::alternative::{PriceComparison, QualityComparison};

/// An ordered keyword rule: any contained keyword selects `value`.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule<T: 'static> {
    pub keywords: &'static [&'static str],
    pub value: T,
}

pub const QUALITY_RULES: &[KeywordRule<QualityComparison>] = &[
    KeywordRule { keywords: &["better", "superior"], value: QualityComparison::Better },
    KeywordRule { keywords: &["good", "decent"], value: QualityComparison::Good },
];

pub const PRICE_RULES: &[KeywordRule<PriceComparison>] = &[
    KeywordRule {
        keywords: &["cheap", "lower", "affordable", "less"],
        value: PriceComparison::Cheaper,
    },
    KeywordRule {
        keywords: &["expensive", "higher", "more"],
        value: PriceComparison::MoreExpensive,
    },
];

pub fn classify<T: Copy>(label: Option<&str>, rules: &[KeywordRule<T>], default: T) -> T {
    let label = label.unwrap_or_default().to_lowercase();
    rules
        .iter()
        .find(|rule| rule.keywords.iter().any(|keyword| label.contains(keyword)))
        .map(|rule| rule.value)
        .unwrap_or(default)
}

pub fn normalize_quality(label: Option<&str>) -> QualityComparison {
    classify(label, QUALITY_RULES, QualityComparison::Similar)
}

pub fn normalize_price(label: Option<&str>) -> PriceComparison {
    classify(label, PRICE_RULES, PriceComparison::Similar)
}
