//! Country-of-origin detection from lookup-service tags.

use crate::domain::product::DOMESTIC_COUNTRY;

/// True when any origin tag or the raw countries string points at India.
pub fn is_domestic_by_tags(tags: &[String], countries_raw: Option<&str>) -> bool {
    let tagged = tags.iter().map(|tag| tag.to_lowercase()).any(|tag| {
        tag.contains("india") || tag == "in" || tag == "en:india"
    });
    tagged || countries_raw.is_some_and(|raw| raw.to_lowercase().contains("india"))
}

/// Human-readable country from the first origin tag, e.g. `en:united-kingdom`
/// becomes `united kingdom`.
pub fn country_from_tags(tags: &[String]) -> Option<String> {
    tags.first()
        .map(|tag| tag.replacen("en:", "", 1).replace('-', " "))
        .map(|country| country.trim().to_string())
        .filter(|country| !country.is_empty())
}

/// Loose domestic check for free-text country names.
pub fn is_domestic_country(country: &str) -> bool {
    country.to_lowercase().contains(&DOMESTIC_COUNTRY.to_lowercase())
}

/// Reads a boolean-ish flag that may be `true`, `"true"` or anything else.
pub fn truthy_flag(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(flag)) => *flag,
        Some(serde_json::Value::String(text)) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{country_from_tags, is_domestic_by_tags, is_domestic_country, truthy_flag};

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn domestic_detection_accepts_tag_variants() {
        assert!(is_domestic_by_tags(&tags(&["en:india"]), None));
        assert!(is_domestic_by_tags(&tags(&["IN"]), None));
        assert!(is_domestic_by_tags(&tags(&["fr:inde", "en:India"]), None));
        assert!(is_domestic_by_tags(&[], Some("France, India")));
        assert!(!is_domestic_by_tags(&tags(&["en:france", "en:indonesia"]), Some("France")));
        assert!(!is_domestic_by_tags(&[], None));
    }

    #[test]
    fn country_is_derived_from_first_tag() {
        assert_eq!(
            country_from_tags(&tags(&["en:united-kingdom", "en:india"])),
            Some("united kingdom".to_string())
        );
        assert_eq!(country_from_tags(&[]), None);
        assert_eq!(country_from_tags(&tags(&["en:"])), None);
    }

    #[test]
    fn free_text_country_and_flags() {
        assert!(is_domestic_country("Made in INDIA"));
        assert!(!is_domestic_country("Sri Lanka"));
        assert!(truthy_flag(Some(&json!(true))));
        assert!(truthy_flag(Some(&json!("True"))));
        assert!(!truthy_flag(Some(&json!("unknown"))));
        assert!(!truthy_flag(None));
    }
}
