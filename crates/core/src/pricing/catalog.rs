//! Normalization of raw catalog API payloads.
//!
//! The catalog delivers the same logical value under two or three key
//! spellings depending on the upstream endpoint (`price` vs `price_min`,
//! `tax_rate` vs `taxRate`, ...). Each field has exactly one ordered
//! fallback list here; the first present, non-null value wins. Values may
//! be JSON numbers or numeric strings; anything unparseable normalizes to
//! absent, which the pricing engine treats as a defaulted zero.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::PriceTier;

/// Fallback order for the catalog base price.
const BASE_PRICE_KEYS: &[&str] = &["price", "price_min", "price_max"];
/// Fallback order for the tax rate (percent).
const TAX_RATE_KEYS: &[&str] = &["tax_rate", "taxRate"];
/// Fallback order for the logistics rate (currency per kg).
const LOGISTIC_RATE_KEYS: &[&str] = &["logistic_rate", "logistic"];
/// Fallback order for the unit weight (kg).
const UNIT_WEIGHT_KEYS: &[&str] = &["unit_weight", "weight"];
/// Key holding the bulk-pricing tier list.
const TIER_LIST_KEY: &str = "prices";

/// Leniently parse a JSON value as a decimal.
///
/// Accepts numbers and numeric strings. Null, absent, and garbage all
/// return `None` - the engine's fail-open policy turns that into a
/// defaulted zero rather than an error.
#[must_use]
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(Decimal::from_f64)
            }
        }
        Value::String(s) => s.trim().parse::<Decimal>().ok(),
        _ => None,
    }
}

/// The first present, non-null value among `keys`, parsed leniently.
fn first_decimal(object: &Map<String, Value>, keys: &[&str]) -> Option<Decimal> {
    keys.iter()
        .find_map(|key| object.get(*key).filter(|v| !v.is_null()))
        .and_then(parse_decimal)
}

/// Parse the tier list: an array of `{ beginAmount, price }` objects, both
/// fields possibly strings. Unparseable tiers are skipped.
fn parse_tiers(value: Option<&Value>) -> Vec<PriceTier> {
    use rust_decimal::prelude::ToPrimitive;

    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let min_quantity = parse_decimal(entry.get("beginAmount")?)?
                .trunc()
                .to_u32()?;
            let unit_price = parse_decimal(entry.get("price")?)?;
            Some(PriceTier {
                min_quantity,
                unit_price,
            })
        })
        .collect()
}

/// Normalized pricing inputs for one catalog item.
///
/// Cart lines snapshot this at add time so later catalog changes do not
/// reprice an existing cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PricingFields {
    /// Catalog base price in the source currency.
    pub base_price: Option<Decimal>,
    /// Tax rate in percent.
    pub tax_rate: Option<Decimal>,
    /// Logistics rate in currency per kg.
    pub logistic_rate: Option<Decimal>,
    /// Unit weight in kg.
    pub unit_weight: Option<Decimal>,
    /// Bulk-pricing tiers, if the item has any.
    pub tiers: Vec<PriceTier>,
}

impl PricingFields {
    /// Extract normalized pricing fields from a raw catalog payload.
    ///
    /// Non-object payloads yield an empty (fully-defaulted) set of fields.
    #[must_use]
    pub fn from_catalog(value: &Value) -> Self {
        let Value::Object(object) = value else {
            return Self::default();
        };

        Self {
            base_price: first_decimal(object, BASE_PRICE_KEYS),
            tax_rate: first_decimal(object, TAX_RATE_KEYS),
            logistic_rate: first_decimal(object, LOGISTIC_RATE_KEYS),
            unit_weight: first_decimal(object, UNIT_WEIGHT_KEYS),
            tiers: parse_tiers(object.get(TIER_LIST_KEY)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("decimal")
    }

    #[test]
    fn test_parse_decimal_number_and_string() {
        assert_eq!(parse_decimal(&json!(12)), Some(dec("12")));
        assert_eq!(parse_decimal(&json!(12.5)), Some(dec("12.5")));
        assert_eq!(parse_decimal(&json!("12.5")), Some(dec("12.5")));
        assert_eq!(parse_decimal(&json!(" 7 ")), Some(dec("7")));
    }

    #[test]
    fn test_parse_decimal_garbage_is_none() {
        assert_eq!(parse_decimal(&json!("abc")), None);
        assert_eq!(parse_decimal(&json!("")), None);
        assert_eq!(parse_decimal(&Value::Null), None);
        assert_eq!(parse_decimal(&json!([1, 2])), None);
    }

    #[test]
    fn test_base_price_fallback_order() {
        let product = json!({ "price_min": "9.5", "price_max": "20" });
        let fields = PricingFields::from_catalog(&product);
        assert_eq!(fields.base_price, Some(dec("9.5")));

        let product = json!({ "price": 11, "price_min": "9.5" });
        let fields = PricingFields::from_catalog(&product);
        assert_eq!(fields.base_price, Some(dec("11")));
    }

    #[test]
    fn test_null_falls_through_to_next_key() {
        let product = json!({ "price": null, "price_min": "9.5" });
        let fields = PricingFields::from_catalog(&product);
        assert_eq!(fields.base_price, Some(dec("9.5")));
    }

    #[test]
    fn test_alternate_spellings() {
        let product = json!({
            "taxRate": "10",
            "logistic": 50,
            "weight": "0.5"
        });
        let fields = PricingFields::from_catalog(&product);
        assert_eq!(fields.tax_rate, Some(dec("10")));
        assert_eq!(fields.logistic_rate, Some(dec("50")));
        assert_eq!(fields.unit_weight, Some(dec("0.5")));
    }

    #[test]
    fn test_canonical_spelling_wins_over_alternate() {
        let product = json!({ "tax_rate": "5", "taxRate": "10" });
        let fields = PricingFields::from_catalog(&product);
        assert_eq!(fields.tax_rate, Some(dec("5")));
    }

    #[test]
    fn test_tier_parsing_with_string_fields() {
        let product = json!({
            "prices": [
                { "beginAmount": "1", "price": "10" },
                { "beginAmount": "10", "price": "8" },
                { "beginAmount": "junk", "price": "6" },
                { "beginAmount": "50" }
            ]
        });
        let fields = PricingFields::from_catalog(&product);
        assert_eq!(
            fields.tiers,
            vec![
                PriceTier {
                    min_quantity: 1,
                    unit_price: dec("10")
                },
                PriceTier {
                    min_quantity: 10,
                    unit_price: dec("8")
                },
            ]
        );
    }

    #[test]
    fn test_non_object_payload_is_empty() {
        let fields = PricingFields::from_catalog(&json!("not a product"));
        assert_eq!(fields, PricingFields::default());
    }
}
