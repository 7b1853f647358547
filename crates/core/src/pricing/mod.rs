//! Pricing engine: converts catalog pricing fields into chargeable amounts.
//!
//! The catalog prices goods in CNY; the storefront charges in Ngultrum. A
//! displayed unit price is built from three components, each rounded *up* to
//! the next whole ngultrum (never round-to-nearest - the store must not
//! undercharge):
//!
//! - base: `ceil(catalog price × CNY→BTN rate)`
//! - tax: `ceil(base × tax rate / 100)`, rate clamped to 0-25%
//! - logistics: `ceil(rate-per-kg × unit weight)`, both operands clamped ≥ 0
//!
//! The engine is fail-open: it never returns an error and never panics.
//! Missing or unparseable inputs degrade to zero, and every degradation is
//! recorded on the returned [`Priced`] value so callers can log it without
//! blocking checkout. A corrupt feed can therefore produce a zero-priced
//! line; that tradeoff is deliberate.
//!
//! The exchange rate is an explicit [`ExchangeRate`] argument. The engine
//! never fetches or refreshes it - staleness handling belongs to the caller
//! (the storefront's rate provider).

pub mod catalog;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Ngultrum;

pub use catalog::{PricingFields, parse_decimal};

/// Upper clamp for catalog tax rates, in percent. Defends against corrupt
/// upstream data claiming absurd rates.
pub const TAX_RATE_CAP_PERCENT: i64 = 25;

/// A CNY→BTN conversion rate together with the moment it was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Ngultrum per yuan.
    pub rate: Decimal,
    /// When the rate was obtained from the rates API.
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRate {
    /// Create a rate fetched at the given instant.
    #[must_use]
    pub const fn new(rate: Decimal, fetched_at: DateTime<Utc>) -> Self {
        Self { rate, fetched_at }
    }

    /// Whether the rate is older than `ttl` as of `now`.
    #[must_use]
    pub fn is_stale_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.fetched_at) > ttl
    }

    /// Whether the rate is older than `ttl` right now.
    #[must_use]
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.is_stale_at(ttl, Utc::now())
    }
}

/// A pricing input that was absent or unparseable and defaulted to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultedField {
    /// No usable base price - the line is unpriceable and priced at zero.
    BasePrice,
    TaxRate,
    LogisticRate,
    UnitWeight,
}

impl std::fmt::Display for DefaultedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::BasePrice => "base_price",
            Self::TaxRate => "tax_rate",
            Self::LogisticRate => "logistic_rate",
            Self::UnitWeight => "unit_weight",
        };
        f.write_str(name)
    }
}

/// A computed value plus the list of inputs that were defaulted to produce
/// it.
///
/// An empty `defaulted` list means every input was present and parseable.
/// A flagged [`DefaultedField::BasePrice`] marks an unpriceable line that
/// needs review; it is still a valid (zero) price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priced<T> {
    /// The computed amount.
    pub value: T,
    /// Inputs that were absent or unparseable and defaulted to zero.
    pub defaulted: Vec<DefaultedField>,
}

impl<T> Priced<T> {
    /// A value computed from fully-present inputs.
    #[must_use]
    pub const fn exact(value: T) -> Self {
        Self {
            value,
            defaulted: Vec::new(),
        }
    }

    /// Whether any input was defaulted.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.defaulted.is_empty()
    }

    /// Map the value, keeping the degradation flags.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Priced<U> {
        Priced {
            value: f(self.value),
            defaulted: self.defaulted,
        }
    }
}

/// One bulk-pricing tier: the unit price that applies from a minimum
/// quantity upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    /// Minimum quantity for this tier to apply.
    pub min_quantity: u32,
    /// Catalog unit price (source currency) at this tier.
    pub unit_price: Decimal,
}

/// The three components of a unit price, already converted and rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base: Ngultrum,
    pub tax: Ngultrum,
    pub logistics: Ngultrum,
}

impl PriceBreakdown {
    /// The combined per-unit charge.
    #[must_use]
    pub fn total(&self) -> Ngultrum {
        self.base
            .saturating_add(self.tax)
            .saturating_add(self.logistics)
    }
}

/// Convert a catalog base price into whole ngultrum: `ceil(price × rate)`.
///
/// Negative inputs clamp to zero.
#[must_use]
pub fn convert_base(base_price: Decimal, fx: &ExchangeRate) -> Ngultrum {
    let price = base_price.max(Decimal::ZERO);
    let rate = fx.rate.max(Decimal::ZERO);
    Ngultrum::from_decimal_ceil(price * rate)
}

/// Tax on a converted base amount: `ceil(base × rate / 100)`.
///
/// The rate is clamped to `[0, 25]` percent before use.
#[must_use]
pub fn tax_amount(local_base: Ngultrum, tax_rate_percent: Decimal) -> Ngultrum {
    let rate = tax_rate_percent
        .max(Decimal::ZERO)
        .min(Decimal::from(TAX_RATE_CAP_PERCENT));
    Ngultrum::from_decimal_ceil(local_base.as_decimal() * rate / Decimal::from(100))
}

/// Weight-based logistics surcharge: `ceil(rate × weight)`.
///
/// Both operands are clamped to ≥ 0.
#[must_use]
pub fn logistics_amount(logistic_rate: Decimal, unit_weight: Decimal) -> Ngultrum {
    let rate = logistic_rate.max(Decimal::ZERO);
    let weight = unit_weight.max(Decimal::ZERO);
    Ngultrum::from_decimal_ceil(rate * weight)
}

/// Resolve the bulk-pricing tier for a quantity.
///
/// Tiers are considered in descending threshold order; the first tier whose
/// minimum quantity is ≤ `quantity` wins. Returns `None` when no tier
/// applies (including an empty tier list) - the caller falls back to the
/// catalog's listed price.
#[must_use]
pub fn resolve_tier_price(tiers: &[PriceTier], quantity: u32) -> Option<Decimal> {
    let mut sorted: Vec<&PriceTier> = tiers.iter().collect();
    sorted.sort_by(|a, b| b.min_quantity.cmp(&a.min_quantity));
    sorted
        .into_iter()
        .find(|tier| tier.min_quantity <= quantity)
        .map(|tier| tier.unit_price)
}

/// Compute the per-unit price breakdown for a catalog item.
///
/// The base price is the resolved tier price for `quantity` when a tier
/// applies, else the normalized catalog price. Absent inputs default to
/// zero and are flagged on the result; an absent base price flags
/// [`DefaultedField::BasePrice`] and yields a zero price rather than an
/// error or a dropped line.
#[must_use]
pub fn unit_price(fields: &PricingFields, quantity: u32, fx: &ExchangeRate) -> Priced<PriceBreakdown> {
    let mut defaulted = Vec::new();

    let base_price = match resolve_tier_price(&fields.tiers, quantity).or(fields.base_price) {
        Some(price) => price,
        None => {
            defaulted.push(DefaultedField::BasePrice);
            Decimal::ZERO
        }
    };

    let tax_rate = fields.tax_rate.unwrap_or_else(|| {
        defaulted.push(DefaultedField::TaxRate);
        Decimal::ZERO
    });

    let logistic_rate = fields.logistic_rate.unwrap_or_else(|| {
        defaulted.push(DefaultedField::LogisticRate);
        Decimal::ZERO
    });

    let unit_weight = fields.unit_weight.unwrap_or_else(|| {
        defaulted.push(DefaultedField::UnitWeight);
        Decimal::ZERO
    });

    let base = convert_base(base_price, fx);
    let tax = tax_amount(base, tax_rate);
    let logistics = logistics_amount(logistic_rate, unit_weight);

    Priced {
        value: PriceBreakdown {
            base,
            tax,
            logistics,
        },
        defaulted,
    }
}

/// Compute the total charge for a line: per-unit price × quantity.
#[must_use]
pub fn line_total(fields: &PricingFields, quantity: u32, fx: &ExchangeRate) -> Priced<Ngultrum> {
    unit_price(fields, quantity, fx).map(|breakdown| {
        breakdown.total().saturating_mul_quantity(quantity)
    })
}
