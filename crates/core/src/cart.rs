//! Cart aggregator: selected line items and their running total.
//!
//! The cart is an in-memory value type; where it lives (browser storage, a
//! session, a test) is the caller's concern. Totals are recomputed through
//! the pricing engine on every read - nothing here caches a derived amount.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::{self, ExchangeRate, PriceBreakdown, Priced, PricingFields};
use crate::types::{Ngultrum, ProductId};

/// Cart-scoped line identifier. Not a database key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(Uuid);

impl LineId {
    /// Generate a fresh line id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A line in the cart: a product in a chosen variant, with the pricing
/// inputs snapshotted at add time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: LineId,
    pub product_id: ProductId,
    pub product_name: String,
    /// Selected variant color, free-form.
    pub color: Option<String>,
    /// Selected variant size, free-form.
    pub size: Option<String>,
    pub quantity: u32,
    /// Pricing inputs captured when the line was added. Later catalog
    /// changes do not reprice an existing line.
    pub pricing: PricingFields,
}

impl CartLine {
    /// Line identity: same product in the same color and size.
    fn merges_with(&self, product_id: ProductId, color: Option<&str>, size: Option<&str>) -> bool {
        self.product_id == product_id
            && self.color.as_deref() == color
            && self.size.as_deref() == size
    }

    /// Per-unit price breakdown at this line's quantity (tier-aware).
    #[must_use]
    pub fn unit_price(&self, fx: &ExchangeRate) -> Priced<PriceBreakdown> {
        pricing::unit_price(&self.pricing, self.quantity, fx)
    }

    /// Total charge for this line: unit price × quantity.
    #[must_use]
    pub fn line_total(&self, fx: &ExchangeRate) -> Priced<Ngultrum> {
        pricing::line_total(&self.pricing, self.quantity, fx)
    }
}

/// Input for [`Cart::add`].
#[derive(Debug, Clone)]
pub struct NewCartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: u32,
    pub pricing: PricingFields,
}

/// The set of selected line items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// The current lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add an item to the cart.
    ///
    /// If a line for the same (product, color, size) already exists, its
    /// quantity is incremented and its original pricing snapshot is kept.
    /// Otherwise a new line is appended with a fresh [`LineId`].
    ///
    /// Returns the id of the affected line.
    pub fn add(&mut self, item: NewCartLine) -> LineId {
        if let Some(line) = self.lines.iter_mut().find(|line| {
            line.merges_with(item.product_id, item.color.as_deref(), item.size.as_deref())
        }) {
            line.quantity = line.quantity.saturating_add(item.quantity);
            return line.id;
        }

        let id = LineId::generate();
        self.lines.push(CartLine {
            id,
            product_id: item.product_id,
            product_name: item.product_name,
            color: item.color,
            size: item.size,
            quantity: item.quantity,
            pricing: item.pricing,
        });
        id
    }

    /// Remove a line by id, returning it if present.
    pub fn remove(&mut self, id: LineId) -> Option<CartLine> {
        let index = self.lines.iter().position(|line| line.id == id)?;
        Some(self.lines.remove(index))
    }

    /// Set a line's quantity by id.
    ///
    /// Quantity zero is representable; whether zero means "remove" is a
    /// UI-level decision. Returns `false` when the line does not exist.
    pub fn set_quantity(&mut self, id: LineId, quantity: u32) -> bool {
        match self.lines.iter_mut().find(|line| line.id == id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0, |sum, line| sum.saturating_add(line.quantity))
    }

    /// The cart total, recomputed from every line.
    ///
    /// Degradation flags from all lines are merged (deduplicated) so the
    /// caller sees every input that was defaulted anywhere in the cart.
    #[must_use]
    pub fn total(&self, fx: &ExchangeRate) -> Priced<Ngultrum> {
        let mut total = Ngultrum::ZERO;
        let mut defaulted = Vec::new();

        for line in &self.lines {
            let priced = line.line_total(fx);
            total = total.saturating_add(priced.value);
            for field in priced.defaulted {
                if !defaulted.contains(&field) {
                    defaulted.push(field);
                }
            }
        }

        Priced {
            value: total,
            defaulted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn fx(rate: &str) -> ExchangeRate {
        ExchangeRate::new(Decimal::from_str(rate).expect("rate"), Utc::now())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("decimal")
    }

    fn pricing(base: &str) -> PricingFields {
        PricingFields {
            base_price: Some(dec(base)),
            tax_rate: Some(dec("0")),
            logistic_rate: Some(dec("0")),
            unit_weight: Some(dec("0")),
            tiers: Vec::new(),
        }
    }

    fn tee_shirt(color: &str, size: &str, quantity: u32) -> NewCartLine {
        NewCartLine {
            product_id: ProductId::new(1),
            product_name: "Tee".to_owned(),
            color: Some(color.to_owned()),
            size: Some(size.to_owned()),
            quantity,
            pricing: pricing("10"),
        }
    }

    #[test]
    fn test_re_add_same_variant_merges() {
        let mut cart = Cart::new();
        let first = cart.add(tee_shirt("red", "M", 2));
        let second = cart.add(tee_shirt("red", "M", 3));

        assert_eq!(first, second);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 5);
    }

    #[test]
    fn test_different_variant_gets_own_line() {
        let mut cart = Cart::new();
        cart.add(tee_shirt("red", "M", 1));
        cart.add(tee_shirt("red", "L", 1));
        cart.add(tee_shirt("blue", "M", 1));

        assert_eq!(cart.lines().len(), 3);
    }

    #[test]
    fn test_merge_keeps_original_pricing_snapshot() {
        let mut cart = Cart::new();
        cart.add(tee_shirt("red", "M", 1));

        let mut repriced = tee_shirt("red", "M", 1);
        repriced.pricing = pricing("99");
        cart.add(repriced);

        assert_eq!(cart.lines()[0].pricing.base_price, Some(dec("10")));
    }

    #[test]
    fn test_remove_by_line_id() {
        let mut cart = Cart::new();
        let id = cart.add(tee_shirt("red", "M", 2));
        cart.add(tee_shirt("blue", "M", 1));

        let removed = cart.remove(id).expect("line exists");
        assert_eq!(removed.quantity, 2);
        assert_eq!(cart.lines().len(), 1);
        assert!(cart.remove(id).is_none());
    }

    #[test]
    fn test_set_quantity() {
        let mut cart = Cart::new();
        let id = cart.add(tee_shirt("red", "M", 2));

        assert!(cart.set_quantity(id, 7));
        assert_eq!(cart.lines()[0].quantity, 7);

        // zero is representable, the line stays
        assert!(cart.set_quantity(id, 0));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 0);

        assert!(!cart.set_quantity(LineId::generate(), 1));
    }

    #[test]
    fn test_total_recomputes_per_line() {
        let mut cart = Cart::new();
        cart.add(tee_shirt("red", "M", 2)); // 10 × 12 = 120 each
        cart.add(tee_shirt("blue", "M", 1));

        let total = cart.total(&fx("12"));
        assert_eq!(total.value, Ngultrum::new(360));
        assert!(!total.is_degraded());
    }

    #[test]
    fn test_total_merges_degradation_flags() {
        let mut cart = Cart::new();
        let mut unpriced = tee_shirt("red", "M", 1);
        unpriced.pricing = PricingFields::default();
        cart.add(unpriced);
        cart.add(tee_shirt("blue", "M", 1));

        let total = cart.total(&fx("12"));
        assert_eq!(total.value, Ngultrum::new(120));
        assert!(total.is_degraded());
        assert!(
            total
                .defaulted
                .contains(&crate::pricing::DefaultedField::BasePrice)
        );
    }

    #[test]
    fn test_tiered_line_uses_quantity_at_read_time() {
        let mut cart = Cart::new();
        let mut bulk = tee_shirt("red", "M", 2);
        bulk.pricing.tiers = vec![crate::pricing::PriceTier {
            min_quantity: 10,
            unit_price: dec("8"),
        }];
        let id = cart.add(bulk);

        // quantity 2: tier does not apply, unit 10 × 12 = 120
        assert_eq!(cart.total(&fx("12")).value, Ngultrum::new(240));

        // quantity 12: tier applies, unit 8 × 12 = 96
        cart.set_quantity(id, 12);
        assert_eq!(cart.total(&fx("12")).value, Ngultrum::new(1152));
    }
}
