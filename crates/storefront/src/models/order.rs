//! Order entities and the order-creation payload.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use drukmart_core::{
    AddressId, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId,
};

use crate::error::ValidationErrors;
use crate::models::address::ShippingAddress;

/// A persisted order with its items and shipping address attached.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_address_id: AddressId,
    pub order_number: String,
    pub total_amount: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
}

/// One line of an order. Owned exclusively by its order; deleting the
/// order cascades.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Product name snapshot at purchase time.
    pub product_name: String,
    /// Unit price snapshot at purchase time.
    pub unit_price: Decimal,
    pub quantity: i32,
    /// `unit_price × quantity`, fixed at creation.
    pub total_price: Decimal,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Opaque variant blob, order-relevant but not validated against the
    /// catalog.
    pub product_options: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated order ready for persistence.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub shipping_address_id: AddressId,
    pub total_amount: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub items: Vec<NewOrderItem>,
}

/// A validated order line ready for persistence.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub total_price: Decimal,
    pub color: Option<String>,
    pub size: Option<String>,
    pub product_options: Option<serde_json::Value>,
}

/// Request body for `POST /api/orders`.
///
/// Amounts arrive as JSON numbers or numeric strings (the SPA sends both);
/// `Decimal`'s deserializer accepts either.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub shipping_address_id: i64,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub status: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<CreateOrderItemRequest>,
}

/// One line of the order-creation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderItemRequest {
    #[serde(default)]
    pub product_id: i64,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub total_price: Decimal,
    pub color: Option<String>,
    pub size: Option<String>,
    pub product_options: Option<serde_json::Value>,
}

impl CreateOrderRequest {
    /// Validate the payload into a [`NewOrder`], collecting every field
    /// error. No write happens before this passes.
    ///
    /// # Errors
    ///
    /// Returns the full set of field-level errors if any check fails.
    pub fn validate(self) -> Result<NewOrder, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.shipping_address_id < 1 {
            errors.add("shipping_address_id", "the shipping address id field is required");
        }

        let payment_method = match PaymentMethod::from_str(&self.payment_method) {
            Ok(method) => method,
            Err(_) => {
                errors.add("payment_method", "the payment method must be one of: cod");
                PaymentMethod::Cod
            }
        };

        // Orders may be created pre-paid (e.g. wallet flows) but never failed.
        let payment_status = match PaymentStatus::from_str(&self.payment_status) {
            Ok(PaymentStatus::Failed) | Err(_) => {
                errors.add("payment_status", "the payment status must be pending or paid");
                PaymentStatus::Pending
            }
            Ok(status) => status,
        };

        // Callers cannot create an order in any status but pending.
        let status = match OrderStatus::from_str(&self.status) {
            Ok(OrderStatus::Pending) => OrderStatus::Pending,
            _ => {
                errors.add("status", "new orders must have status pending");
                OrderStatus::Pending
            }
        };

        check_amount(&mut errors, "total_amount", self.total_amount);
        check_amount(&mut errors, "shipping_cost", self.shipping_cost);
        check_amount(&mut errors, "tax_amount", self.tax_amount);

        if self.items.is_empty() {
            errors.add("items", "at least one item is required");
        }

        let mut items = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.into_iter().enumerate() {
            if item.product_id < 1 {
                errors.add(
                    format!("items.{index}.product_id"),
                    "the product id field is required",
                );
            }
            if item.product_name.trim().is_empty() {
                errors.add(
                    format!("items.{index}.product_name"),
                    "the product name field is required",
                );
            }
            if item.quantity < 1 {
                errors.add(
                    format!("items.{index}.quantity"),
                    "the quantity must be at least 1",
                );
            }
            check_amount(&mut errors, format!("items.{index}.unit_price"), item.unit_price);
            check_amount(&mut errors, format!("items.{index}.total_price"), item.total_price);

            items.push(NewOrderItem {
                product_id: ProductId::new(item.product_id),
                product_name: item.product_name,
                unit_price: item.unit_price,
                quantity: item.quantity,
                total_price: item.total_price,
                color: item.color,
                size: item.size,
                product_options: item.product_options,
            });
        }

        errors.into_result()?;

        Ok(NewOrder {
            shipping_address_id: AddressId::new(self.shipping_address_id),
            total_amount: self.total_amount,
            shipping_cost: self.shipping_cost,
            tax_amount: self.tax_amount,
            status,
            notes: self.notes,
            payment_method,
            payment_status,
            items,
        })
    }
}

fn check_amount(errors: &mut ValidationErrors, field: impl Into<String>, amount: Decimal) {
    if amount < Decimal::ZERO {
        errors.add(field, "the amount must be at least 0");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateOrderRequest {
        CreateOrderRequest {
            shipping_address_id: 1,
            payment_method: "cod".to_owned(),
            payment_status: "pending".to_owned(),
            total_amount: Decimal::from(492),
            shipping_cost: Decimal::from(75),
            tax_amount: Decimal::from(39),
            status: "pending".to_owned(),
            notes: None,
            items: vec![CreateOrderItemRequest {
                product_id: 7,
                product_name: "Gho fabric".to_owned(),
                unit_price: Decimal::from(126),
                quantity: 3,
                total_price: Decimal::from(378),
                color: Some("maroon".to_owned()),
                size: None,
                product_options: None,
            }],
        }
    }

    #[test]
    fn test_valid_request_passes() {
        let order = valid_request().validate().expect("valid");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_method, PaymentMethod::Cod);
        assert_eq!(order.items.len(), 1);
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut request = valid_request();
        request.items.clear();
        let errors = request.validate().expect_err("must fail");
        assert!(errors.fields().contains(&"items"));
    }

    #[test]
    fn test_zero_quantity_rejected_with_indexed_key() {
        let mut request = valid_request();
        request.items[0].quantity = 0;
        let errors = request.validate().expect_err("must fail");
        assert!(errors.fields().contains(&"items.0.quantity"));
    }

    #[test]
    fn test_unknown_payment_method_rejected() {
        let mut request = valid_request();
        request.payment_method = "card".to_owned();
        let errors = request.validate().expect_err("must fail");
        assert!(errors.fields().contains(&"payment_method"));
    }

    #[test]
    fn test_non_pending_initial_status_rejected() {
        let mut request = valid_request();
        request.status = "shipped".to_owned();
        let errors = request.validate().expect_err("must fail");
        assert!(errors.fields().contains(&"status"));
    }

    #[test]
    fn test_failed_payment_status_rejected_at_creation() {
        let mut request = valid_request();
        request.payment_status = "failed".to_owned();
        let errors = request.validate().expect_err("must fail");
        assert!(errors.fields().contains(&"payment_status"));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut request = valid_request();
        request.tax_amount = Decimal::from(-1);
        let errors = request.validate().expect_err("must fail");
        assert!(errors.fields().contains(&"tax_amount"));
    }
}
