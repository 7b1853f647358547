//! Order repository: atomic order creation, listings, and the cancel guard.
//!
//! Order creation is all-or-nothing: the address ownership check, the order
//! insert, and every item insert run in one transaction. A failure at any
//! step rolls the whole thing back - an order row without items (or the
//! reverse) is never observable.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::warn;

use drukmart_core::{AddressId, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

use super::RepositoryError;
use super::addresses;
use crate::models::address::ShippingAddress;
use crate::models::order::{NewOrder, Order, OrderItem};

/// Prefix for generated order numbers.
const ORDER_NUMBER_PREFIX: &str = "ORD-";
/// Length of the random token following the prefix.
const ORDER_NUMBER_TOKEN_LENGTH: usize = 10;

const ORDER_COLUMNS: &str = "id, user_id, shipping_address_id, order_number, total_amount, \
     shipping_cost, tax_amount, status, notes, payment_method, payment_status, \
     shipped_at, delivered_at, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, unit_price, \
     quantity, total_price, color, size, product_options, created_at, updated_at";

/// Errors from order operations.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// Underlying repository failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// No such order for this user.
    #[error("order not found")]
    NotFound,

    /// The shipping address does not exist or is not owned by the
    /// requesting user. Rejected before any write.
    #[error("shipping address not found")]
    AddressNotFound,

    /// Cancellation requested on an order that is not pending.
    #[error("order is not cancellable from status {0}")]
    NotCancellable(OrderStatus),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::from(err))
    }
}

/// Generate an order number: `ORD-` plus a random alphanumeric token.
///
/// Uniqueness is enforced by the database's unique index; a collision is
/// astronomically unlikely but surfaces as `RepositoryError::Conflict`,
/// and retrying is the caller's responsibility.
fn generate_order_number() -> String {
    let token: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ORDER_NUMBER_TOKEN_LENGTH)
        .map(char::from)
        .collect();
    format!("{ORDER_NUMBER_PREFIX}{token}")
}

/// Recompute the order's totals from its parts and log any disagreement
/// with the client-supplied amounts.
///
/// Totals are client-authoritative (the stored amounts are what the client
/// computed); this check only makes a buggy or malicious client visible,
/// it never blocks the order.
fn integrity_check(order_number: &str, order: &NewOrder) {
    let items_total: Decimal = order.items.iter().map(|item| item.total_price).sum();
    let recomputed = items_total + order.shipping_cost + order.tax_amount;
    if recomputed != order.total_amount {
        warn!(
            order_number,
            client_total = %order.total_amount,
            recomputed = %recomputed,
            "order total does not match recomputed total - storing client amount"
        );
    }

    for (index, item) in order.items.iter().enumerate() {
        let line_total = item.unit_price * Decimal::from(item.quantity);
        if line_total != item.total_price {
            warn!(
                order_number,
                item_index = index,
                product_id = %item.product_id,
                client_line_total = %item.total_price,
                recomputed = %line_total,
                "order item total does not match unit price × quantity"
            );
        }
    }
}

/// Raw order row; converted to [`Order`] once items and address are loaded.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    shipping_address_id: i64,
    order_number: String,
    total_amount: Decimal,
    shipping_cost: Decimal,
    tax_amount: Decimal,
    status: String,
    notes: Option<String>,
    payment_method: String,
    payment_status: String,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(
        self,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
    ) -> Result<Order, RepositoryError> {
        let status = OrderStatus::from_str(&self.status)
            .map_err(RepositoryError::DataCorruption)?;
        let payment_method = self
            .payment_method
            .parse()
            .map_err(RepositoryError::DataCorruption)?;
        let payment_status = self
            .payment_status
            .parse()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            shipping_address_id: AddressId::new(self.shipping_address_id),
            order_number: self.order_number,
            total_amount: self.total_amount,
            shipping_cost: self.shipping_cost,
            tax_amount: self.tax_amount,
            status,
            notes: self.notes,
            payment_method,
            payment_status,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
            shipping_address,
        })
    }
}

/// Raw order item row.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    total_price: Decimal,
    color: Option<String>,
    size: Option<String>,
    product_options: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderItemRow {
    fn into_item(self) -> Result<OrderItem, RepositoryError> {
        let product_options = self
            .product_options
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid product options: {e}"))
                })
            })
            .transpose()?;

        Ok(OrderItem {
            id: OrderItemId::new(self.id),
            order_id: OrderId::new(self.order_id),
            product_id: ProductId::new(self.product_id),
            product_name: self.product_name,
            unit_price: self.unit_price,
            quantity: self.quantity,
            total_price: self.total_price,
            color: self.color,
            size: self.size,
            product_options,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for order operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Atomically persist an order and its items.
    ///
    /// The shipping address ownership check runs inside the same
    /// transaction as the inserts, closing the race where the address is
    /// deleted or reassigned mid-request.
    ///
    /// # Errors
    ///
    /// - `OrderError::AddressNotFound` if the address is missing or owned
    ///   by another user (no write happens).
    /// - `OrderError::Repository` for database failures; the whole
    ///   transaction rolls back.
    pub async fn create(&self, user_id: UserId, order: NewOrder) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let shipping_address =
            addresses::fetch_owned(&mut *tx, user_id, order.shipping_address_id)
                .await?
                .ok_or(OrderError::AddressNotFound)?;

        let order_number = generate_order_number();
        integrity_check(&order_number, &order);

        let sql = format!(
            "INSERT INTO orders \
             (user_id, shipping_address_id, order_number, total_amount, shipping_cost, \
              tax_amount, status, notes, payment_method, payment_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ORDER_COLUMNS}"
        );
        let order_row: OrderRow = sqlx::query_as(&sql)
            .bind(user_id.as_i64())
            .bind(order.shipping_address_id.as_i64())
            .bind(&order_number)
            .bind(order.total_amount)
            .bind(order.shipping_cost)
            .bind(order.tax_amount)
            .bind(order.status.as_str())
            .bind(&order.notes)
            .bind(order.payment_method.as_str())
            .bind(order.payment_status.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return OrderError::Repository(RepositoryError::Conflict(
                        "order number already exists".to_owned(),
                    ));
                }
                OrderError::from(e)
            })?;

        let item_sql = format!(
            "INSERT INTO order_items \
             (order_id, product_id, product_name, unit_price, quantity, total_price, \
              color, size, product_options) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {ORDER_ITEM_COLUMNS}"
        );
        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let options_text = item
                .product_options
                .as_ref()
                .map(|options| {
                    serde_json::to_string(options).map_err(|e| {
                        RepositoryError::DataCorruption(format!(
                            "unserializable product options: {e}"
                        ))
                    })
                })
                .transpose()?;

            let item_row: OrderItemRow = sqlx::query_as(&item_sql)
                .bind(order_row.id)
                .bind(item.product_id.as_i64())
                .bind(&item.product_name)
                .bind(item.unit_price)
                .bind(item.quantity)
                .bind(item.total_price)
                .bind(&item.color)
                .bind(&item.size)
                .bind(options_text)
                .fetch_one(&mut *tx)
                .await?;

            items.push(item_row.into_item()?);
        }

        tx.commit().await?;

        Ok(order_row.into_order(items, shipping_address)?)
    }

    /// A user's orders, newest first, with items and addresses attached.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if any query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(user_id.as_i64())
            .fetch_all(self.pool)
            .await?;

        self.assemble(rows).await
    }

    /// Look up a user's order by its order number.
    ///
    /// Ownership is always enforced; another user's order number reads as
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if any query fails.
    pub async fn get_by_number(
        &self,
        user_id: UserId,
        order_number: &str,
    ) -> Result<Option<Order>, OrderError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1 AND user_id = $2"
        );
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(order_number)
            .bind(user_id.as_i64())
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(self.assemble(vec![row]).await?.into_iter().next())
    }

    /// Cancel one of the user's orders.
    ///
    /// Accepted only while the order is exactly `pending`; every other
    /// status rejects with [`OrderError::NotCancellable`]. The status is
    /// read under a row lock so a concurrent fulfillment update cannot
    /// slip between check and write.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` if the order is missing or not owned.
    /// - `OrderError::NotCancellable` if the order is not pending.
    /// - `OrderError::Repository` for database failures.
    pub async fn cancel(&self, user_id: UserId, id: OrderId) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id.as_i64())
        .bind(user_id.as_i64())
        .fetch_optional(&mut *tx)
        .await?;

        let status = status.ok_or(OrderError::NotFound)?;
        let status = OrderStatus::from_str(&status)
            .map_err(RepositoryError::DataCorruption)
            .map_err(OrderError::Repository)?;

        if !status.can_cancel() {
            return Err(OrderError::NotCancellable(status));
        }

        let sql = format!(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        );
        let row: OrderRow = sqlx::query_as(&sql)
            .bind(id.as_i64())
            .bind(OrderStatus::Cancelled.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        self.assemble(vec![row])
            .await?
            .into_iter()
            .next()
            .ok_or(OrderError::NotFound)
    }

    /// Attach items and shipping addresses to a batch of order rows.
    async fn assemble(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, OrderError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let item_sql = format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items \
             WHERE order_id = ANY($1) ORDER BY id"
        );
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(&item_sql)
            .bind(&order_ids)
            .fetch_all(self.pool)
            .await?;

        let mut items_by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for item_row in item_rows {
            let order_id = item_row.order_id;
            items_by_order
                .entry(order_id)
                .or_default()
                .push(item_row.into_item()?);
        }

        let address_ids: Vec<i64> = rows.iter().map(|row| row.shipping_address_id).collect();
        let address_sql = format!(
            "SELECT id, user_id, full_name, email, phone, address_line1, address_line2, \
             city, state, postal_code, country, is_default, created_at, updated_at \
             FROM shipping_addresses WHERE id = ANY($1)"
        );
        let address_rows: Vec<ShippingAddressLookupRow> = sqlx::query_as(&address_sql)
            .bind(&address_ids)
            .fetch_all(self.pool)
            .await?;

        let addresses_by_id: HashMap<i64, ShippingAddress> = address_rows
            .into_iter()
            .map(|row| (row.id, row.into_address()))
            .collect();

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = items_by_order.remove(&row.id).unwrap_or_default();
            // Several orders can share one address, so look up by reference.
            let address = addresses_by_id
                .get(&row.shipping_address_id)
                .cloned()
                .ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "order {} references missing address {}",
                        row.id, row.shipping_address_id
                    ))
                })?;
            orders.push(row.into_order(items, address)?);
        }

        Ok(orders)
    }
}

/// Address row used when joining addresses onto orders.
#[derive(Debug, sqlx::FromRow)]
struct ShippingAddressLookupRow {
    id: i64,
    user_id: i64,
    full_name: String,
    email: String,
    phone: String,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    state: String,
    postal_code: Option<String>,
    country: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShippingAddressLookupRow {
    fn into_address(self) -> ShippingAddress {
        ShippingAddress {
            id: AddressId::new(self.id),
            user_id: UserId::new(self.user_id),
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            address_line1: self.address_line1,
            address_line2: self.address_line2,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
            is_default: self.is_default,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::NewOrderItem;
    use drukmart_core::{PaymentMethod, PaymentStatus};

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        assert!(number.starts_with(ORDER_NUMBER_PREFIX));
        let token = &number[ORDER_NUMBER_PREFIX.len()..];
        assert_eq!(token.len(), ORDER_NUMBER_TOKEN_LENGTH);
        assert!(token.chars().all(char::is_alphanumeric));
    }

    #[test]
    fn test_order_numbers_are_random() {
        assert_ne!(generate_order_number(), generate_order_number());
    }

    #[test]
    fn test_integrity_check_never_blocks() {
        // A mismatched total only logs; the order itself is untouched.
        let order = NewOrder {
            shipping_address_id: AddressId::new(1),
            total_amount: Decimal::from(9999),
            shipping_cost: Decimal::from(10),
            tax_amount: Decimal::from(5),
            status: OrderStatus::Pending,
            notes: None,
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Pending,
            items: vec![NewOrderItem {
                product_id: ProductId::new(1),
                product_name: "Tea".to_owned(),
                unit_price: Decimal::from(10),
                quantity: 2,
                total_price: Decimal::from(25),
                color: None,
                size: None,
                product_options: None,
            }],
        };

        integrity_check("ORD-test", &order);
    }
}
