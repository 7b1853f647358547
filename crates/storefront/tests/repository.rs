//! Integration tests for the address and order repositories.
//!
//! These tests require a running `PostgreSQL` database reachable via
//! `STOREFRONT_DATABASE_URL` and are ignored by default:
//!
//! ```bash
//! STOREFRONT_DATABASE_URL=postgres://localhost/drukmart_test \
//!     cargo test -p drukmart-storefront -- --ignored
//! ```
//!
//! Each test creates its own user, so tests are independent and can run in
//! parallel against one database.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use drukmart_core::{AddressId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId};
use drukmart_storefront::db::addresses::AddressRepository;
use drukmart_storefront::db::orders::{OrderError, OrderRepository};
use drukmart_storefront::models::AddressPayload;
use drukmart_storefront::models::order::{NewOrder, NewOrderItem};

async fn setup_pool() -> PgPool {
    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .expect("STOREFRONT_DATABASE_URL must be set for integration tests");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    pool
}

async fn create_user(pool: &PgPool) -> UserId {
    let email = format!("test-{}@example.bt", Uuid::new_v4());
    let id: i64 = sqlx::query_scalar("INSERT INTO users (email) VALUES ($1) RETURNING id")
        .bind(&email)
        .fetch_one(pool)
        .await
        .expect("failed to create test user");
    UserId::new(id)
}

fn address_payload(full_name: &str, is_default: bool) -> AddressPayload {
    AddressPayload {
        full_name: full_name.to_owned(),
        email: "contact@example.bt".to_owned(),
        phone: "+975-17-123456".to_owned(),
        address_line1: "Norzin Lam 12".to_owned(),
        address_line2: None,
        city: "Thimphu".to_owned(),
        state: "Thimphu".to_owned(),
        postal_code: Some("11001".to_owned()),
        country: "Bhutan".to_owned(),
        is_default,
    }
}

fn order_with_items(shipping_address_id: AddressId, items: Vec<NewOrderItem>) -> NewOrder {
    let items_total: Decimal = items.iter().map(|item| item.total_price).sum();
    NewOrder {
        shipping_address_id,
        total_amount: items_total,
        shipping_cost: Decimal::ZERO,
        tax_amount: Decimal::ZERO,
        status: OrderStatus::Pending,
        notes: None,
        payment_method: PaymentMethod::Cod,
        payment_status: PaymentStatus::Pending,
        items,
    }
}

fn item(product_id: i64, quantity: i32, unit_price: i64) -> NewOrderItem {
    NewOrderItem {
        product_id: ProductId::new(product_id),
        product_name: format!("Product {product_id}"),
        unit_price: Decimal::from(unit_price),
        quantity,
        total_price: Decimal::from(unit_price) * Decimal::from(quantity),
        color: None,
        size: None,
        product_options: None,
    }
}

async fn order_count(pool: &PgPool, user_id: UserId) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id.as_i64())
        .fetch_one(pool)
        .await
        .expect("count query")
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn first_address_becomes_default() {
    let pool = setup_pool().await;
    let user = create_user(&pool).await;
    let repo = AddressRepository::new(&pool);

    let address = repo
        .create(user, &address_payload("First", false))
        .await
        .expect("create");
    assert!(address.is_default);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn default_flips_to_new_default_and_back_on_delete() {
    let pool = setup_pool().await;
    let user = create_user(&pool).await;
    let repo = AddressRepository::new(&pool);

    let a = repo
        .create(user, &address_payload("A", false))
        .await
        .expect("create A");
    assert!(a.is_default);

    let b = repo
        .create(user, &address_payload("B", true))
        .await
        .expect("create B");
    assert!(b.is_default);

    let a_after = repo.get(user, a.id).await.expect("get A").expect("A exists");
    assert!(!a_after.is_default);

    // Exactly one default at all times
    let defaults = repo
        .list(user)
        .await
        .expect("list")
        .into_iter()
        .filter(|addr| addr.is_default)
        .count();
    assert_eq!(defaults, 1);

    // Deleting the default promotes the remaining address
    assert!(repo.delete(user, b.id).await.expect("delete B"));
    let a_after = repo.get(user, a.id).await.expect("get A").expect("A exists");
    assert!(a_after.is_default);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn demoting_the_default_directly_is_ignored() {
    let pool = setup_pool().await;
    let user = create_user(&pool).await;
    let repo = AddressRepository::new(&pool);

    let a = repo
        .create(user, &address_payload("A", true))
        .await
        .expect("create");

    let updated = repo
        .update(user, a.id, &address_payload("A2", false))
        .await
        .expect("update")
        .expect("exists");

    assert_eq!(updated.full_name, "A2");
    assert!(updated.is_default, "sole address stays default");
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn foreign_address_reads_as_not_found() {
    let pool = setup_pool().await;
    let owner = create_user(&pool).await;
    let other = create_user(&pool).await;
    let repo = AddressRepository::new(&pool);

    let address = repo
        .create(owner, &address_payload("Mine", true))
        .await
        .expect("create");

    assert!(repo.get(other, address.id).await.expect("get").is_none());
    assert!(
        repo.update(other, address.id, &address_payload("Stolen", false))
            .await
            .expect("update")
            .is_none()
    );
    assert!(!repo.delete(other, address.id).await.expect("delete"));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn order_create_persists_items_and_address() {
    let pool = setup_pool().await;
    let user = create_user(&pool).await;
    let address = AddressRepository::new(&pool)
        .create(user, &address_payload("Ship here", true))
        .await
        .expect("address");

    let order = OrderRepository::new(&pool)
        .create(user, order_with_items(address.id, vec![item(1, 2, 100), item(2, 1, 50)]))
        .await
        .expect("create order");

    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.shipping_address.id, address.id);
    assert_eq!(order.total_amount, Decimal::from(250));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn order_create_is_atomic_on_item_failure() {
    let pool = setup_pool().await;
    let user = create_user(&pool).await;
    let address = AddressRepository::new(&pool)
        .create(user, &address_payload("Ship here", true))
        .await
        .expect("address");

    // The middle item violates the quantity CHECK constraint at the
    // storage layer (repository-level validation is bypassed on purpose).
    let result = OrderRepository::new(&pool)
        .create(
            user,
            order_with_items(address.id, vec![item(1, 2, 100), item(2, 0, 50), item(3, 1, 25)]),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(order_count(&pool, user).await, 0, "no partial order rows");
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn order_create_rejects_foreign_address_before_writing() {
    let pool = setup_pool().await;
    let buyer = create_user(&pool).await;
    let other = create_user(&pool).await;
    let foreign_address = AddressRepository::new(&pool)
        .create(other, &address_payload("Not yours", true))
        .await
        .expect("address");

    let result = OrderRepository::new(&pool)
        .create(buyer, order_with_items(foreign_address.id, vec![item(1, 1, 100)]))
        .await;

    assert!(matches!(result, Err(OrderError::AddressNotFound)));
    assert_eq!(order_count(&pool, buyer).await, 0);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn cancel_is_guarded_by_status() {
    let pool = setup_pool().await;
    let user = create_user(&pool).await;
    let address = AddressRepository::new(&pool)
        .create(user, &address_payload("Ship here", true))
        .await
        .expect("address");
    let repo = OrderRepository::new(&pool);

    let order = repo
        .create(user, order_with_items(address.id, vec![item(1, 1, 100)]))
        .await
        .expect("create");

    // pending → cancelled succeeds
    let cancelled = repo.cancel(user, order.id).await.expect("cancel");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    // cancelled → cancelled is rejected
    let again = repo.cancel(user, order.id).await;
    assert!(matches!(again, Err(OrderError::NotCancellable(_))));

    // shipped orders are rejected too
    let shipped = repo
        .create(user, order_with_items(address.id, vec![item(1, 1, 100)]))
        .await
        .expect("create");
    sqlx::query("UPDATE orders SET status = 'shipped' WHERE id = $1")
        .bind(shipped.id.as_i64())
        .execute(&pool)
        .await
        .expect("force status");

    let result = repo.cancel(user, shipped.id).await;
    assert!(matches!(
        result,
        Err(OrderError::NotCancellable(OrderStatus::Shipped))
    ));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn order_listing_is_user_scoped_and_newest_first() {
    let pool = setup_pool().await;
    let user = create_user(&pool).await;
    let stranger = create_user(&pool).await;
    let address = AddressRepository::new(&pool)
        .create(user, &address_payload("Ship here", true))
        .await
        .expect("address");
    let repo = OrderRepository::new(&pool);

    let first = repo
        .create(user, order_with_items(address.id, vec![item(1, 1, 100)]))
        .await
        .expect("create");
    let second = repo
        .create(user, order_with_items(address.id, vec![item(2, 1, 50)]))
        .await
        .expect("create");

    let orders = repo.list_for_user(user).await.expect("list");
    let numbers: Vec<&str> = orders.iter().map(|o| o.order_number.as_str()).collect();
    assert!(numbers.contains(&first.order_number.as_str()));
    assert!(numbers.contains(&second.order_number.as_str()));

    assert!(repo.list_for_user(stranger).await.expect("list").is_empty());

    // lookup by number is ownership-scoped
    assert!(
        repo.get_by_number(stranger, &first.order_number)
            .await
            .expect("lookup")
            .is_none()
    );
    assert!(
        repo.get_by_number(user, &first.order_number)
            .await
            .expect("lookup")
            .is_some()
    );
}
