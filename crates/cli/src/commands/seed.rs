//! Database seeding command.
//!
//! Inserts a demo user with two shipping addresses so a fresh environment
//! has something to exercise the API against. Idempotent: re-running
//! leaves an already-seeded database unchanged.

use super::{CommandError, connect};

const DEMO_EMAIL: &str = "demo@drukmart.bt";

/// Seed the database with demo data.
///
/// # Errors
///
/// Returns an error when the database is unreachable or a statement fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(DEMO_EMAIL)
        .fetch_optional(&pool)
        .await?;

    if existing.is_some() {
        tracing::info!("Demo user already present, nothing to do");
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    let user_id: i64 = sqlx::query_scalar("INSERT INTO users (email) VALUES ($1) RETURNING id")
        .bind(DEMO_EMAIL)
        .fetch_one(&mut *tx)
        .await?;

    // First address is the default, second is not.
    sqlx::query(
        "INSERT INTO shipping_addresses \
         (user_id, full_name, email, phone, address_line1, city, state, postal_code, country, is_default) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE)",
    )
    .bind(user_id)
    .bind("Demo Dorji")
    .bind(DEMO_EMAIL)
    .bind("+975-17-000000")
    .bind("Norzin Lam 1")
    .bind("Thimphu")
    .bind("Thimphu")
    .bind("11001")
    .bind("Bhutan")
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO shipping_addresses \
         (user_id, full_name, email, phone, address_line1, city, state, country, is_default) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE)",
    )
    .bind(user_id)
    .bind("Demo Dorji (office)")
    .bind(DEMO_EMAIL)
    .bind("+975-17-000001")
    .bind("Chang Lam 5")
    .bind("Thimphu")
    .bind("Thimphu")
    .bind("Bhutan")
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(user_id, "Seeded demo user with two addresses");
    Ok(())
}
