//! Database migration command.
//!
//! Applies the storefront migrations embedded from
//! `crates/storefront/migrations/`.

use super::{CommandError, connect};

/// Run all pending storefront migrations.
///
/// # Errors
///
/// Returns an error when the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    tracing::info!("Connecting to storefront database...");
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
