//! Shipping address repository.
//!
//! Every operation is scoped to the owning user; acting on another user's
//! address reads as "not found". The single-default invariant (at most one
//! `is_default` address per user, exactly one whenever the user has any) is
//! maintained procedurally: each mutation runs its clear-then-set sequence
//! inside one transaction. Read-committed isolation or stricter is required
//! for two concurrent default flips on the same user not to lose an update;
//! Postgres' default satisfies this.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use drukmart_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::address::{AddressPayload, ShippingAddress};

const ADDRESS_COLUMNS: &str = "id, user_id, full_name, email, phone, address_line1, \
     address_line2, city, state, postal_code, country, is_default, created_at, updated_at";

/// Raw address row; converted to [`ShippingAddress`] after fetching.
#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
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

impl AddressRow {
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

/// Fetch an address only if it is owned by `user_id`.
///
/// Shared with the order repository, which must run this check inside its
/// own insert transaction to close the delete-mid-request race.
pub(crate) async fn fetch_owned<'e, E>(
    executor: E,
    user_id: UserId,
    id: AddressId,
) -> Result<Option<ShippingAddress>, RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let sql =
        format!("SELECT {ADDRESS_COLUMNS} FROM shipping_addresses WHERE user_id = $1 AND id = $2");
    let row: Option<AddressRow> = sqlx::query_as(&sql)
        .bind(user_id.as_i64())
        .bind(id.as_i64())
        .fetch_optional(executor)
        .await?;

    Ok(row.map(AddressRow::into_address))
}

/// Repository for shipping address operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's addresses, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<ShippingAddress>, RepositoryError> {
        let sql =
            format!("SELECT {ADDRESS_COLUMNS} FROM shipping_addresses WHERE user_id = $1 ORDER BY id");
        let rows: Vec<AddressRow> = sqlx::query_as(&sql)
            .bind(user_id.as_i64())
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(AddressRow::into_address).collect())
    }

    /// Get one of a user's addresses by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<ShippingAddress>, RepositoryError> {
        fetch_owned(self.pool, user_id, id).await
    }

    /// Create an address for a user.
    ///
    /// The user's first address always becomes the default; otherwise the
    /// payload's `is_default` decides. Setting a new default clears the
    /// flag on the user's other addresses in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; the
    /// transaction rolls back as a whole.
    pub async fn create(
        &self,
        user_id: UserId,
        payload: &AddressPayload,
    ) -> Result<ShippingAddress, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let has_existing: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM shipping_addresses WHERE user_id = $1)",
        )
        .bind(user_id.as_i64())
        .fetch_one(&mut *tx)
        .await?;

        let make_default = payload.is_default || !has_existing;

        if make_default {
            sqlx::query(
                "UPDATE shipping_addresses SET is_default = FALSE, updated_at = NOW() \
                 WHERE user_id = $1 AND is_default",
            )
            .bind(user_id.as_i64())
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!(
            "INSERT INTO shipping_addresses \
             (user_id, full_name, email, phone, address_line1, address_line2, \
              city, state, postal_code, country, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {ADDRESS_COLUMNS}"
        );
        let row: AddressRow = sqlx::query_as(&sql)
            .bind(user_id.as_i64())
            .bind(&payload.full_name)
            .bind(&payload.email)
            .bind(&payload.phone)
            .bind(&payload.address_line1)
            .bind(&payload.address_line2)
            .bind(&payload.city)
            .bind(&payload.state)
            .bind(&payload.postal_code)
            .bind(&payload.country)
            .bind(make_default)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(row.into_address())
    }

    /// Replace one of a user's addresses.
    ///
    /// Returns `None` when the address does not exist or belongs to someone
    /// else. Requesting `is_default = true` clears the flag on the user's
    /// other addresses; requesting `false` on the current default is
    /// ignored (demotion happens by promoting another address), so the
    /// invariant holds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        payload: &AddressPayload,
    ) -> Result<Option<ShippingAddress>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<bool> = sqlx::query_scalar(
            "SELECT is_default FROM shipping_addresses \
             WHERE user_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(user_id.as_i64())
        .bind(id.as_i64())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(was_default) = current else {
            return Ok(None);
        };

        let make_default = payload.is_default || was_default;

        if payload.is_default && !was_default {
            sqlx::query(
                "UPDATE shipping_addresses SET is_default = FALSE, updated_at = NOW() \
                 WHERE user_id = $1 AND id <> $2 AND is_default",
            )
            .bind(user_id.as_i64())
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!(
            "UPDATE shipping_addresses SET \
             full_name = $3, email = $4, phone = $5, address_line1 = $6, \
             address_line2 = $7, city = $8, state = $9, postal_code = $10, \
             country = $11, is_default = $12, updated_at = NOW() \
             WHERE user_id = $1 AND id = $2 \
             RETURNING {ADDRESS_COLUMNS}"
        );
        let row: AddressRow = sqlx::query_as(&sql)
            .bind(user_id.as_i64())
            .bind(id.as_i64())
            .bind(&payload.full_name)
            .bind(&payload.email)
            .bind(&payload.phone)
            .bind(&payload.address_line1)
            .bind(&payload.address_line2)
            .bind(&payload.city)
            .bind(&payload.state)
            .bind(&payload.postal_code)
            .bind(&payload.country)
            .bind(make_default)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(row.into_address()))
    }

    /// Delete one of a user's addresses.
    ///
    /// Returns `false` when the address does not exist or belongs to
    /// someone else. Deleting the current default promotes the oldest
    /// remaining address, so a user with addresses never has zero defaults.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<bool> = sqlx::query_scalar(
            "DELETE FROM shipping_addresses WHERE user_id = $1 AND id = $2 \
             RETURNING is_default",
        )
        .bind(user_id.as_i64())
        .bind(id.as_i64())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(was_default) = deleted else {
            return Ok(false);
        };

        if was_default {
            sqlx::query(
                "UPDATE shipping_addresses SET is_default = TRUE, updated_at = NOW() \
                 WHERE id = (SELECT id FROM shipping_addresses WHERE user_id = $1 \
                             ORDER BY id LIMIT 1)",
            )
            .bind(user_id.as_i64())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(true)
    }
}
