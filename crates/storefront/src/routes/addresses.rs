//! Shipping address route handlers.
//!
//! All handlers are scoped to the authenticated user; an address owned by
//! someone else responds 404 rather than 403 so existence is not leaked.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::instrument;

use drukmart_core::AddressId;

use crate::db::addresses::AddressRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::AddressPayload;
use crate::state::AppState;

/// `GET /api/addresses` - list the user's addresses.
#[instrument(skip(state, auth), fields(user_id = %auth.0.id))]
pub async fn index(State(state): State<AppState>, auth: RequireAuth) -> Result<impl IntoResponse> {
    let addresses = AddressRepository::new(state.pool()).list(auth.0.id).await?;
    Ok(Json(addresses))
}

/// `POST /api/addresses` - create an address.
///
/// The user's first address becomes the default automatically.
#[instrument(skip(state, auth, payload), fields(user_id = %auth.0.id))]
pub async fn store(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(payload): Json<AddressPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let address = AddressRepository::new(state.pool())
        .create(auth.0.id, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(address)))
}

/// `GET /api/addresses/{id}` - fetch one address.
#[instrument(skip(state, auth), fields(user_id = %auth.0.id))]
pub async fn show(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let address = AddressRepository::new(state.pool())
        .get(auth.0.id, AddressId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Shipping address not found".to_owned()))?;

    Ok(Json(address))
}

/// `PUT /api/addresses/{id}` - replace one address.
#[instrument(skip(state, auth, payload), fields(user_id = %auth.0.id))]
pub async fn update(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<i64>,
    Json(payload): Json<AddressPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let address = AddressRepository::new(state.pool())
        .update(auth.0.id, AddressId::new(id), &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("Shipping address not found".to_owned()))?;

    Ok(Json(address))
}

/// `DELETE /api/addresses/{id}` - delete one address.
///
/// Deleting the default promotes another address when one exists.
#[instrument(skip(state, auth), fields(user_id = %auth.0.id))]
pub async fn destroy(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let deleted = AddressRepository::new(state.pool())
        .delete(auth.0.id, AddressId::new(id))
        .await?;

    if !deleted {
        return Err(AppError::NotFound("Shipping address not found".to_owned()));
    }

    Ok(StatusCode::NO_CONTENT)
}
