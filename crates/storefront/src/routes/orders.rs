//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use drukmart_core::OrderId;

use crate::db::orders::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{CreateOrderRequest, Order};
use crate::routes::parse_id;
use crate::state::AppState;

/// Response body for `POST /api/orders`.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub id: OrderId,
    pub message: &'static str,
    pub order: Order,
}

/// Request body for `PUT /api/orders/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub status: String,
}

/// `POST /api/orders` - atomically create an order with its items.
#[instrument(skip(state, auth, payload), fields(user_id = %auth.0.id))]
pub async fn store(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse> {
    let new_order = payload.validate()?;

    let order = OrderRepository::new(state.pool())
        .create(auth.0.id, new_order)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            id: order.id,
            message: "Order created successfully",
            order,
        }),
    ))
}

/// `GET /api/orders` - the user's orders, newest first.
#[instrument(skip(state, auth), fields(user_id = %auth.0.id))]
pub async fn index(State(state): State<AppState>, auth: RequireAuth) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(auth.0.id)
        .await?;
    Ok(Json(orders))
}

/// `GET /api/orders/{order_number}` - fetch one order by its number.
#[instrument(skip(state, auth), fields(user_id = %auth.0.id))]
pub async fn show(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(order_number): Path<String>,
) -> Result<impl IntoResponse> {
    let order = OrderRepository::new(state.pool())
        .get_by_number(auth.0.id, &order_number)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;

    Ok(Json(order))
}

/// `PUT /api/orders/{id}` - update an order's status.
///
/// The only transition this API accepts is a user-initiated cancellation
/// of a pending order; fulfillment transitions come from external events.
#[instrument(skip(state, auth, payload), fields(user_id = %auth.0.id))]
pub async fn update(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(key): Path<String>,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<impl IntoResponse> {
    let id = parse_id(&key)
        .ok_or_else(|| AppError::BadRequest("invalid order id".to_owned()))?;

    if payload.status != "cancelled" {
        return Err(AppError::BadRequest(
            "only cancellation is supported".to_owned(),
        ));
    }

    let order = OrderRepository::new(state.pool())
        .cancel(auth.0.id, OrderId::new(id))
        .await?;

    Ok(Json(order))
}
