use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, put},
    Json, Router,
};
use bazaar_order::{CreateOrderRequest, DailySales, Order, OrderWithOwner, PaymentResultPayload};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{authenticate, AdminUser, CurrentUser};
use crate::state::AppState;

/// Order routes, mounted under `/api/orders`. Every route requires a session.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_orders).post(create_order).delete(delete_all_orders),
        )
        .route("/mine", get(my_orders))
        .route("/total-orders", get(total_orders))
        .route("/total-sales", get(total_sales))
        .route("/total-sales-by-date", get(total_sales_by_date))
        .route("/{id}", get(get_order).delete(delete_order))
        .route("/{id}/pay", put(pay_order))
        .route("/{id}/deliver", put(deliver_order))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

// ============================================================================
// Lifecycle Handlers
// ============================================================================

async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let Json(request) = body?;
    let new_order = request.into_new_order()?;

    let order = state.orders.create_order(Some(&user), new_order).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn pay_order(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<PaymentResultPayload>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let Path(id) = id?;
    let Json(payload) = body?;

    let order = state.orders.mark_paid(id, payload.into()).await?;
    Ok(Json(order))
}

async fn deliver_order(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Order>, AppError> {
    let Path(id) = id?;
    let order = state.orders.mark_delivered(id).await?;
    Ok(Json(order))
}

async fn delete_order(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(id) = id?;
    state.orders.delete_order(id).await?;
    Ok(Json(json!({ "message": "Order deleted successfully" })))
}

async fn delete_all_orders(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<Value>, AppError> {
    let removed = state.orders.delete_all_orders().await?;
    tracing::warn!(admin_id = %admin.id, removed, "All orders deleted");
    Ok(Json(json!({ "message": "All orders deleted successfully" })))
}

// ============================================================================
// Query Handlers
// ============================================================================

async fn list_orders(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<OrderWithOwner>>, AppError> {
    Ok(Json(state.orders.list_orders().await?))
}

async fn my_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list_orders_for(&user).await?))
}

async fn get_order(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<OrderWithOwner>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.orders.find_order(id).await?))
}

// ============================================================================
// Reporting Handlers
// ============================================================================

async fn total_orders(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let total_orders = state.reports.count_orders().await?;
    Ok(Json(json!({ "totalOrders": total_orders })))
}

async fn total_sales(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let total_sales = state.reports.total_sales().await?;
    Ok(Json(json!({ "totalSales": total_sales })))
}

async fn total_sales_by_date(
    State(state): State<AppState>,
) -> Result<Json<Vec<DailySales>>, AppError> {
    Ok(Json(state.reports.sales_by_date().await?))
}
