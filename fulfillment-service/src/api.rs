use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{OrderUpdate, ProductSummary, ValidationError};

use crate::handlers::{Store, StoreError};
use crate::models::{DailyShipment, OrderDetail, Product};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub product_id: String,
    pub product_name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateProductResponse {
    pub product_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub order_date: NaiveDate,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateShipmentRequest {
    pub shipment_date: NaiveDate,
    pub product_id: String,
    pub product_name: String,
    pub shipped_quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CreateShipmentResponse {
    pub shipment_id: i64,
    pub updated_orders: Vec<OrderUpdate>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/products", post(create_product).get(list_products))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/shortfall", get(shortfall))
        .route("/shipments", post(create_shipment).get(list_shipments))
        .route("/summary", get(summary))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<CreateProductResponse>), ApiError> {
    let product_id = request.product_id.trim();
    let product_name = request.product_name.trim();
    shared::validate_identity(product_id, product_name).map_err(validation_error)?;

    let product = state
        .store
        .create_product(product_id, product_name)
        .await
        .map_err(store_error)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateProductResponse {
            product_id: product.product_id,
        }),
    ))
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state.store.list_products().await.map_err(store_error)?;
    Ok(Json(products))
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiError> {
    let product_id = request.product_id.trim();
    let product_name = request.product_name.trim();
    shared::validate_identity(product_id, product_name).map_err(validation_error)?;
    shared::validate_quantity(request.quantity).map_err(validation_error)?;

    let order = state
        .store
        .create_order(request.order_date, product_id, product_name, request.quantity)
        .await
        .map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(CreateOrderResponse { order_id: order.id })))
}

pub async fn list_orders(
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderDetail>>, ApiError> {
    let orders = state.store.list_orders().await.map_err(store_error)?;
    Ok(Json(orders))
}

pub async fn shortfall(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, i64>>, ApiError> {
    let shortfalls = state.store.shortfall_map().await.map_err(store_error)?;
    Ok(Json(shortfalls))
}

pub async fn create_shipment(
    State(state): State<AppState>,
    Json(request): Json<CreateShipmentRequest>,
) -> Result<(StatusCode, Json<CreateShipmentResponse>), ApiError> {
    let product_id = request.product_id.trim();
    let product_name = request.product_name.trim();
    shared::validate_identity(product_id, product_name).map_err(validation_error)?;
    shared::validate_quantity(request.shipped_quantity).map_err(validation_error)?;

    let (shipment, updated_orders) = state
        .store
        .create_shipment(
            request.shipment_date,
            product_id,
            product_name,
            request.shipped_quantity,
        )
        .await
        .map_err(store_error)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateShipmentResponse {
            shipment_id: shipment.id,
            updated_orders,
        }),
    ))
}

pub async fn list_shipments(
    State(state): State<AppState>,
) -> Result<Json<Vec<DailyShipment>>, ApiError> {
    let shipments = state.store.list_shipments().await.map_err(store_error)?;
    Ok(Json(shipments))
}

pub async fn summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<Vec<ProductSummary>>, ApiError> {
    let (year, month) = match params.month.as_deref() {
        Some(raw) => parse_month(raw).ok_or_else(|| {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: format!("invalid month '{}', expected YYYY-MM", raw),
                }),
            )
        })?,
        None => {
            let today = Utc::now().date_naive();
            (today.year(), today.month())
        }
    };

    let rows = state.store.summary(year, month).await.map_err(store_error)?;
    Ok(Json(rows))
}

pub async fn health_check() -> &'static str {
    "OK"
}

fn parse_month(raw: &str) -> Option<(i32, u32)> {
    let (year, month) = raw.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

fn validation_error(err: ValidationError) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::DuplicateProduct => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        ),
        other => {
            tracing::error!("store error: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal error".to_string(),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_month;

    #[test]
    fn parse_month_accepts_year_dash_month() {
        assert_eq!(parse_month("2025-03"), Some((2025, 3)));
        assert_eq!(parse_month("2025-12"), Some((2025, 12)));
    }

    #[test]
    fn parse_month_rejects_garbage() {
        assert_eq!(parse_month("2025"), None);
        assert_eq!(parse_month("2025-13"), None);
        assert_eq!(parse_month("2025-00"), None);
        assert_eq!(parse_month("march"), None);
    }
}
