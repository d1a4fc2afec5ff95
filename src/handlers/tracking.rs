use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::shipments::{ShipmentEventResponse, ShipmentResponse};
use super::success;
use crate::application::shipment_service::{TrackingQuery, TrackingView};
use crate::domain::order::{Order, OrderItem};
use crate::domain::pricing::money_string;
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TrackShipmentParams {
    pub order_number: Option<String>,
    pub order_id: Option<Uuid>,
    /// When given, must match the buyer's email.
    pub email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackedOrder {
    pub id: Uuid,
    pub order_number: String,
    pub status: String,
    pub subtotal: String,
    pub vat_amount: String,
    pub total: String,
    #[schema(value_type = Object)]
    pub shipping_address: Value,
    pub shipping_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<Order> for TrackedOrder {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            subtotal: money_string(&o.subtotal),
            vat_amount: money_string(&o.vat_amount),
            total: money_string(&o.total),
            order_number: o.order_number,
            status: o.status,
            shipping_address: o.shipping_address,
            shipping_method: o.shipping_method,
            created_at: o.created_at,
            delivered_at: o.delivered_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItem {
    pub title: String,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

impl From<OrderItem> for TrackedItem {
    fn from(i: OrderItem) -> Self {
        Self {
            unit_price: money_string(&i.unit_price),
            line_total: money_string(&i.line_total),
            title: i.title,
            quantity: i.quantity,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackShipmentResponse {
    pub order: TrackedOrder,
    pub items: Vec<TrackedItem>,
    pub shipment: Option<ShipmentResponse>,
    /// Oldest first.
    pub events: Vec<ShipmentEventResponse>,
}

impl From<TrackingView> for TrackShipmentResponse {
    fn from(v: TrackingView) -> Self {
        Self {
            order: v.order.into(),
            items: v.items.into_iter().map(Into::into).collect(),
            shipment: v.shipment.map(Into::into),
            events: v.events.into_iter().map(Into::into).collect(),
        }
    }
}

/// GET /track-shipment
///
/// Public order and shipment lookup. Server-side failures are reported
/// without detail.
#[utoipa::path(
    get,
    path = "/track-shipment",
    params(TrackShipmentParams),
    responses(
        (status = 200, description = "Order, items, shipment and history", body = TrackShipmentResponse),
        (status = 400, description = "Neither orderNumber nor orderId given"),
        (status = 403, description = "Email does not match the order"),
        (status = 404, description = "Order not found"),
    ),
    tag = "tracking"
)]
pub async fn track_shipment(
    state: web::Data<AppState>,
    query: web::Query<TrackShipmentParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();

    let view = state
        .shipments
        .track(TrackingQuery {
            order_number: params.order_number,
            order_id: params.order_id,
            email: params.email,
        })
        .await
        .map_err(|e| AppError::from(e).concealed())?;

    Ok(success(StatusCode::OK, TrackShipmentResponse::from(view)))
}
