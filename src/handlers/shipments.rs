use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{parse_json, success};
use crate::application::shipment_service::CreateShipmentCommand;
use crate::domain::ports::SignedUpload;
use crate::domain::shipment::{Shipment, ShipmentEvent};
use crate::errors::AppError;
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShipmentRequest {
    pub order_id: Uuid,
    #[serde(default)]
    pub courier_name: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    /// Copied onto the order when present.
    #[serde(default)]
    pub shipping_method: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "4.99")]
    pub shipping_cost: Option<BigDecimal>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShipmentStatusRequest {
    pub shipment_id: Uuid,
    /// One of Pending, Processing, Dispatched, In Transit, Out for Delivery,
    /// Delivered, Returned, Delivery Failed.
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProofUploadRequest {
    pub shipment_id: Uuid,
    pub file_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProofConfirmRequest {
    pub shipment_id: Uuid,
    /// Object path returned by the upload request.
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub courier_name: Option<String>,
    pub tracking_number: Option<String>,
    pub status: String,
    pub proof_of_delivery_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Shipment> for ShipmentResponse {
    fn from(s: Shipment) -> Self {
        Self {
            id: s.id,
            order_id: s.order_id,
            seller_id: s.seller_id,
            buyer_id: s.buyer_id,
            courier_name: s.courier_name,
            tracking_number: s.tracking_number,
            status: s.status,
            proof_of_delivery_url: s.proof_of_delivery_url,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentEventResponse {
    pub status: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<ShipmentEvent> for ShipmentEventResponse {
    fn from(e: ShipmentEvent) -> Self {
        Self {
            status: e.status,
            message: e.message,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProofUploadResponse {
    pub signed_url: String,
    pub token: String,
    pub path: String,
}

impl From<SignedUpload> for ProofUploadResponse {
    fn from(u: SignedUpload) -> Self {
        Self {
            signed_url: u.signed_url,
            token: u.token,
            path: u.path,
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /create-shipment
///
/// Creates the shipment of an order (201), or updates courier and tracking
/// details of the existing one (200). The status is never changed here.
#[utoipa::path(
    post,
    path = "/create-shipment",
    request_body = CreateShipmentRequest,
    responses(
        (status = 201, description = "Shipment created", body = ShipmentResponse),
        (status = 200, description = "Existing shipment updated", body = ShipmentResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Caller is not the order's seller or an admin"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer" = [])),
    tag = "shipments"
)]
pub async fn create_shipment(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let actor = state.auth.authenticate(&req).await?;
    let body: CreateShipmentRequest = parse_json(&body)?;

    let outcome = state
        .shipments
        .create_or_update(
            &actor,
            CreateShipmentCommand {
                order_id: body.order_id,
                courier_name: body.courier_name,
                tracking_number: body.tracking_number,
                shipping_method: body.shipping_method,
                shipping_cost: body.shipping_cost,
            },
        )
        .await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(success(status, ShipmentResponse::from(outcome.shipment)))
}

/// PUT /update-shipment-status
///
/// Moves a shipment to any valid status, records the event, applies the
/// order status effect and queues the buyer notification.
#[utoipa::path(
    put,
    path = "/update-shipment-status",
    request_body = UpdateShipmentStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ShipmentResponse),
        (status = 400, description = "Invalid status"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Caller is not the shipment's seller or an admin"),
        (status = 404, description = "Shipment not found"),
    ),
    security(("bearer" = [])),
    tag = "shipments"
)]
pub async fn update_shipment_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let actor = state.auth.authenticate(&req).await?;
    let body: UpdateShipmentStatusRequest = parse_json(&body)?;

    let shipment = state
        .shipments
        .update_status(&actor, body.shipment_id, &body.status, body.message)
        .await?;

    Ok(success(StatusCode::OK, ShipmentResponse::from(shipment)))
}

/// POST /upload-proof-of-delivery
///
/// Issues a short-lived signed upload target under the shipment's prefix.
#[utoipa::path(
    post,
    path = "/upload-proof-of-delivery",
    request_body = ProofUploadRequest,
    responses(
        (status = 200, description = "Signed upload target", body = ProofUploadResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Caller is not the shipment's seller or an admin"),
        (status = 404, description = "Shipment not found"),
    ),
    security(("bearer" = [])),
    tag = "shipments"
)]
pub async fn request_proof_upload(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let actor = state.auth.authenticate(&req).await?;
    let body: ProofUploadRequest = parse_json(&body)?;

    let upload = state
        .shipments
        .request_proof_upload(&actor, body.shipment_id, &body.file_name)
        .await?;

    Ok(success(StatusCode::OK, ProofUploadResponse::from(upload)))
}

/// PUT /upload-proof-of-delivery
///
/// Confirms an upload: stores the public URL on the shipment and records an
/// event with the current status.
#[utoipa::path(
    put,
    path = "/upload-proof-of-delivery",
    request_body = ProofConfirmRequest,
    responses(
        (status = 200, description = "Proof of delivery stored", body = ShipmentResponse),
        (status = 400, description = "Path outside the shipment's prefix"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Caller is not the shipment's seller or an admin"),
        (status = 404, description = "Shipment not found"),
    ),
    security(("bearer" = [])),
    tag = "shipments"
)]
pub async fn confirm_proof_upload(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let actor = state.auth.authenticate(&req).await?;
    let body: ProofConfirmRequest = parse_json(&body)?;

    let shipment = state
        .shipments
        .confirm_proof_upload(&actor, body.shipment_id, &body.path)
        .await?;

    Ok(success(StatusCode::OK, ShipmentResponse::from(shipment)))
}
