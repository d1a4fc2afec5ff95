use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{parse_json, success};
use crate::auth::check_internal_key;
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInvoiceRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInvoiceResponse {
    pub invoice_number: String,
    pub url: String,
}

/// POST /generate-invoice
///
/// Renders the order's PDF invoice, stores it and links it on the order.
/// Regenerating overwrites the stored document.
#[utoipa::path(
    post,
    path = "/generate-invoice",
    request_body = GenerateInvoiceRequest,
    params(
        ("X-Internal-Key" = Option<String>, Header, description = "Required when an internal key is configured"),
    ),
    responses(
        (status = 200, description = "Invoice stored", body = GenerateInvoiceResponse),
        (status = 401, description = "Missing or wrong internal key"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Storage failure"),
    ),
    tag = "internal"
)]
pub async fn generate_invoice(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    check_internal_key(&req, state.internal_api_key.as_deref())?;
    let body: GenerateInvoiceRequest = parse_json(&body)?;

    let invoice = state.invoices.generate(body.order_id).await?;

    Ok(success(
        StatusCode::OK,
        GenerateInvoiceResponse {
            invoice_number: invoice.invoice_number,
            url: invoice.url,
        },
    ))
}
