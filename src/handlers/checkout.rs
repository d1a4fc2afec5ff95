use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::success;
use crate::application::checkout_service::CheckoutCommand;
use crate::domain::order::{CartItem, PostalAddress};
use crate::domain::pricing::money_string;
use crate::errors::AppError;
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub items: Vec<CartItem>,
    pub buyer_id: Uuid,
    /// Prefills the hosted payment page.
    #[serde(default)]
    pub buyer_email: Option<String>,
    pub shipping_address: PostalAddress,
    /// Defaults to the shipping address.
    #[serde(default)]
    pub billing_address: Option<PostalAddress>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutTotalsResponse {
    pub subtotal: String,
    pub vat_amount: String,
    pub total: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutResponse {
    pub session_id: String,
    pub url: String,
    pub totals: CheckoutTotalsResponse,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /create-checkout
///
/// Prices the cart and opens a hosted payment session. The order itself is
/// only created once the payment provider confirms the session.
#[utoipa::path(
    post,
    path = "/create-checkout",
    request_body = CreateCheckoutRequest,
    responses(
        (status = 200, description = "Payment session created", body = CreateCheckoutResponse),
        (status = 400, description = "Empty cart or incomplete address"),
        (status = 500, description = "Payment provider failure"),
    ),
    tag = "checkout"
)]
pub async fn create_checkout(
    state: web::Data<AppState>,
    body: web::Json<CreateCheckoutRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let outcome = state
        .checkout
        .create_checkout(CheckoutCommand {
            buyer_id: body.buyer_id,
            buyer_email: body.buyer_email,
            items: body.items,
            shipping_address: body.shipping_address,
            billing_address: body.billing_address,
        })
        .await?;

    Ok(success(
        StatusCode::OK,
        CreateCheckoutResponse {
            session_id: outcome.session.id,
            url: outcome.session.url,
            totals: CheckoutTotalsResponse {
                subtotal: money_string(&outcome.totals.subtotal),
                vat_amount: money_string(&outcome.totals.vat_amount),
                total: money_string(&outcome.totals.total),
            },
        },
    ))
}
