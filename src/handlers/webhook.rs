use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::application::payment_event_service::WebhookOutcome;
use crate::errors::AppError;
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /stripe-webhook
///
/// Consumes payment provider events. The raw body is verified against the
/// signature header before anything else happens; a replayed event id is
/// acknowledged without changes.
#[utoipa::path(
    post,
    path = "/stripe-webhook",
    request_body(content = String, description = "Raw provider event", content_type = "application/json"),
    params(
        ("stripe-signature" = String, Header, description = "t=<timestamp>,v1=<hex hmac>"),
    ),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 400, description = "Missing or invalid signature, or malformed metadata"),
        (status = 500, description = "Persistence failure; the provider will retry"),
    ),
    tag = "payments"
)]
pub async fn stripe_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing stripe-signature header".to_string()))?;

    let outcome = state.payments.handle(&body, signature).await?;

    let response = match outcome {
        WebhookOutcome::Duplicate => json!({ "received": true, "duplicate": true }),
        WebhookOutcome::OrdersCreated(numbers) => {
            log::debug!("Webhook created orders {}", numbers.join(", "));
            json!({ "received": true })
        }
        WebhookOutcome::Refunded(_) | WebhookOutcome::Ignored => json!({ "received": true }),
    };
    Ok(HttpResponse::Ok().json(response))
}
