use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use super::{parse_json, success};
use crate::auth::check_internal_key;
use crate::domain::notification::EmailJob;
use crate::errors::AppError;
use crate::AppState;

/// Fields default to empty so that missing ones are reported together.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    /// order_confirmation, order_shipped, order_delivered, return_requested
    /// or dispute_opened; anything else renders generically.
    pub template: String,
    #[schema(value_type = Object)]
    pub data: Value,
}

/// POST /send-email
///
/// Renders a template and sends it immediately.
#[utoipa::path(
    post,
    path = "/send-email",
    request_body = SendEmailRequest,
    params(
        ("X-Internal-Key" = Option<String>, Header, description = "Required when an internal key is configured"),
    ),
    responses(
        (status = 200, description = "Email sent"),
        (status = 400, description = "Missing required fields"),
        (status = 401, description = "Missing or wrong internal key"),
        (status = 500, description = "Mail service failure"),
    ),
    tag = "internal"
)]
pub async fn send_email(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    check_internal_key(&req, state.internal_api_key.as_deref())?;
    let body: SendEmailRequest = parse_json(&body)?;

    let job = EmailJob {
        to: body.to,
        subject: body.subject,
        template: body.template,
        data: body.data,
    };
    state.notifications.send(&job).await?;

    Ok(success(StatusCode::OK, json!({ "sent": true, "to": job.to })))
}
