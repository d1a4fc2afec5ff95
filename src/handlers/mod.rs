pub mod checkout;
pub mod email;
pub mod invoices;
pub mod openapi;
pub mod shipments;
pub mod tracking;
pub mod webhook;

use actix_web::http::StatusCode;
use actix_web::{error, HttpRequest, HttpResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::errors::AppError;

/// `{"success": true, "data": ...}` with the given status.
pub(crate) fn success<T: Serialize>(status: StatusCode, data: T) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "success": true, "data": data }))
}

/// Default service of every resource.
pub async fn method_not_allowed(req: HttpRequest) -> Result<HttpResponse, AppError> {
    log::debug!("{} {} not allowed", req.method(), req.path());
    Err(AppError::MethodNotAllowed)
}

/// Body and query extraction failures render like every other client error.
pub fn json_config() -> actix_web::web::JsonConfig {
    actix_web::web::JsonConfig::default()
        .error_handler(|err, _req| bad_request(err.to_string()))
}

pub fn query_config() -> actix_web::web::QueryConfig {
    actix_web::web::QueryConfig::default()
        .error_handler(|err, _req| bad_request(err.to_string()))
}

/// Decodes a raw JSON body. Guarded handlers take `web::Bytes` and call this
/// after the credential check, so 401 wins over a malformed payload.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Json deserialize error: {e}")))
}

fn bad_request(msg: String) -> error::Error {
    AppError::BadRequest(msg).into()
}
