//! Stripe integration via the REST API (no SDK dependency).

use std::collections::HashMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::domain::errors::DomainError;
use crate::domain::ports::{
    CheckoutSession, CheckoutSessionRequest, PaymentEvent, PaymentEventKind, PaymentProvider,
};

pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    api_base: String,
    currency: String,
    site_url: String,
    tolerance_secs: i64,
}

impl StripeClient {
    pub fn new(
        http: reqwest::Client,
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        api_base: impl Into<String>,
        currency: impl Into<String>,
        site_url: impl Into<String>,
        tolerance_secs: i64,
    ) -> Self {
        Self {
            http,
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            currency: currency.into(),
            site_url: site_url.into().trim_end_matches('/').to_string(),
            tolerance_secs,
        }
    }

    fn session_form(&self, request: &CheckoutSessionRequest) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            (
                "success_url".to_string(),
                format!(
                    "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.site_url
                ),
            ),
            ("cancel_url".to_string(), format!("{}/cart", self.site_url)),
            (
                "client_reference_id".to_string(),
                request.client_reference_id.clone(),
            ),
        ];
        if let Some(email) = &request.customer_email {
            form.push(("customer_email".to_string(), email.clone()));
        }
        for (i, item) in request.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push((
                format!("{prefix}[price_data][currency]"),
                self.currency.clone(),
            ));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        }
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }
        form
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, DomainError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&self.session_form(&request))
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            return Err(DomainError::Upstream(format!(
                "Stripe create checkout session failed ({status}): {message}"
            )));
        }

        match (body["id"].as_str(), body["url"].as_str()) {
            (Some(id), Some(url)) => Ok(CheckoutSession {
                id: id.to_string(),
                url: url.to_string(),
            }),
            _ => Err(DomainError::Upstream(format!(
                "Stripe create checkout session returned no session: {body}"
            ))),
        }
    }

    fn parse_webhook(&self, payload: &[u8], signature: &str) -> Result<PaymentEvent, DomainError> {
        verify_webhook_signature(
            payload,
            signature,
            &self.webhook_secret,
            chrono::Utc::now().timestamp(),
            self.tolerance_secs,
        )?;
        parse_event(payload)
    }
}

/// Verify a `Stripe-Signature` header (`t=<ts>,v1=<hex>[,v1=<hex>...]`).
/// Any of the v1 signatures may match; the timestamp must be within `tolerance_secs` of `now`.
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), DomainError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    let timestamp = match timestamp {
        Some(t) if !signatures.is_empty() => t,
        _ => return Err(DomainError::validation("Invalid Stripe-Signature header")),
    };

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| DomainError::Internal("HMAC key error".to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Constant-time comparison via verify_slice
    let matched = signatures.iter().any(|candidate| match hex::decode(candidate) {
        Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
        Err(_) => false,
    });
    if !matched {
        return Err(DomainError::validation("Webhook signature mismatch"));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| DomainError::validation("Invalid webhook timestamp"))?;
    if (now - ts).abs() > tolerance_secs {
        return Err(DomainError::validation("Webhook timestamp outside tolerance"));
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: Value,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    customer_details: Option<CustomerDetails>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeObject {
    id: String,
    #[serde(default)]
    payment_intent: Option<String>,
}

/// Decode an already verified event body.
pub fn parse_event(payload: &[u8]) -> Result<PaymentEvent, DomainError> {
    let event: StripeEvent = serde_json::from_slice(payload)
        .map_err(|e| DomainError::validation(format!("Invalid webhook payload: {e}")))?;

    let kind = match event.event_type.as_str() {
        "checkout.session.completed" => {
            let raw = event.data.object;
            let session: SessionObject = serde_json::from_value(raw.clone())
                .map_err(|e| DomainError::validation(format!("Invalid checkout session: {e}")))?;
            let customer_email = session
                .customer_details
                .and_then(|d| d.email)
                .or(session.customer_email);
            PaymentEventKind::CheckoutCompleted {
                payment_reference: session.payment_intent.unwrap_or_else(|| session.id.clone()),
                session_id: session.id,
                customer_email,
                metadata: session.metadata.unwrap_or_default(),
                raw,
            }
        }
        "charge.refunded" => {
            let charge: ChargeObject = serde_json::from_value(event.data.object)
                .map_err(|e| DomainError::validation(format!("Invalid charge: {e}")))?;
            PaymentEventKind::ChargeRefunded {
                payment_reference: charge.payment_intent.unwrap_or(charge.id),
            }
        }
        _ => PaymentEventKind::Other,
    };

    Ok(PaymentEvent {
        id: event.id,
        event_type: event.event_type,
        kind,
    })
}

/// Header value for `payload` signed at `timestamp`, as Stripe would send it.
#[cfg(test)]
pub(crate) fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}
