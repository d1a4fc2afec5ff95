use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::DomainError;
use super::pricing::money_string;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTemplate {
    OrderConfirmation,
    OrderShipped,
    OrderDelivered,
    ReturnRequested,
    DisputeOpened,
    /// Unrecognised identifier; rendered as a JSON dump.
    Other(String),
}

impl NotificationTemplate {
    pub fn parse(s: &str) -> Self {
        match s {
            "order_confirmation" => NotificationTemplate::OrderConfirmation,
            "order_shipped" => NotificationTemplate::OrderShipped,
            "order_delivered" => NotificationTemplate::OrderDelivered,
            "return_requested" => NotificationTemplate::ReturnRequested,
            "dispute_opened" => NotificationTemplate::DisputeOpened,
            other => NotificationTemplate::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NotificationTemplate::OrderConfirmation => "order_confirmation",
            NotificationTemplate::OrderShipped => "order_shipped",
            NotificationTemplate::OrderDelivered => "order_delivered",
            NotificationTemplate::ReturnRequested => "return_requested",
            NotificationTemplate::DisputeOpened => "dispute_opened",
            NotificationTemplate::Other(name) => name,
        }
    }

    pub fn subject(&self, order_number: &str) -> String {
        match self {
            NotificationTemplate::OrderConfirmation => format!("Order confirmed: {order_number}"),
            NotificationTemplate::OrderShipped => format!("Your order {order_number} is on its way"),
            NotificationTemplate::OrderDelivered => {
                format!("Your order {order_number} has been delivered")
            }
            NotificationTemplate::ReturnRequested => {
                format!("Return requested for order {order_number}")
            }
            NotificationTemplate::DisputeOpened => {
                format!("Dispute opened for order {order_number}")
            }
            NotificationTemplate::Other(_) => format!("Update on order {order_number}"),
        }
    }
}

const BRAND_HEADER: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Loadify Market</title></head>
<body style="margin:0;padding:0;background:#f4f5f7;font-family:Arial,Helvetica,sans-serif;color:#1f2933;">
<table role="presentation" width="100%" cellpadding="0" cellspacing="0"><tr><td align="center">
<table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;margin:24px 0;">
<tr><td style="background:#0b3d91;padding:20px 32px;color:#ffffff;font-size:22px;font-weight:bold;">Loadify Market</td></tr>
<tr><td style="padding:32px;">
"#;

const BRAND_FOOTER: &str = r#"
</td></tr>
<tr><td style="padding:20px 32px;background:#f0f2f5;font-size:12px;color:#6b7280;">
You are receiving this email because you placed an order on Loadify Market.<br>
Need help? Reply to this email and our team will get back to you.
</td></tr>
</table>
</td></tr></table>
</body>
</html>
"#;

/// Render the full branded HTML document for a template.
pub fn render_email(template: &NotificationTemplate, data: &Value) -> String {
    let content = match template {
        NotificationTemplate::OrderConfirmation => order_confirmation(data),
        NotificationTemplate::OrderShipped => order_shipped(data),
        NotificationTemplate::OrderDelivered => order_delivered(data),
        NotificationTemplate::ReturnRequested => return_requested(data),
        NotificationTemplate::DisputeOpened => dispute_opened(data),
        NotificationTemplate::Other(_) => generic(data),
    };
    format!("{BRAND_HEADER}{content}{BRAND_FOOTER}")
}

fn order_confirmation(data: &Value) -> String {
    let rows: String = array(data, "items")
        .iter()
        .map(|item| {
            let quantity = item["quantity"].as_i64().unwrap_or(0);
            format!(
                "<tr><td style=\"padding:6px 0;\">{}</td><td align=\"center\">{}</td><td align=\"right\">&pound;{}</td></tr>",
                text(item, "title"),
                quantity,
                amount(item, "price"),
            )
        })
        .collect();

    format!(
        "<h1 style=\"font-size:20px;\">Thank you for your order{}</h1>\
         <p>Your order <strong>{}</strong> has been confirmed and passed to the seller.</p>\
         <table width=\"100%\" style=\"border-collapse:collapse;\">\
         <tr><th align=\"left\">Item</th><th>Qty</th><th align=\"right\">Price</th></tr>{}</table>\
         <p>Subtotal: &pound;{}<br>VAT: &pound;{}<br><strong>Total: &pound;{}</strong></p>\
         <p>Shipping to:<br>{}</p>",
        greeting_name(data),
        text(data, "orderNumber"),
        rows,
        amount(data, "subtotal"),
        amount(data, "vatAmount"),
        amount(data, "total"),
        address(&data["shippingAddress"]),
    )
}

fn order_shipped(data: &Value) -> String {
    let tracking = match data["trackingNumber"].as_str() {
        Some(number) if !number.is_empty() => format!(
            "<p>Courier: {}<br>Tracking number: <strong>{}</strong></p>",
            text(data, "courierName"),
            escape(number),
        ),
        _ => String::new(),
    };
    format!(
        "<h1 style=\"font-size:20px;\">Your order is on its way</h1>\
         <p>Order <strong>{}</strong> is now <strong>{}</strong>.</p>{}<p>{}</p>",
        text(data, "orderNumber"),
        text(data, "status"),
        tracking,
        text(data, "message"),
    )
}

fn order_delivered(data: &Value) -> String {
    format!(
        "<h1 style=\"font-size:20px;\">Your order has been delivered</h1>\
         <p>Order <strong>{}</strong> was delivered{}.</p>\
         <p>If anything is wrong with your delivery you can request a return from your account.</p>",
        text(data, "orderNumber"),
        match data["deliveredAt"].as_str() {
            Some(at) => format!(" on {}", escape(at)),
            None => String::new(),
        },
    )
}

fn return_requested(data: &Value) -> String {
    format!(
        "<h1 style=\"font-size:20px;\">Return requested</h1>\
         <p>A return has been requested for order <strong>{}</strong>.</p>\
         <p>Reason: {}</p><p>Refund amount: &pound;{}</p>",
        text(data, "orderNumber"),
        text(data, "reason"),
        amount(data, "refundAmount"),
    )
}

fn dispute_opened(data: &Value) -> String {
    format!(
        "<h1 style=\"font-size:20px;\">Dispute opened</h1>\
         <p>A dispute (<strong>{}</strong>) has been opened on order <strong>{}</strong>.</p>\
         <p>Reason: {}</p><p>Our team will review it and contact both parties.</p>",
        text(data, "disputeId"),
        text(data, "orderNumber"),
        text(data, "reason"),
    )
}

fn generic(data: &Value) -> String {
    let dump = serde_json::to_string_pretty(data).unwrap_or_default();
    format!("<pre style=\"white-space:pre-wrap;\">{}</pre>", escape(&dump))
}

fn greeting_name(data: &Value) -> String {
    match data["buyerName"].as_str() {
        Some(name) if !name.is_empty() => format!(", {}", escape(name)),
        _ => String::new(),
    }
}

fn address(value: &Value) -> String {
    ["name", "line1", "line2", "city", "postalCode", "country"]
        .iter()
        .filter_map(|key| value[*key].as_str())
        .filter(|part| !part.is_empty())
        .map(escape)
        .collect::<Vec<_>>()
        .join("<br>")
}

fn text(data: &Value, key: &str) -> String {
    match &data[key] {
        Value::String(s) => escape(s),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Numbers may arrive as JSON numbers or decimal strings; anything else is zero.
fn amount(data: &Value, key: &str) -> String {
    let value = match &data[key] {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    };
    money_string(&value.unwrap_or_else(BigDecimal::zero))
}

fn array<'a>(data: &'a Value, key: &str) -> &'a [Value] {
    data[key].as_array().map(Vec::as_slice).unwrap_or(&[])
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Outbox messages ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxKind {
    Email,
    Invoice,
}

impl OutboxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxKind::Email => "email",
            OutboxKind::Invoice => "invoice",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(OutboxKind::Email),
            "invoice" => Some(OutboxKind::Invoice),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailJob {
    pub to: String,
    pub subject: String,
    pub template: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceJob {
    pub order_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewOutboxMessage {
    pub id: Uuid,
    pub kind: OutboxKind,
    pub payload: Value,
}

impl NewOutboxMessage {
    pub fn email(job: &EmailJob) -> Result<Self, DomainError> {
        Ok(Self {
            id: Uuid::new_v4(),
            kind: OutboxKind::Email,
            payload: serde_json::to_value(job).map_err(|e| DomainError::Internal(e.to_string()))?,
        })
    }

    pub fn invoice(order_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: OutboxKind::Invoice,
            payload: serde_json::json!({ "orderId": order_id }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub kind: String,
    pub payload: Value,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn template_identifiers_round_trip() {
        for id in [
            "order_confirmation",
            "order_shipped",
            "order_delivered",
            "return_requested",
            "dispute_opened",
        ] {
            let template = NotificationTemplate::parse(id);
            assert!(!matches!(template, NotificationTemplate::Other(_)), "{id}");
            assert_eq!(template.as_str(), id);
        }
        assert_eq!(
            NotificationTemplate::parse("welcome"),
            NotificationTemplate::Other("welcome".to_string())
        );
    }

    #[test]
    fn confirmation_lists_items_and_totals() {
        let html = render_email(
            &NotificationTemplate::OrderConfirmation,
            &json!({
                "orderNumber": "ORD-1-ABCDEFGHI",
                "items": [{ "title": "Euro pallet", "quantity": 2, "price": "10.00" }],
                "subtotal": "20.00",
                "vatAmount": "4.00",
                "total": 24.0,
                "shippingAddress": { "line1": "1 Dock Road", "city": "Leeds" }
            }),
        );

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Loadify Market"));
        assert!(html.contains("ORD-1-ABCDEFGHI"));
        assert!(html.contains("Euro pallet"));
        assert!(html.contains("Total: &pound;24.00"));
        assert!(html.contains("1 Dock Road<br>Leeds"));
    }

    #[test]
    fn missing_numbers_and_arrays_render_as_zero_and_empty() {
        let html = render_email(&NotificationTemplate::OrderConfirmation, &json!({}));

        assert!(html.contains("Subtotal: &pound;0.00"));
        assert!(html.contains("Total: &pound;0.00"));
        assert!(!html.contains("<td style=\"padding:6px 0;\">"));
    }

    #[test]
    fn amounts_round_half_up_like_stored_totals() {
        assert_eq!(amount(&json!({ "total": "3.005" }), "total"), "3.01");
        assert_eq!(amount(&json!({ "total": 3.005 }), "total"), "3.01");
        assert_eq!(amount(&json!({ "total": 12 }), "total"), "12.00");
        assert_eq!(amount(&json!({ "total": "n/a" }), "total"), "0.00");
        assert_eq!(amount(&json!({ "total": null }), "total"), "0.00");
    }

    #[test]
    fn shipped_mentions_tracking_only_when_present() {
        let with = render_email(
            &NotificationTemplate::OrderShipped,
            &json!({ "orderNumber": "ORD-2", "status": "Dispatched", "trackingNumber": "TRK9", "courierName": "DPD" }),
        );
        let without = render_email(
            &NotificationTemplate::OrderShipped,
            &json!({ "orderNumber": "ORD-2", "status": "Out for Delivery" }),
        );

        assert!(with.contains("TRK9"));
        assert!(with.contains("DPD"));
        assert!(!without.contains("Tracking number"));
        assert!(without.contains("Out for Delivery"));
    }

    #[test]
    fn unknown_template_dumps_json() {
        let html = render_email(
            &NotificationTemplate::Other("welcome".to_string()),
            &json!({ "hello": "<world>" }),
        );

        assert!(html.contains("<pre"));
        assert!(html.contains("&quot;hello&quot;"));
        assert!(html.contains("&lt;world&gt;"));
    }

    #[test]
    fn user_text_is_escaped() {
        let html = render_email(
            &NotificationTemplate::DisputeOpened,
            &json!({ "reason": "<script>alert(1)</script>" }),
        );
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn email_job_becomes_outbox_payload() {
        let job = EmailJob {
            to: "buyer@example.com".to_string(),
            subject: "Hi".to_string(),
            template: "order_shipped".to_string(),
            data: json!({ "orderNumber": "ORD-1" }),
        };
        let message = NewOutboxMessage::email(&job).unwrap();

        assert_eq!(message.kind, OutboxKind::Email);
        let back: EmailJob = serde_json::from_value(message.payload).unwrap();
        assert_eq!(back, job);
    }
}
