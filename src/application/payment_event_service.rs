use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use super::run_blocking;
use crate::domain::errors::DomainError;
use crate::domain::notification::{EmailJob, NewOutboxMessage, NotificationTemplate};
use crate::domain::order::{CheckoutMetadata, ConfirmedOrder, NewPayment, OrderStatus, PostalAddress};
use crate::domain::ports::{
    OrderRepository, PaymentEvent, PaymentEventKind, PaymentProvider, Recorded, UserRepository,
};
use crate::domain::pricing::money_string;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Orders created for a completed checkout.
    OrdersCreated(Vec<String>),
    /// Number of orders moved to refunded.
    Refunded(usize),
    /// The event id was seen before; nothing changed.
    Duplicate,
    /// Event type with no state change.
    Ignored,
}

pub struct PaymentEventService {
    provider: Arc<dyn PaymentProvider>,
    orders: Arc<dyn OrderRepository>,
    users: Arc<dyn UserRepository>,
}

impl PaymentEventService {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        orders: Arc<dyn OrderRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            provider,
            orders,
            users,
        }
    }

    /// Verifies and applies one webhook delivery. Nothing is read or written
    /// before the signature checks out.
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, DomainError> {
        let event = self.provider.parse_webhook(payload, signature)?;
        log::info!("Payment event {} ({}) received", event.id, event.event_type);

        match event.kind.clone() {
            PaymentEventKind::CheckoutCompleted {
                session_id,
                payment_reference,
                customer_email,
                metadata,
                raw,
            } => {
                self.checkout_completed(
                    &event,
                    &session_id,
                    payment_reference,
                    customer_email,
                    &metadata,
                    raw,
                )
                .await
            }
            PaymentEventKind::ChargeRefunded { payment_reference } => {
                self.charge_refunded(&event, payment_reference).await
            }
            PaymentEventKind::Other => {
                log::debug!("Ignoring payment event type {}", event.event_type);
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn checkout_completed(
        &self,
        event: &PaymentEvent,
        session_id: &str,
        payment_reference: String,
        customer_email: Option<String>,
        metadata: &HashMap<String, String>,
        raw: Value,
    ) -> Result<WebhookOutcome, DomainError> {
        let metadata = CheckoutMetadata::from_map(metadata)?;
        let buyer_id = metadata.buyer_id;
        let shipping_address = metadata.shipping_address.clone();

        let users = self.users.clone();
        let buyer = run_blocking(move || users.find_by_id(buyer_id)).await?;
        let buyer_name = buyer.as_ref().and_then(|b| b.full_name.clone());
        let recipient = customer_email.or_else(|| buyer.map(|b| b.email));

        let confirmed = metadata.into_orders(
            session_id,
            NewPayment {
                payment_reference,
                status: OrderStatus::Paid.as_str().to_string(),
                raw_payload: raw,
            },
            Utc::now(),
        )?;

        let mut outbox = Vec::with_capacity(confirmed.len() * 2);
        for order in &confirmed {
            match &recipient {
                Some(to) => outbox.push(confirmation_email(
                    order,
                    to,
                    buyer_name.as_deref(),
                    &shipping_address,
                )?),
                None => log::warn!(
                    "No email address for buyer {}; skipping confirmation for {}",
                    buyer_id,
                    order.order.order_number
                ),
            }
            outbox.push(NewOutboxMessage::invoice(order.order.id));
        }

        let orders = self.orders.clone();
        let receipt = event.receipt();
        let recorded =
            run_blocking(move || orders.record_checkout(&receipt, confirmed, outbox)).await?;

        match recorded {
            Recorded::Applied(created) => {
                let numbers: Vec<String> = created.into_iter().map(|o| o.order_number).collect();
                log::info!(
                    "Checkout session {} confirmed as order(s) {}",
                    session_id,
                    numbers.join(", ")
                );
                Ok(WebhookOutcome::OrdersCreated(numbers))
            }
            Recorded::Duplicate => {
                log::info!("Duplicate payment event {} ignored", event.id);
                Ok(WebhookOutcome::Duplicate)
            }
        }
    }

    async fn charge_refunded(
        &self,
        event: &PaymentEvent,
        payment_reference: String,
    ) -> Result<WebhookOutcome, DomainError> {
        let orders = self.orders.clone();
        let receipt = event.receipt();
        let reference = payment_reference.clone();
        let recorded = run_blocking(move || orders.record_refund(&receipt, &reference)).await?;

        match recorded {
            Recorded::Applied(refunded) if refunded.is_empty() => {
                log::warn!("Refund for unknown payment {payment_reference}");
                Ok(WebhookOutcome::Refunded(0))
            }
            Recorded::Applied(refunded) => {
                for order in &refunded {
                    log::info!("Order {} refunded", order.order_number);
                }
                Ok(WebhookOutcome::Refunded(refunded.len()))
            }
            Recorded::Duplicate => {
                log::info!("Duplicate payment event {} ignored", event.id);
                Ok(WebhookOutcome::Duplicate)
            }
        }
    }
}

fn confirmation_email(
    confirmed: &ConfirmedOrder,
    to: &str,
    buyer_name: Option<&str>,
    shipping_address: &PostalAddress,
) -> Result<NewOutboxMessage, DomainError> {
    let order = &confirmed.order;
    let template = NotificationTemplate::OrderConfirmation;
    let items: Vec<Value> = confirmed
        .items
        .iter()
        .map(|i| {
            json!({
                "title": i.title,
                "quantity": i.quantity,
                "price": money_string(&i.line_total),
            })
        })
        .collect();

    NewOutboxMessage::email(&EmailJob {
        to: to.to_string(),
        subject: template.subject(&order.order_number),
        template: template.as_str().to_string(),
        data: json!({
            "orderId": order.id,
            "orderNumber": order.order_number,
            "buyerName": buyer_name,
            "items": items,
            "subtotal": money_string(&order.totals.subtotal),
            "vatAmount": money_string(&order.totals.vat_amount),
            "total": money_string(&order.totals.total),
            "shippingAddress": shipping_address,
        }),
    })
}
