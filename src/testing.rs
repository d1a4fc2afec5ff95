//! In-memory adapters for every port, used by service and HTTP tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::auth::{Role, UserProfile};
use crate::domain::errors::DomainError;
use crate::domain::notification::{NewOutboxMessage, OutboxMessage};
use crate::domain::order::{ConfirmedOrder, Order, OrderItem, OrderStatus};
use crate::domain::ports::{
    CheckoutSession, CheckoutSessionRequest, Mailer, ObjectStorage, OrderRepository,
    OutboxRepository, OutgoingEmail, PaymentEvent, PaymentProvider, Recorded, ShipmentRepository,
    SignedUpload, UserRepository, WebhookReceipt,
};
use crate::domain::shipment::{
    OrderEffect, Shipment, ShipmentEvent, ShipmentStatus, ShipmentUpsert, StatusChange,
    UpsertOutcome, PROOF_UPLOADED_MESSAGE, SHIPMENT_CREATED_MESSAGE,
};
use crate::infrastructure::stripe;

pub const WEBHOOK_SECRET: &str = "whsec_test";

#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub order_id: Uuid,
    pub payment_reference: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub message: OutboxMessage,
    pub processed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct Tables {
    pub profiles: Vec<UserProfile>,
    pub orders: Vec<Order>,
    pub items: Vec<OrderItem>,
    pub payments: Vec<PaymentRecord>,
    pub processed_events: HashSet<String>,
    pub shipments: Vec<Shipment>,
    pub events: Vec<ShipmentEvent>,
    pub outbox: Vec<OutboxEntry>,
}

/// One store implementing every repository port, so writes that span
/// tables (orders + outbox, shipments + orders) land in the same place.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("store poisoned")
    }

    pub fn add_profile(&self, role: Role, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tables().profiles.push(UserProfile {
            id,
            email: email.to_string(),
            full_name: Some(format!("{} user", role.as_str())),
            role,
        });
        id
    }

    pub fn order(&self, id: Uuid) -> Order {
        self.tables()
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .expect("order missing")
    }

    pub fn outbox_messages(&self) -> Vec<OutboxMessage> {
        self.tables()
            .outbox
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }
}

fn to_outbox_entry(message: NewOutboxMessage, now: DateTime<Utc>) -> OutboxEntry {
    OutboxEntry {
        message: OutboxMessage {
            id: message.id,
            kind: message.kind.as_str().to_string(),
            payload: message.payload,
            attempts: 0,
            last_error: None,
            created_at: now,
            next_attempt_at: now,
        },
        processed_at: None,
        failed_at: None,
    }
}

impl OrderRepository for MemoryStore {
    fn record_checkout(
        &self,
        receipt: &WebhookReceipt,
        orders: Vec<ConfirmedOrder>,
        outbox: Vec<NewOutboxMessage>,
    ) -> Result<Recorded<Vec<Order>>, DomainError> {
        let mut t = self.tables();
        if !t.processed_events.insert(receipt.event_id.clone()) {
            return Ok(Recorded::Duplicate);
        }

        let now = Utc::now();
        let mut created = Vec::new();
        for ConfirmedOrder {
            order,
            items,
            payment,
        } in orders
        {
            let row = Order {
                id: order.id,
                order_number: order.order_number,
                checkout_session_id: order.checkout_session_id,
                buyer_id: order.buyer_id,
                seller_id: order.seller_id,
                subtotal: order.totals.subtotal,
                vat_amount: order.totals.vat_amount,
                total: order.totals.total,
                commission: order.totals.commission,
                payment_reference: order.payment_reference,
                status: OrderStatus::Paid.as_str().to_string(),
                shipping_address: order.shipping_address,
                billing_address: order.billing_address,
                shipping_method: None,
                shipping_cost: None,
                invoice_url: None,
                created_at: now,
                delivered_at: None,
            };
            for item in items {
                t.items.push(OrderItem {
                    id: Uuid::new_v4(),
                    order_id: row.id,
                    product_id: item.product_id,
                    seller_id: item.seller_id,
                    title: item.title,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    vat_amount: item.vat_amount,
                    line_total: item.line_total,
                });
            }
            t.payments.push(PaymentRecord {
                order_id: row.id,
                payment_reference: payment.payment_reference,
                status: payment.status,
            });
            t.orders.push(row.clone());
            created.push(row);
        }
        t.outbox
            .extend(outbox.into_iter().map(|m| to_outbox_entry(m, now)));

        Ok(Recorded::Applied(created))
    }

    fn record_refund(
        &self,
        receipt: &WebhookReceipt,
        payment_reference: &str,
    ) -> Result<Recorded<Vec<Order>>, DomainError> {
        let mut t = self.tables();
        if !t.processed_events.insert(receipt.event_id.clone()) {
            return Ok(Recorded::Duplicate);
        }

        let mut order_ids = Vec::new();
        for payment in t
            .payments
            .iter_mut()
            .filter(|p| p.payment_reference == payment_reference)
        {
            payment.status = OrderStatus::Refunded.as_str().to_string();
            order_ids.push(payment.order_id);
        }
        let mut refunded = Vec::new();
        for order in t.orders.iter_mut().filter(|o| order_ids.contains(&o.id)) {
            order.status = OrderStatus::Refunded.as_str().to_string();
            refunded.push(order.clone());
        }
        Ok(Recorded::Applied(refunded))
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        Ok(self.tables().orders.iter().find(|o| o.id == id).cloned())
    }

    fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, DomainError> {
        Ok(self
            .tables()
            .orders
            .iter()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, DomainError> {
        Ok(self
            .tables()
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    fn set_invoice_url(&self, order_id: Uuid, url: &str) -> Result<(), DomainError> {
        let mut t = self.tables();
        let order = t
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| DomainError::not_found("Order not found"))?;
        order.invoice_url = Some(url.to_string());
        Ok(())
    }
}

impl ShipmentRepository for MemoryStore {
    fn find_by_id(&self, id: Uuid) -> Result<Option<Shipment>, DomainError> {
        Ok(self.tables().shipments.iter().find(|s| s.id == id).cloned())
    }

    fn find_by_order(&self, order_id: Uuid) -> Result<Option<Shipment>, DomainError> {
        Ok(self
            .tables()
            .shipments
            .iter()
            .find(|s| s.order_id == order_id)
            .cloned())
    }

    fn upsert(&self, upsert: ShipmentUpsert) -> Result<UpsertOutcome, DomainError> {
        let mut t = self.tables();
        let now = Utc::now();

        let outcome = match t.shipments.iter().position(|s| s.order_id == upsert.order_id) {
            Some(index) => {
                let existing = &mut t.shipments[index];
                if upsert.courier_name.is_some() {
                    existing.courier_name = upsert.courier_name.clone();
                }
                if upsert.tracking_number.is_some() {
                    existing.tracking_number = upsert.tracking_number.clone();
                }
                existing.updated_at = now;
                UpsertOutcome {
                    shipment: existing.clone(),
                    created: false,
                }
            }
            None => {
                let shipment = Shipment {
                    id: Uuid::new_v4(),
                    order_id: upsert.order_id,
                    seller_id: upsert.seller_id,
                    buyer_id: upsert.buyer_id,
                    courier_name: upsert.courier_name.clone(),
                    tracking_number: upsert.tracking_number.clone(),
                    status: ShipmentStatus::Pending.as_str().to_string(),
                    proof_of_delivery_url: None,
                    created_at: now,
                    updated_at: now,
                };
                t.shipments.push(shipment.clone());
                t.events.push(ShipmentEvent {
                    id: Uuid::new_v4(),
                    shipment_id: shipment.id,
                    status: ShipmentStatus::Pending.as_str().to_string(),
                    message: SHIPMENT_CREATED_MESSAGE.to_string(),
                    changed_by: upsert.changed_by,
                    created_at: now,
                });
                UpsertOutcome {
                    shipment,
                    created: true,
                }
            }
        };

        if let Some(order) = t.orders.iter_mut().find(|o| o.id == upsert.order_id) {
            if upsert.shipping_method.is_some() {
                order.shipping_method = upsert.shipping_method.clone();
            }
            if upsert.shipping_cost.is_some() {
                order.shipping_cost = upsert.shipping_cost.clone();
            }
        }
        Ok(outcome)
    }

    fn apply_status_change(&self, change: StatusChange) -> Result<Shipment, DomainError> {
        let mut t = self.tables();
        let shipment = t
            .shipments
            .iter_mut()
            .find(|s| s.id == change.shipment_id)
            .ok_or_else(|| DomainError::not_found("Shipment not found"))?;
        shipment.status = change.status.as_str().to_string();
        shipment.updated_at = change.at;
        let shipment = shipment.clone();

        t.events.push(ShipmentEvent {
            id: Uuid::new_v4(),
            shipment_id: shipment.id,
            status: change.status.as_str().to_string(),
            message: change.message.clone(),
            changed_by: change.changed_by,
            created_at: change.at,
        });

        if let Some(status) = change.order_effect.order_status() {
            if let Some(order) = t.orders.iter_mut().find(|o| o.id == change.order_id) {
                order.status = status.as_str().to_string();
                if change.order_effect == OrderEffect::MarkDelivered {
                    order.delivered_at = Some(change.at);
                }
            }
        }
        if let Some(message) = change.notification {
            t.outbox.push(to_outbox_entry(message, change.at));
        }
        Ok(shipment)
    }

    fn attach_proof(
        &self,
        shipment_id: Uuid,
        url: &str,
        changed_by: Uuid,
    ) -> Result<Shipment, DomainError> {
        let mut t = self.tables();
        let now = Utc::now();
        let shipment = t
            .shipments
            .iter_mut()
            .find(|s| s.id == shipment_id)
            .ok_or_else(|| DomainError::not_found("Shipment not found"))?;
        shipment.proof_of_delivery_url = Some(url.to_string());
        shipment.updated_at = now;
        let shipment = shipment.clone();

        t.events.push(ShipmentEvent {
            id: Uuid::new_v4(),
            shipment_id,
            status: shipment.status.clone(),
            message: PROOF_UPLOADED_MESSAGE.to_string(),
            changed_by,
            created_at: now,
        });
        Ok(shipment)
    }

    fn events(&self, shipment_id: Uuid) -> Result<Vec<ShipmentEvent>, DomainError> {
        let mut events: Vec<ShipmentEvent> = self
            .tables()
            .events
            .iter()
            .filter(|e| e.shipment_id == shipment_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }
}

impl OutboxRepository for MemoryStore {
    fn enqueue(&self, messages: Vec<NewOutboxMessage>) -> Result<(), DomainError> {
        let now = Utc::now();
        self.tables()
            .outbox
            .extend(messages.into_iter().map(|m| to_outbox_entry(m, now)));
        Ok(())
    }

    fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, DomainError> {
        let mut t = self.tables();
        let mut claimed = Vec::new();
        for entry in t.outbox.iter_mut().filter(|e| {
            e.processed_at.is_none() && e.failed_at.is_none() && e.message.next_attempt_at <= now
        }) {
            if claimed.len() as i64 >= limit {
                break;
            }
            claimed.push(entry.message.clone());
            entry.message.next_attempt_at = lease_until;
        }
        Ok(claimed)
    }

    fn mark_processed(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut t = self.tables();
        if let Some(entry) = t.outbox.iter_mut().find(|e| e.message.id == id) {
            entry.message.attempts += 1;
            entry.processed_at = Some(at);
        }
        Ok(())
    }

    fn mark_retry(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut t = self.tables();
        if let Some(entry) = t.outbox.iter_mut().find(|e| e.message.id == id) {
            entry.message.attempts += 1;
            entry.message.last_error = Some(error.to_string());
            entry.message.next_attempt_at = next_attempt_at;
        }
        Ok(())
    }

    fn mark_failed(&self, id: Uuid, error: &str, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut t = self.tables();
        if let Some(entry) = t.outbox.iter_mut().find(|e| e.message.id == id) {
            entry.message.attempts += 1;
            entry.message.last_error = Some(error.to_string());
            entry.failed_at = Some(at);
        }
        Ok(())
    }
}

impl UserRepository for MemoryStore {
    fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, DomainError> {
        Ok(self.tables().profiles.iter().find(|p| p.id == id).cloned())
    }
}

// ── External services ────────────────────────────────────────────────────────

/// Records checkout requests; verifies webhooks with the real Stripe signature scheme.
#[derive(Default)]
pub struct FakePaymentProvider {
    pub requests: Mutex<Vec<CheckoutSessionRequest>>,
    pub fail: AtomicBool,
}

impl FakePaymentProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, DomainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::Upstream("card network unavailable".to_string()));
        }
        self.requests.lock().expect("poisoned").push(request);
        Ok(CheckoutSession {
            id: "cs_test_123".to_string(),
            url: "https://checkout.test/pay/cs_test_123".to_string(),
        })
    }

    fn parse_webhook(&self, payload: &[u8], signature: &str) -> Result<PaymentEvent, DomainError> {
        stripe::verify_webhook_signature(
            payload,
            signature,
            WEBHOOK_SECRET,
            Utc::now().timestamp(),
            300,
        )?;
        stripe::parse_event(payload)
    }
}

/// Header for `payload` signed now with [`WEBHOOK_SECRET`].
pub fn sign(payload: &[u8]) -> String {
    stripe::sign_payload(payload, WEBHOOK_SECRET, Utc::now().timestamp())
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub fail: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), DomainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::Upstream("mail service down".to_string()));
        }
        self.sent.lock().expect("poisoned").push(email);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bucket: String,
    pub path: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<Vec<StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn create_signed_upload(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<SignedUpload, DomainError> {
        Ok(SignedUpload {
            signed_url: format!("https://storage.test/upload/{bucket}/{path}?token=tok"),
            token: "tok".to_string(),
            path: path.to_string(),
        })
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), DomainError> {
        self.objects.lock().expect("poisoned").push(StoredObject {
            bucket: bucket.to_string(),
            path: path.to_string(),
            content_type: content_type.to_string(),
            body,
        });
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://storage.test/public/{bucket}/{path}")
    }
}
