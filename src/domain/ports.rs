use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::auth::UserProfile;
use super::errors::DomainError;
use super::notification::{NewOutboxMessage, OutboxMessage};
use super::order::{ConfirmedOrder, Order, OrderItem};
use super::shipment::{Shipment, ShipmentEvent, ShipmentUpsert, StatusChange, UpsertOutcome};

/// Provider event being applied; its id is the idempotency key.
#[derive(Debug, Clone)]
pub struct WebhookReceipt {
    pub event_id: String,
    pub event_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded<T> {
    Applied(T),
    /// The event id was already processed; nothing was written.
    Duplicate,
}

pub trait OrderRepository: Send + Sync + 'static {
    /// Writes the idempotency marker, every order with its items and payment,
    /// and the outbox messages in one transaction.
    fn record_checkout(
        &self,
        receipt: &WebhookReceipt,
        orders: Vec<ConfirmedOrder>,
        outbox: Vec<NewOutboxMessage>,
    ) -> Result<Recorded<Vec<Order>>, DomainError>;

    /// Marks payments and orders carrying `payment_reference` as refunded.
    fn record_refund(
        &self,
        receipt: &WebhookReceipt,
        payment_reference: &str,
    ) -> Result<Recorded<Vec<Order>>, DomainError>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError>;
    fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, DomainError>;
    fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, DomainError>;
    fn set_invoice_url(&self, order_id: Uuid, url: &str) -> Result<(), DomainError>;
}

pub trait ShipmentRepository: Send + Sync + 'static {
    fn find_by_id(&self, id: Uuid) -> Result<Option<Shipment>, DomainError>;
    fn find_by_order(&self, order_id: Uuid) -> Result<Option<Shipment>, DomainError>;

    /// Inserts the shipment (with its creation event) or updates courier and
    /// tracking fields of the existing one.
    fn upsert(&self, upsert: ShipmentUpsert) -> Result<UpsertOutcome, DomainError>;

    fn apply_status_change(&self, change: StatusChange) -> Result<Shipment, DomainError>;

    fn attach_proof(
        &self,
        shipment_id: Uuid,
        url: &str,
        changed_by: Uuid,
    ) -> Result<Shipment, DomainError>;

    /// Events ordered by `created_at` ascending.
    fn events(&self, shipment_id: Uuid) -> Result<Vec<ShipmentEvent>, DomainError>;
}

pub trait OutboxRepository: Send + Sync + 'static {
    fn enqueue(&self, messages: Vec<NewOutboxMessage>) -> Result<(), DomainError>;

    /// Returns due messages and pushes their `next_attempt_at` to `lease_until`
    /// so concurrent dispatchers skip them.
    fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, DomainError>;

    fn mark_processed(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DomainError>;

    fn mark_retry(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    fn mark_failed(&self, id: Uuid, error: &str, at: DateTime<Utc>) -> Result<(), DomainError>;
}

pub trait UserRepository: Send + Sync + 'static {
    fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, DomainError>;
}

// ── External services ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderLineItem {
    pub name: String,
    /// Minor currency units.
    pub unit_amount: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub client_reference_id: String,
    pub customer_email: Option<String>,
    pub line_items: Vec<ProviderLineItem>,
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// A verified provider callback, reduced to what the order lifecycle consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEvent {
    pub id: String,
    pub event_type: String,
    pub kind: PaymentEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEventKind {
    CheckoutCompleted {
        session_id: String,
        /// Payment intent id, or the session id when the provider sent none.
        payment_reference: String,
        customer_email: Option<String>,
        metadata: HashMap<String, String>,
        raw: Value,
    },
    ChargeRefunded {
        payment_reference: String,
    },
    /// Logged only.
    Other,
}

impl PaymentEvent {
    pub fn receipt(&self) -> WebhookReceipt {
        WebhookReceipt {
            event_id: self.id.clone(),
            event_type: self.event_type.clone(),
        }
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync + 'static {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, DomainError>;

    /// Verifies `signature` against the raw body, then decodes the event.
    /// Any verification failure is a validation error.
    fn parse_webhook(&self, payload: &[u8], signature: &str) -> Result<PaymentEvent, DomainError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: OutgoingEmail) -> Result<(), DomainError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignedUpload {
    pub signed_url: String,
    pub token: String,
    pub path: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    /// Short-lived upload target for `bucket/path`.
    async fn create_signed_upload(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<SignedUpload, DomainError>;

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), DomainError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}
