use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::auth::{Role, UserProfile};
use crate::domain::notification::OutboxMessage;
use crate::domain::order::{Order, OrderItem};
use crate::domain::shipment::{Shipment, ShipmentEvent};
use crate::schema::{
    notification_outbox, order_items, orders, payments, processed_webhook_events, profiles,
    shipment_events, shipments,
};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProfileRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl ProfileRow {
    /// Unknown role values are treated as the least privileged role.
    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            role: Role::parse(&self.role).unwrap_or(Role::Buyer),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfileRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub checkout_session_id: String,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub subtotal: BigDecimal,
    pub vat_amount: BigDecimal,
    pub total: BigDecimal,
    pub commission: BigDecimal,
    pub payment_reference: String,
    pub status: String,
    pub shipping_address: Value,
    pub billing_address: Value,
    pub shipping_method: Option<String>,
    pub shipping_cost: Option<BigDecimal>,
    pub invoice_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            order_number: row.order_number,
            checkout_session_id: row.checkout_session_id,
            buyer_id: row.buyer_id,
            seller_id: row.seller_id,
            subtotal: row.subtotal,
            vat_amount: row.vat_amount,
            total: row.total,
            commission: row.commission,
            payment_reference: row.payment_reference,
            status: row.status,
            shipping_address: row.shipping_address,
            billing_address: row.billing_address,
            shipping_method: row.shipping_method,
            shipping_cost: row.shipping_cost,
            invoice_url: row.invoice_url,
            created_at: row.created_at,
            delivered_at: row.delivered_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub checkout_session_id: String,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub subtotal: BigDecimal,
    pub vat_amount: BigDecimal,
    pub total: BigDecimal,
    pub commission: BigDecimal,
    pub payment_reference: String,
    pub status: String,
    pub shipping_address: Value,
    pub billing_address: Value,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub vat_amount: BigDecimal,
    pub line_total: BigDecimal,
    pub created_at: DateTime<Utc>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            seller_id: row.seller_id,
            title: row.title,
            quantity: row.quantity,
            unit_price: row.unit_price,
            vat_amount: row.vat_amount,
            line_total: row.line_total,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub vat_amount: BigDecimal,
    pub line_total: BigDecimal,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPaymentRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub payment_reference: String,
    pub status: String,
    pub raw_payload: Value,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = processed_webhook_events)]
pub struct NewProcessedEventRow<'a> {
    pub event_id: &'a str,
    pub event_type: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = shipments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ShipmentRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub courier_name: Option<String>,
    pub tracking_number: Option<String>,
    pub status: String,
    pub proof_of_delivery_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ShipmentRow> for Shipment {
    fn from(row: ShipmentRow) -> Self {
        Shipment {
            id: row.id,
            order_id: row.order_id,
            seller_id: row.seller_id,
            buyer_id: row.buyer_id,
            courier_name: row.courier_name,
            tracking_number: row.tracking_number,
            status: row.status,
            proof_of_delivery_url: row.proof_of_delivery_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = shipments)]
pub struct NewShipmentRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub courier_name: Option<String>,
    pub tracking_number: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = shipment_events)]
#[diesel(belongs_to(ShipmentRow, foreign_key = shipment_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ShipmentEventRow {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub status: String,
    pub message: String,
    pub changed_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<ShipmentEventRow> for ShipmentEvent {
    fn from(row: ShipmentEventRow) -> Self {
        ShipmentEvent {
            id: row.id,
            shipment_id: row.shipment_id,
            status: row.status,
            message: row.message,
            changed_by: row.changed_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = shipment_events)]
pub struct NewShipmentEventRow {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub status: String,
    pub message: String,
    pub changed_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = notification_outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxRow {
    pub id: Uuid,
    pub kind: String,
    pub payload: Value,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl From<OutboxRow> for OutboxMessage {
    fn from(row: OutboxRow) -> Self {
        OutboxMessage {
            id: row.id,
            kind: row.kind,
            payload: row.payload,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            next_attempt_at: row.next_attempt_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notification_outbox)]
pub struct NewOutboxRow {
    pub id: Uuid,
    pub kind: String,
    pub payload: Value,
}
