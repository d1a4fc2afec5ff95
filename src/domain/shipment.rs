use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::DomainError;
use super::notification::{NewOutboxMessage, NotificationTemplate};
use super::order::OrderStatus;

/// Any valid status may follow any other; callers are trusted with the
/// business judgement, only membership is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShipmentStatus {
    Pending,
    Processing,
    Dispatched,
    InTransit,
    OutForDelivery,
    Delivered,
    Returned,
    DeliveryFailed,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 8] = [
        ShipmentStatus::Pending,
        ShipmentStatus::Processing,
        ShipmentStatus::Dispatched,
        ShipmentStatus::InTransit,
        ShipmentStatus::OutForDelivery,
        ShipmentStatus::Delivered,
        ShipmentStatus::Returned,
        ShipmentStatus::DeliveryFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "Pending",
            ShipmentStatus::Processing => "Processing",
            ShipmentStatus::Dispatched => "Dispatched",
            ShipmentStatus::InTransit => "In Transit",
            ShipmentStatus::OutForDelivery => "Out for Delivery",
            ShipmentStatus::Delivered => "Delivered",
            ShipmentStatus::Returned => "Returned",
            ShipmentStatus::DeliveryFailed => "Delivery Failed",
        }
    }

    /// What a move into this status does to the owning order.
    pub fn order_effect(&self) -> OrderEffect {
        match self {
            ShipmentStatus::Delivered => OrderEffect::MarkDelivered,
            ShipmentStatus::Dispatched | ShipmentStatus::InTransit => OrderEffect::MarkShipped,
            _ => OrderEffect::None,
        }
    }

    /// Template sent to the buyer on a move into this status, if any.
    pub fn notification(&self) -> Option<NotificationTemplate> {
        match self {
            ShipmentStatus::Dispatched | ShipmentStatus::OutForDelivery => {
                Some(NotificationTemplate::OrderShipped)
            }
            ShipmentStatus::Delivered => Some(NotificationTemplate::OrderDelivered),
            _ => None,
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShipmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation("Invalid status"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEffect {
    None,
    MarkShipped,
    MarkDelivered,
}

impl OrderEffect {
    pub fn order_status(&self) -> Option<OrderStatus> {
        match self {
            OrderEffect::None => None,
            OrderEffect::MarkShipped => Some(OrderStatus::Shipped),
            OrderEffect::MarkDelivered => Some(OrderStatus::Delivered),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shipment {
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

#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentEvent {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub status: String,
    pub message: String,
    pub changed_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Create-or-update request for the single shipment of an order.
#[derive(Debug, Clone)]
pub struct ShipmentUpsert {
    pub order_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub courier_name: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_method: Option<String>,
    pub shipping_cost: Option<BigDecimal>,
    pub changed_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub shipment: Shipment,
    pub created: bool,
}

/// Everything a status update writes, applied atomically.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub shipment_id: Uuid,
    pub order_id: Uuid,
    pub status: ShipmentStatus,
    pub message: String,
    pub changed_by: Uuid,
    pub order_effect: OrderEffect,
    pub notification: Option<NewOutboxMessage>,
    pub at: DateTime<Utc>,
}

pub fn default_status_message(status: ShipmentStatus) -> String {
    format!("Status updated to {status}")
}

pub const SHIPMENT_CREATED_MESSAGE: &str = "Shipment created";
pub const PROOF_UPLOADED_MESSAGE: &str = "Proof of delivery uploaded";
