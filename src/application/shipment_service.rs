use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::run_blocking;
use crate::domain::auth::Actor;
use crate::domain::errors::DomainError;
use crate::domain::notification::{EmailJob, NewOutboxMessage, NotificationTemplate};
use crate::domain::order::{Order, OrderItem};
use crate::domain::ports::{
    ObjectStorage, OrderRepository, ShipmentRepository, SignedUpload, UserRepository,
};
use crate::domain::shipment::{
    default_status_message, Shipment, ShipmentEvent, ShipmentStatus, ShipmentUpsert,
    StatusChange, UpsertOutcome,
};

#[derive(Debug, Clone, Default)]
pub struct CreateShipmentCommand {
    pub order_id: Uuid,
    pub courier_name: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_method: Option<String>,
    pub shipping_cost: Option<BigDecimal>,
}

#[derive(Debug, Clone, Default)]
pub struct TrackingQuery {
    pub order_number: Option<String>,
    pub order_id: Option<Uuid>,
    /// When given, must match the buyer's email (case-insensitive).
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrackingView {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub shipment: Option<Shipment>,
    /// Oldest first.
    pub events: Vec<ShipmentEvent>,
}

pub struct ShipmentService {
    orders: Arc<dyn OrderRepository>,
    shipments: Arc<dyn ShipmentRepository>,
    users: Arc<dyn UserRepository>,
    storage: Arc<dyn ObjectStorage>,
    proof_bucket: String,
}

impl ShipmentService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        shipments: Arc<dyn ShipmentRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn ObjectStorage>,
        proof_bucket: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            shipments,
            users,
            storage,
            proof_bucket: proof_bucket.into(),
        }
    }

    /// Creates the order's shipment, or updates courier and tracking on the
    /// existing one. `created` tells the two apart.
    pub async fn create_or_update(
        &self,
        actor: &Actor,
        command: CreateShipmentCommand,
    ) -> Result<UpsertOutcome, DomainError> {
        actor.require_fulfilment_role()?;
        let order = self.load_order(command.order_id).await?;
        actor.ensure_owns(order.seller_id)?;

        let shipments = self.shipments.clone();
        let upsert = ShipmentUpsert {
            order_id: order.id,
            seller_id: order.seller_id,
            buyer_id: order.buyer_id,
            courier_name: command.courier_name,
            tracking_number: command.tracking_number,
            shipping_method: command.shipping_method,
            shipping_cost: command.shipping_cost,
            changed_by: actor.user_id,
        };
        let outcome = run_blocking(move || shipments.upsert(upsert)).await?;

        log::info!(
            "Shipment {} {} for order {}",
            outcome.shipment.id,
            if outcome.created { "created" } else { "updated" },
            order.order_number
        );
        Ok(outcome)
    }

    /// Moves a shipment to `status`. The status is validated before anything
    /// is read; the shipment write, its event, the order effect and the buyer
    /// notification are committed together.
    pub async fn update_status(
        &self,
        actor: &Actor,
        shipment_id: Uuid,
        status: &str,
        message: Option<String>,
    ) -> Result<Shipment, DomainError> {
        let status: ShipmentStatus = status.parse()?;
        actor.require_fulfilment_role()?;
        let shipment = self.load_shipment(shipment_id).await?;
        actor.ensure_owns(shipment.seller_id)?;

        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_status_message(status));
        let now = Utc::now();

        let notification = match status.notification() {
            Some(template) => {
                match self
                    .buyer_notification(&shipment, template, status, &message, now)
                    .await
                {
                    Ok(notification) => notification,
                    Err(e) => {
                        log::warn!(
                            "Notification for shipment {} skipped: {}",
                            shipment.id,
                            e
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let change = StatusChange {
            shipment_id: shipment.id,
            order_id: shipment.order_id,
            status,
            message,
            changed_by: actor.user_id,
            order_effect: status.order_effect(),
            notification,
            at: now,
        };
        let shipments = self.shipments.clone();
        let updated = run_blocking(move || shipments.apply_status_change(change)).await?;

        log::info!("Shipment {} moved to {}", updated.id, status);
        Ok(updated)
    }

    /// First phase of proof of delivery: a signed upload target under the
    /// shipment's own storage prefix.
    pub async fn request_proof_upload(
        &self,
        actor: &Actor,
        shipment_id: Uuid,
        file_name: &str,
    ) -> Result<SignedUpload, DomainError> {
        actor.require_fulfilment_role()?;
        let shipment = self.load_shipment(shipment_id).await?;
        actor.ensure_owns(shipment.seller_id)?;

        let path = format!(
            "{}/{}-{}",
            shipment.id,
            Utc::now().timestamp_millis(),
            sanitize_file_name(file_name)
        );
        self.storage
            .create_signed_upload(&self.proof_bucket, &path)
            .await
    }

    /// Second phase: records the public URL of the uploaded object.
    pub async fn confirm_proof_upload(
        &self,
        actor: &Actor,
        shipment_id: Uuid,
        path: &str,
    ) -> Result<Shipment, DomainError> {
        actor.require_fulfilment_role()?;
        let shipment = self.load_shipment(shipment_id).await?;
        actor.ensure_owns(shipment.seller_id)?;

        let prefix = format!("{}/", shipment.id);
        if !path.starts_with(&prefix) || path.len() == prefix.len() || path.contains("..") {
            return Err(DomainError::validation("Invalid proof of delivery path"));
        }

        let url = self.storage.public_url(&self.proof_bucket, path);
        let shipments = self.shipments.clone();
        let changed_by = actor.user_id;
        let updated = run_blocking(move || shipments.attach_proof(shipment_id, &url, changed_by))
            .await?;

        log::info!("Proof of delivery stored for shipment {}", updated.id);
        Ok(updated)
    }

    /// Public lookup by order number or id, optionally cross-checked
    /// against the buyer's email.
    pub async fn track(&self, query: TrackingQuery) -> Result<TrackingView, DomainError> {
        let orders = self.orders.clone();
        let order = match (query.order_number, query.order_id) {
            (Some(number), _) if !number.trim().is_empty() => {
                run_blocking(move || orders.find_by_number(number.trim())).await?
            }
            (_, Some(id)) => run_blocking(move || orders.find_by_id(id)).await?,
            _ => return Err(DomainError::validation("orderNumber or orderId is required")),
        }
        .ok_or_else(|| DomainError::not_found("Order not found"))?;

        if let Some(email) = query.email.filter(|e| !e.trim().is_empty()) {
            let users = self.users.clone();
            let buyer_id = order.buyer_id;
            let buyer = run_blocking(move || users.find_by_id(buyer_id)).await?;
            let matches = buyer
                .map(|b| b.email.eq_ignore_ascii_case(email.trim()))
                .unwrap_or(false);
            if !matches {
                return Err(DomainError::forbidden("Access denied"));
            }
        }

        let orders = self.orders.clone();
        let shipments = self.shipments.clone();
        let order_id = order.id;
        let (items, shipment, events) = run_blocking(move || {
            let items = orders.items(order_id)?;
            let shipment = shipments.find_by_order(order_id)?;
            let events = match &shipment {
                Some(s) => shipments.events(s.id)?,
                None => Vec::new(),
            };
            Ok((items, shipment, events))
        })
        .await?;

        Ok(TrackingView {
            order,
            items,
            shipment,
            events,
        })
    }

    async fn load_order(&self, id: Uuid) -> Result<Order, DomainError> {
        let orders = self.orders.clone();
        run_blocking(move || orders.find_by_id(id))
            .await?
            .ok_or_else(|| DomainError::not_found("Order not found"))
    }

    async fn load_shipment(&self, id: Uuid) -> Result<Shipment, DomainError> {
        let shipments = self.shipments.clone();
        run_blocking(move || shipments.find_by_id(id))
            .await?
            .ok_or_else(|| DomainError::not_found("Shipment not found"))
    }

    async fn buyer_notification(
        &self,
        shipment: &Shipment,
        template: NotificationTemplate,
        status: ShipmentStatus,
        message: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<Option<NewOutboxMessage>, DomainError> {
        let order = self.load_order(shipment.order_id).await?;
        let users = self.users.clone();
        let buyer_id = shipment.buyer_id;
        let Some(buyer) = run_blocking(move || users.find_by_id(buyer_id)).await? else {
            log::warn!("Buyer {} of order {} has no profile", buyer_id, order.order_number);
            return Ok(None);
        };

        let delivered_at = (status == ShipmentStatus::Delivered).then(|| now.to_rfc3339());
        let job = EmailJob {
            to: buyer.email,
            subject: template.subject(&order.order_number),
            template: template.as_str().to_string(),
            data: json!({
                "orderId": order.id,
                "orderNumber": order.order_number,
                "buyerName": buyer.full_name,
                "status": status.as_str(),
                "message": message,
                "courierName": shipment.courier_name,
                "trackingNumber": shipment.tracking_number,
                "deliveredAt": delivered_at,
            }),
        };
        NewOutboxMessage::email(&job).map(Some)
    }
}

fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "proof".to_string()
    } else {
        cleaned.to_string()
    }
}
