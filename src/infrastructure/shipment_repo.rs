use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::OrderStatus;
use crate::domain::ports::ShipmentRepository;
use crate::domain::shipment::{
    OrderEffect, Shipment, ShipmentEvent, ShipmentStatus, ShipmentUpsert, StatusChange,
    UpsertOutcome, PROOF_UPLOADED_MESSAGE, SHIPMENT_CREATED_MESSAGE,
};
use crate::schema::{orders, shipment_events, shipments};

use super::models::{NewShipmentEventRow, NewShipmentRow, ShipmentEventRow, ShipmentRow};
use super::outbox_repo::insert_outbox;

pub struct DieselShipmentRepository {
    pool: DbPool,
}

impl DieselShipmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn append_event(conn: &mut PgConnection, event: NewShipmentEventRow) -> Result<(), DomainError> {
    diesel::insert_into(shipment_events::table)
        .values(&event)
        .execute(conn)?;
    Ok(())
}

impl ShipmentRepository for DieselShipmentRepository {
    fn find_by_id(&self, id: Uuid) -> Result<Option<Shipment>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = shipments::table
            .filter(shipments::id.eq(id))
            .select(ShipmentRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Shipment::from))
    }

    fn find_by_order(&self, order_id: Uuid) -> Result<Option<Shipment>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = shipments::table
            .filter(shipments::order_id.eq(order_id))
            .select(ShipmentRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Shipment::from))
    }

    fn upsert(&self, upsert: ShipmentUpsert) -> Result<UpsertOutcome, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let now = Utc::now();
            // A concurrent first insert for the same order waits here and then
            // falls through to the update branch.
            let inserted = diesel::insert_into(shipments::table)
                .values(&NewShipmentRow {
                    id: Uuid::new_v4(),
                    order_id: upsert.order_id,
                    seller_id: upsert.seller_id,
                    buyer_id: upsert.buyer_id,
                    courier_name: upsert.courier_name.clone(),
                    tracking_number: upsert.tracking_number.clone(),
                    status: ShipmentStatus::Pending.as_str().to_string(),
                    created_at: now,
                    updated_at: now,
                })
                .on_conflict(shipments::order_id)
                .do_nothing()
                .returning(ShipmentRow::as_returning())
                .get_result(conn)
                .optional()?;

            let outcome = match inserted {
                Some(row) => {
                    append_event(
                        conn,
                        NewShipmentEventRow {
                            id: Uuid::new_v4(),
                            shipment_id: row.id,
                            status: ShipmentStatus::Pending.as_str().to_string(),
                            message: SHIPMENT_CREATED_MESSAGE.to_string(),
                            changed_by: upsert.changed_by,
                            created_at: now,
                        },
                    )?;
                    UpsertOutcome {
                        shipment: row.into(),
                        created: true,
                    }
                }
                // Only courier and tracking change; status is owned by status updates.
                None => {
                    let row = shipments::table
                        .filter(shipments::order_id.eq(upsert.order_id))
                        .select(ShipmentRow::as_select())
                        .for_update()
                        .first(conn)?;
                    let updated = diesel::update(shipments::table.find(row.id))
                        .set((
                            shipments::courier_name.eq(upsert.courier_name.clone().or(row.courier_name)),
                            shipments::tracking_number
                                .eq(upsert.tracking_number.clone().or(row.tracking_number)),
                            shipments::updated_at.eq(now),
                        ))
                        .returning(ShipmentRow::as_returning())
                        .get_result(conn)?;
                    UpsertOutcome {
                        shipment: updated.into(),
                        created: false,
                    }
                }
            };

            if let Some(method) = &upsert.shipping_method {
                diesel::update(orders::table.find(upsert.order_id))
                    .set(orders::shipping_method.eq(method))
                    .execute(conn)?;
            }
            if let Some(cost) = &upsert.shipping_cost {
                diesel::update(orders::table.find(upsert.order_id))
                    .set(orders::shipping_cost.eq(cost))
                    .execute(conn)?;
            }

            Ok(outcome)
        })
    }

    fn apply_status_change(&self, change: StatusChange) -> Result<Shipment, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            // 1. Move the shipment
            let row = diesel::update(shipments::table.find(change.shipment_id))
                .set((
                    shipments::status.eq(change.status.as_str()),
                    shipments::updated_at.eq(change.at),
                ))
                .returning(ShipmentRow::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| DomainError::not_found("Shipment not found"))?;

            // 2. Audit trail
            append_event(
                conn,
                NewShipmentEventRow {
                    id: Uuid::new_v4(),
                    shipment_id: row.id,
                    status: change.status.as_str().to_string(),
                    message: change.message.clone(),
                    changed_by: change.changed_by,
                    created_at: change.at,
                },
            )?;

            // 3. Order status follows selected shipment states
            match change.order_effect {
                OrderEffect::MarkDelivered => {
                    diesel::update(orders::table.find(change.order_id))
                        .set((
                            orders::status.eq(OrderStatus::Delivered.as_str()),
                            orders::delivered_at.eq(change.at),
                            orders::updated_at.eq(change.at),
                        ))
                        .execute(conn)?;
                }
                OrderEffect::MarkShipped => {
                    diesel::update(orders::table.find(change.order_id))
                        .set((
                            orders::status.eq(OrderStatus::Shipped.as_str()),
                            orders::updated_at.eq(change.at),
                        ))
                        .execute(conn)?;
                }
                OrderEffect::None => {}
            }

            // 4. Buyer notification, delivered later by the dispatcher
            if let Some(message) = change.notification {
                insert_outbox(conn, vec![message])?;
            }

            Ok(row.into())
        })
    }

    fn attach_proof(
        &self,
        shipment_id: Uuid,
        url: &str,
        changed_by: Uuid,
    ) -> Result<Shipment, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let now = Utc::now();
            let row = diesel::update(shipments::table.find(shipment_id))
                .set((
                    shipments::proof_of_delivery_url.eq(url),
                    shipments::updated_at.eq(now),
                ))
                .returning(ShipmentRow::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| DomainError::not_found("Shipment not found"))?;

            append_event(
                conn,
                NewShipmentEventRow {
                    id: Uuid::new_v4(),
                    shipment_id,
                    status: row.status.clone(),
                    message: PROOF_UPLOADED_MESSAGE.to_string(),
                    changed_by,
                    created_at: now,
                },
            )?;

            Ok(row.into())
        })
    }

    fn events(&self, shipment_id: Uuid) -> Result<Vec<ShipmentEvent>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = shipment_events::table
            .filter(shipment_events::shipment_id.eq(shipment_id))
            .order((shipment_events::created_at.asc(), shipment_events::id.asc()))
            .select(ShipmentEventRow::as_select())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(ShipmentEvent::from).collect())
    }
}
