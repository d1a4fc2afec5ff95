use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::notification::NewOutboxMessage;
use crate::domain::order::{ConfirmedOrder, Order, OrderItem, OrderStatus};
use crate::domain::ports::{OrderRepository, Recorded, WebhookReceipt};
use crate::schema::{order_items, orders, payments, processed_webhook_events};

use super::models::{
    NewOrderItemRow, NewOrderRow, NewPaymentRow, NewProcessedEventRow, OrderItemRow, OrderRow,
};
use super::outbox_repo::insert_outbox;

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Returns false when the event id was already recorded.
fn claim_event(conn: &mut PgConnection, receipt: &WebhookReceipt) -> Result<bool, DomainError> {
    let inserted = diesel::insert_into(processed_webhook_events::table)
        .values(&NewProcessedEventRow {
            event_id: &receipt.event_id,
            event_type: &receipt.event_type,
        })
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(inserted == 1)
}

impl OrderRepository for DieselOrderRepository {
    fn record_checkout(
        &self,
        receipt: &WebhookReceipt,
        confirmed: Vec<ConfirmedOrder>,
        outbox: Vec<NewOutboxMessage>,
    ) -> Result<Recorded<Vec<Order>>, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            if !claim_event(conn, receipt)? {
                return Ok(Recorded::Duplicate);
            }

            let mut created = Vec::with_capacity(confirmed.len());
            for ConfirmedOrder {
                order,
                items,
                payment,
            } in confirmed
            {
                // 1. Insert the order
                let row = diesel::insert_into(orders::table)
                    .values(&NewOrderRow {
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
                    })
                    .returning(OrderRow::as_returning())
                    .get_result(conn)?;

                // 2. Insert its items
                let new_items: Vec<NewOrderItemRow> = items
                    .into_iter()
                    .map(|i| NewOrderItemRow {
                        id: Uuid::new_v4(),
                        order_id: row.id,
                        product_id: i.product_id,
                        seller_id: i.seller_id,
                        title: i.title,
                        quantity: i.quantity,
                        unit_price: i.unit_price,
                        vat_amount: i.vat_amount,
                        line_total: i.line_total,
                    })
                    .collect();
                diesel::insert_into(order_items::table)
                    .values(&new_items)
                    .execute(conn)?;

                // 3. Insert the payment record
                diesel::insert_into(payments::table)
                    .values(&NewPaymentRow {
                        id: Uuid::new_v4(),
                        order_id: row.id,
                        payment_reference: payment.payment_reference,
                        status: payment.status,
                        raw_payload: payment.raw_payload,
                    })
                    .execute(conn)?;

                created.push(Order::from(row));
            }

            // 4. Side effects go through the outbox in the same transaction.
            insert_outbox(conn, outbox)?;

            Ok(Recorded::Applied(created))
        })
    }

    fn record_refund(
        &self,
        receipt: &WebhookReceipt,
        payment_reference: &str,
    ) -> Result<Recorded<Vec<Order>>, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            if !claim_event(conn, receipt)? {
                return Ok(Recorded::Duplicate);
            }

            let order_ids: Vec<Uuid> = payments::table
                .filter(payments::payment_reference.eq(payment_reference))
                .select(payments::order_id)
                .load(conn)?;
            if order_ids.is_empty() {
                return Ok(Recorded::Applied(vec![]));
            }

            diesel::update(payments::table.filter(payments::payment_reference.eq(payment_reference)))
                .set(payments::status.eq(OrderStatus::Refunded.as_str()))
                .execute(conn)?;

            let rows = diesel::update(orders::table.filter(orders::id.eq_any(&order_ids)))
                .set((
                    orders::status.eq(OrderStatus::Refunded.as_str()),
                    orders::updated_at.eq(Utc::now()),
                ))
                .returning(OrderRow::as_returning())
                .get_results(conn)?;

            Ok(Recorded::Applied(rows.into_iter().map(Order::from).collect()))
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = orders::table
            .filter(orders::id.eq(id))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Order::from))
    }

    fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = orders::table
            .filter(orders::order_number.eq(order_number))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Order::from))
    }

    fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = order_items::table
            .filter(order_items::order_id.eq(order_id))
            .order(order_items::created_at.asc())
            .select(OrderItemRow::as_select())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    fn set_invoice_url(&self, order_id: Uuid, url: &str) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        let updated = diesel::update(orders::table.filter(orders::id.eq(order_id)))
            .set((orders::invoice_url.eq(url), orders::updated_at.eq(Utc::now())))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(DomainError::not_found("Order not found"));
        }
        Ok(())
    }
}
