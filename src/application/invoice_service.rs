use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::run_blocking;
use crate::domain::errors::DomainError;
use crate::domain::invoice::{invoice_number, render_invoice, InvoiceParty, CONTENT_TYPE};
use crate::domain::ports::{ObjectStorage, OrderRepository, UserRepository};

#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub invoice_number: String,
    pub url: String,
}

pub struct InvoiceService {
    orders: Arc<dyn OrderRepository>,
    users: Arc<dyn UserRepository>,
    storage: Arc<dyn ObjectStorage>,
    bucket: String,
}

impl InvoiceService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn ObjectStorage>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            users,
            storage,
            bucket: bucket.into(),
        }
    }

    /// Renders, stores and links the invoice of one order. Running it again
    /// overwrites the same object.
    pub async fn generate(&self, order_id: Uuid) -> Result<Invoice, DomainError> {
        let orders = self.orders.clone();
        let users = self.users.clone();
        let (order, items, seller, buyer) = run_blocking(move || {
            let order = orders
                .find_by_id(order_id)?
                .ok_or_else(|| DomainError::not_found("Order not found"))?;
            let items = orders.items(order_id)?;
            let seller = users.find_by_id(order.seller_id)?;
            let buyer = users.find_by_id(order.buyer_id)?;
            Ok((order, items, seller, buyer))
        })
        .await?;

        let number = invoice_number(&order.order_number);
        let pdf = render_invoice(
            &number,
            &order,
            &items,
            &InvoiceParty {
                name: seller.as_ref().and_then(|s| s.full_name.as_deref()),
                email: seller.as_ref().map(|s| s.email.as_str()),
            },
            &InvoiceParty {
                name: buyer.as_ref().and_then(|b| b.full_name.as_deref()),
                email: buyer.as_ref().map(|b| b.email.as_str()),
            },
            Utc::now(),
        )?;

        let path = format!("{}/{}.pdf", order.id, number);
        self.storage
            .upload(&self.bucket, &path, CONTENT_TYPE, pdf)
            .await?;
        let url = self.storage.public_url(&self.bucket, &path);

        let orders = self.orders.clone();
        let link = url.clone();
        run_blocking(move || orders.set_invoice_url(order_id, &link)).await?;

        log::info!("Invoice {} stored for order {}", number, order.order_number);
        Ok(Invoice {
            invoice_number: number,
            url,
        })
    }
}
