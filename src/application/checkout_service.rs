use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{CartItem, CheckoutMetadata, PostalAddress};
use crate::domain::ports::{CheckoutSession, CheckoutSessionRequest, PaymentProvider, ProviderLineItem};
use crate::domain::pricing::{self, Totals};

#[derive(Debug, Clone)]
pub struct CheckoutCommand {
    pub buyer_id: Uuid,
    pub buyer_email: Option<String>,
    pub items: Vec<CartItem>,
    pub shipping_address: PostalAddress,
    /// Falls back to the shipping address when absent.
    pub billing_address: Option<PostalAddress>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutOutcome {
    pub session: CheckoutSession,
    pub totals: Totals,
}

pub struct CheckoutService {
    provider: Arc<dyn PaymentProvider>,
}

impl CheckoutService {
    pub fn new(provider: Arc<dyn PaymentProvider>) -> Self {
        Self { provider }
    }

    /// Prices the cart and opens a hosted payment session. No order exists
    /// until the provider confirms payment; the session metadata carries
    /// everything the confirmation step needs.
    pub async fn create_checkout(
        &self,
        command: CheckoutCommand,
    ) -> Result<CheckoutOutcome, DomainError> {
        validate_items(&command.items)?;
        command.shipping_address.validate("shipping address")?;
        let billing_address = command
            .billing_address
            .unwrap_or_else(|| command.shipping_address.clone());
        billing_address.validate("billing address")?;

        let totals = Totals::for_items(&command.items);
        let groups = pricing::group_by_seller(&command.items);
        log::debug!(
            "Checkout for buyer {} spans {} seller(s), total {}",
            command.buyer_id,
            groups.len(),
            totals.total
        );

        let line_items = command
            .items
            .iter()
            .map(|item| {
                Ok(ProviderLineItem {
                    name: item.title.clone(),
                    unit_amount: pricing::to_minor_units(&item.price)?,
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        let metadata = CheckoutMetadata {
            buyer_id: command.buyer_id,
            totals: totals.clone(),
            shipping_address: command.shipping_address,
            billing_address,
            items: command.items,
        };

        let session = self
            .provider
            .create_checkout_session(CheckoutSessionRequest {
                client_reference_id: command.buyer_id.to_string(),
                customer_email: command.buyer_email,
                line_items,
                metadata: metadata.to_pairs()?,
            })
            .await?;

        log::info!(
            "Checkout session {} created for buyer {}",
            session.id,
            command.buyer_id
        );
        Ok(CheckoutOutcome { session, totals })
    }
}

fn validate_items(items: &[CartItem]) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::validation("Cart is empty"));
    }
    for item in items {
        if item.quantity < 1 {
            return Err(DomainError::validation(format!(
                "Invalid quantity for {}",
                item.title
            )));
        }
        if item.price < BigDecimal::zero() {
            return Err(DomainError::validation(format!(
                "Invalid price for {}",
                item.title
            )));
        }
        if item.title.trim().is_empty() {
            return Err(DomainError::validation("Cart item title is required"));
        }
    }
    Ok(())
}
