use std::collections::HashMap;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::errors::DomainError;
use super::pricing::{self, money_string, Totals};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl PostalAddress {
    pub fn validate(&self, label: &str) -> Result<(), DomainError> {
        let missing: Vec<&str> = [
            ("line1", &self.line1),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DomainError::validation(format!(
                "Missing {label} fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Client supplied cart line. Prices are re-rounded at every computation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: i32,
    #[schema(value_type = String, example = "10.00")]
    pub price: BigDecimal,
    pub title: String,
    pub seller_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Paid,
    Shipped,
    Delivered,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
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
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
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

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub order_number: String,
    pub checkout_session_id: String,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub totals: Totals,
    pub payment_reference: String,
    pub shipping_address: Value,
    pub billing_address: Value,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub vat_amount: BigDecimal,
    pub line_total: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_reference: String,
    pub status: String,
    pub raw_payload: Value,
}

/// One seller's share of a confirmed checkout, written as a unit.
#[derive(Debug, Clone)]
pub struct ConfirmedOrder {
    pub order: NewOrder,
    pub items: Vec<NewOrderItem>,
    pub payment: NewPayment,
}

/// `ORD-<epoch-millis>-<9 uppercase alphanumerics>`
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("ORD-{}-{}", now.timestamp_millis(), suffix)
}

/// State carried on the payment session from checkout to confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutMetadata {
    pub buyer_id: Uuid,
    pub totals: Totals,
    pub shipping_address: PostalAddress,
    pub billing_address: PostalAddress,
    pub items: Vec<CartItem>,
}

impl CheckoutMetadata {
    pub fn to_pairs(&self) -> Result<Vec<(String, String)>, DomainError> {
        Ok(vec![
            ("buyerId".to_string(), self.buyer_id.to_string()),
            ("subtotal".to_string(), money_string(&self.totals.subtotal)),
            ("vatAmount".to_string(), money_string(&self.totals.vat_amount)),
            ("total".to_string(), money_string(&self.totals.total)),
            (
                "commissionAmount".to_string(),
                money_string(&self.totals.commission),
            ),
            ("shippingAddress".to_string(), to_json(&self.shipping_address)?),
            ("billingAddress".to_string(), to_json(&self.billing_address)?),
            ("cartItems".to_string(), to_json(&self.items)?),
        ])
    }

    pub fn from_map(metadata: &HashMap<String, String>) -> Result<Self, DomainError> {
        let buyer_id = Uuid::parse_str(metadata_field(metadata, "buyerId")?)
            .map_err(|e| DomainError::validation(format!("Invalid metadata buyerId: {e}")))?;
        let items: Vec<CartItem> = metadata_json(metadata, "cartItems")?;
        if items.is_empty() {
            return Err(DomainError::validation("Metadata carries no cart items"));
        }

        Ok(Self {
            buyer_id,
            totals: Totals {
                subtotal: metadata_decimal(metadata, "subtotal")?,
                vat_amount: metadata_decimal(metadata, "vatAmount")?,
                total: metadata_decimal(metadata, "total")?,
                commission: metadata_decimal(metadata, "commissionAmount")?,
            },
            shipping_address: metadata_json(metadata, "shippingAddress")?,
            billing_address: metadata_json(metadata, "billingAddress")?,
            items,
        })
    }

    /// Builds one order per seller. Totals are recomputed from the items, never
    /// taken from the metadata.
    pub fn into_orders(
        self,
        checkout_session_id: &str,
        payment: NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConfirmedOrder>, DomainError> {
        let shipping_address = serde_json::to_value(&self.shipping_address)
            .map_err(|e| DomainError::Internal(e.to_string()))?;
        let billing_address = serde_json::to_value(&self.billing_address)
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        Ok(pricing::group_by_seller(&self.items)
            .into_iter()
            .map(|group| {
                let items = group
                    .items
                    .iter()
                    .map(|item| {
                        let amounts = pricing::line_amounts(&item.price, item.quantity);
                        NewOrderItem {
                            product_id: item.product_id,
                            seller_id: item.seller_id,
                            title: item.title.clone(),
                            quantity: item.quantity,
                            unit_price: amounts.unit_price,
                            vat_amount: amounts.vat_amount,
                            line_total: amounts.line_total,
                        }
                    })
                    .collect();
                ConfirmedOrder {
                    order: NewOrder {
                        id: Uuid::new_v4(),
                        order_number: generate_order_number(now),
                        checkout_session_id: checkout_session_id.to_string(),
                        buyer_id: self.buyer_id,
                        seller_id: group.seller_id,
                        totals: group.totals(),
                        payment_reference: payment.payment_reference.clone(),
                        shipping_address: shipping_address.clone(),
                        billing_address: billing_address.clone(),
                    },
                    items,
                    payment: payment.clone(),
                }
            })
            .collect())
    }
}

fn metadata_field<'a>(
    metadata: &'a HashMap<String, String>,
    key: &str,
) -> Result<&'a str, DomainError> {
    metadata
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| DomainError::validation(format!("Missing metadata field {key}")))
}

fn metadata_decimal(metadata: &HashMap<String, String>, key: &str) -> Result<BigDecimal, DomainError> {
    BigDecimal::from_str(metadata_field(metadata, key)?)
        .map_err(|e| DomainError::validation(format!("Invalid metadata {key}: {e}")))
}

fn metadata_json<T: DeserializeOwned>(
    metadata: &HashMap<String, String>,
    key: &str,
) -> Result<T, DomainError> {
    serde_json::from_str(metadata_field(metadata, key)?)
        .map_err(|e| DomainError::validation(format!("Invalid metadata {key}: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, DomainError> {
    serde_json::to_string(value).map_err(|e| DomainError::Internal(e.to_string()))
}
