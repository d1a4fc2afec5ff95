use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive, Zero};
use uuid::Uuid;

use super::errors::DomainError;
use super::order::CartItem;

/// Flat VAT applied on the subtotal (20%).
pub fn vat_rate() -> BigDecimal {
    BigDecimal::new(20.into(), 2)
}

/// Platform cut of the seller subtotal (7%). Never added to the buyer total.
pub fn commission_rate() -> BigDecimal {
    BigDecimal::new(7.into(), 2)
}

/// Round to currency precision (2 dp), half-up.
pub fn round_money(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

/// Fixed two-decimal rendering, e.g. `"24.00"`.
pub fn money_string(value: &BigDecimal) -> String {
    round_money(value).to_string()
}

/// Convert a unit price to integer minor units (pence), rounding half-up.
pub fn to_minor_units(price: &BigDecimal) -> Result<i64, DomainError> {
    (price * BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
        .ok_or_else(|| DomainError::validation(format!("Price out of range: {price}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: BigDecimal,
    pub vat_amount: BigDecimal,
    pub total: BigDecimal,
    pub commission: BigDecimal,
}

impl Totals {
    pub fn from_subtotal(subtotal: BigDecimal) -> Self {
        let subtotal = round_money(&subtotal);
        let vat_amount = round_money(&(&subtotal * vat_rate()));
        let commission = round_money(&(&subtotal * commission_rate()));
        let total = &subtotal + &vat_amount;
        Self {
            subtotal,
            vat_amount,
            total,
            commission,
        }
    }

    pub fn for_items(items: &[CartItem]) -> Self {
        let subtotal = items
            .iter()
            .map(|i| round_money(&i.price) * BigDecimal::from(i.quantity))
            .fold(BigDecimal::zero(), |acc, line| acc + line);
        Self::from_subtotal(subtotal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineAmounts {
    pub unit_price: BigDecimal,
    pub vat_amount: BigDecimal,
    pub line_total: BigDecimal,
}

/// Per-item amounts: `line_total = unit_price * quantity * (1 + VAT)`.
pub fn line_amounts(unit_price: &BigDecimal, quantity: i32) -> LineAmounts {
    let unit_price = round_money(unit_price);
    let gross = &unit_price * BigDecimal::from(quantity);
    let vat_amount = round_money(&(&gross * vat_rate()));
    let line_total = &gross + &vat_amount;
    LineAmounts {
        unit_price,
        vat_amount,
        line_total,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SellerGroup {
    pub seller_id: Uuid,
    pub items: Vec<CartItem>,
}

impl SellerGroup {
    pub fn totals(&self) -> Totals {
        Totals::for_items(&self.items)
    }
}

/// Split a cart per seller, keeping the order in which sellers first appear.
pub fn group_by_seller(items: &[CartItem]) -> Vec<SellerGroup> {
    let mut groups: Vec<SellerGroup> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|g| g.seller_id == item.seller_id) {
            Some(group) => group.items.push(item.clone()),
            None => groups.push(SellerGroup {
                seller_id: item.seller_id,
                items: vec![item.clone()],
            }),
        }
    }
    groups
}
