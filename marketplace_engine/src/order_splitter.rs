//! # Order splitter
//!
//! Turns a buyer's checkout into a [`SplitPlan`]: the master order's item snapshot and totals, and one seller group
//! (future sub-order) per distinct seller, each with its commission split.
//!
//! Planning is pure. Storage backends resolve products and sellers inside a transaction, call [`plan_split`], and then
//! persist the plan and reserve stock within that same transaction.
use mkt_common::{Money, DEFAULT_CURRENCY_CODE};

use crate::{
    commission::{order_totals, split, CommissionRate, CommissionSplit, OrderTotals, DEFAULT_MAX_COMMISSION_RATE},
    db_types::{Checkout, LineItemRequest, OrderItem, PaymentMethod, Product, Seller, ShippingAddress},
    traits::MarketplaceError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPolicy {
    /// Seller rates above this ceiling are refused at checkout
    pub max_commission_rate: CommissionRate,
    pub currency: String,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self { max_commission_rate: DEFAULT_MAX_COMMISSION_RATE, currency: DEFAULT_CURRENCY_CODE.to_string() }
    }
}

/// A checkout that has passed input validation. Duplicate product lines have been merged, keeping the position of the
/// first occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCheckout {
    buyer_id: String,
    lines: Vec<LineItemRequest>,
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
}

impl ValidatedCheckout {
    pub fn buyer_id(&self) -> &str {
        &self.buyer_id
    }

    pub fn lines(&self) -> &[LineItemRequest] {
        &self.lines
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }
}

pub fn validate_checkout(checkout: Checkout) -> Result<ValidatedCheckout, MarketplaceError> {
    let Checkout { buyer_id, items, shipping_address, payment_method } = checkout;
    if buyer_id.trim().is_empty() {
        return Err(MarketplaceError::ValidationError("A buyer id is required".into()));
    }
    if items.is_empty() {
        return Err(MarketplaceError::ValidationError("An order must contain at least one item".into()));
    }
    if !shipping_address.is_complete() {
        return Err(MarketplaceError::ValidationError(
            "The shipping address requires an address, city, postal code and country".into(),
        ));
    }
    let mut lines: Vec<LineItemRequest> = Vec::with_capacity(items.len());
    for item in items {
        if item.product_id.trim().is_empty() {
            return Err(MarketplaceError::ValidationError("Every item requires a product id".into()));
        }
        if item.quantity < 1 {
            return Err(MarketplaceError::ValidationError(format!(
                "Quantity for product {} must be at least 1, not {}",
                item.product_id, item.quantity
            )));
        }
        match lines.iter_mut().find(|l| l.product_id == item.product_id) {
            Some(line) => {
                line.quantity = line.quantity.checked_add(item.quantity).ok_or_else(|| {
                    MarketplaceError::ValidationError(format!("Quantity for product {} is too large", item.product_id))
                })?
            },
            None => lines.push(item),
        }
    }
    Ok(ValidatedCheckout { buyer_id, lines, shipping_address, payment_method })
}

/// A checkout line, with the product as it is in the catalog right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLine {
    pub product: Product,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerGroup {
    pub seller_id: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub commission_rate: CommissionRate,
    pub split: CommissionSplit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    pub buyer_id: String,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub currency: String,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub is_master_order: bool,
    /// One entry per distinct seller, in order of first appearance in the checkout
    pub groups: Vec<SellerGroup>,
}

pub fn plan_split(
    checkout: &ValidatedCheckout,
    lines: &[ResolvedLine],
    sellers: &[Seller],
    policy: &SplitPolicy,
) -> Result<SplitPlan, MarketplaceError> {
    let mut items = Vec::with_capacity(lines.len());
    let mut groups: Vec<SellerGroup> = Vec::new();
    for ResolvedLine { product, quantity } in lines {
        if *quantity > product.stock {
            return Err(MarketplaceError::OutOfStock {
                product_id: product.id.clone(),
                requested: *quantity,
                available: product.stock,
            });
        }
        let item = OrderItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity: *quantity,
            unit_price: product.price,
            image: product.image.clone(),
            seller_id: product.seller_id.clone(),
        };
        match groups.iter_mut().find(|g| g.seller_id == product.seller_id) {
            Some(group) => group.items.push(item.clone()),
            None => {
                let seller = sellers
                    .iter()
                    .find(|s| s.id == product.seller_id)
                    .ok_or_else(|| MarketplaceError::SellerNotFound(product.seller_id.clone()))?;
                let commission_rate = seller.commission_rate.within(policy.max_commission_rate)?;
                groups.push(SellerGroup {
                    seller_id: seller.id.clone(),
                    items: vec![item.clone()],
                    subtotal: Money::default(),
                    commission_rate,
                    split: split(Money::default(), commission_rate),
                });
            },
        }
        items.push(item);
    }
    for group in &mut groups {
        group.subtotal = sum_lines(&group.items)?;
        group.split = split(group.subtotal, group.commission_rate);
    }
    let totals = order_totals(sum_lines(&items)?).ok_or_else(too_large)?;
    Ok(SplitPlan {
        buyer_id: checkout.buyer_id.clone(),
        shipping_address: checkout.shipping_address.clone(),
        payment_method: checkout.payment_method,
        currency: policy.currency.clone(),
        items,
        totals,
        is_master_order: groups.len() > 1,
        groups,
    })
}

fn too_large() -> MarketplaceError {
    MarketplaceError::ValidationError("The order total is too large".into())
}

fn sum_lines(items: &[OrderItem]) -> Result<Money, MarketplaceError> {
    items.iter().try_fold(Money::default(), |total, item| {
        item.line_total().and_then(|line| total.checked_add(line)).ok_or_else(too_large)
    })
}
