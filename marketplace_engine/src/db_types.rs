use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use mkt_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::commission::CommissionRate;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('#')
            .parse::<i64>()
            .map(Self)
            .map_err(|e| ConversionError(format!("Invalid order id '{s}': {e}")))
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------       SubOrderId      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct SubOrderId(pub i64);

impl Display for SubOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#S{}", self.0)
    }
}

impl SubOrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------      OrderStatus      ---------------------------------------------------------
/// Fulfillment status shared by master orders and sub-orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Delivered and cancelled entities accept no further status changes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Position along the fulfillment path. `Cancelled` sits off the path and has no rank.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Processing => Some(1),
            Self::Shipped => Some(2),
            Self::Delivered => Some(3),
            Self::Cancelled => None,
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------  SellerApprovalStatus ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SellerApprovalStatus {
    Pending,
    Approved,
    NotApproved,
}

impl SellerApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::NotApproved => "not_approved",
        }
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for SellerApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SellerApprovalStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "not_approved" => Ok(Self::NotApproved),
            _ => Err(ConversionError(format!("Invalid seller approval status: {s}"))),
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    /// Paid through the card processor
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cash_on_delivery",
            Self::Card => "card",
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash_on_delivery" | "cod" => Ok(Self::CashOnDelivery),
            "card" => Ok(Self::Card),
            _ => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------    ShippingAddress    ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    pub fn new<S: Into<String>>(address: S, city: S, postal_code: S, country: S) -> Self {
        Self { address: address.into(), city: city.into(), postal_code: postal_code.into(), country: country.into() }
    }

    pub fn is_complete(&self) -> bool {
        [&self.address, &self.city, &self.postal_code, &self.country].iter().all(|s| !s.trim().is_empty())
    }
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
/// A line item as it was at checkout. Name, price and image are copied from the catalog and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub image: String,
    pub seller_id: String,
}

impl OrderItem {
    /// `None` if price times quantity overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

//--------------------------------------     PaymentResult     ---------------------------------------------------------
/// The processor's record of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    /// Processor reference. Either a payment intent (`pi_...`) or a checkout session (`cs_...`).
    pub id: String,
    pub status: String,
    pub update_time: DateTime<Utc>,
    pub email: Option<String>,
}

//--------------------------------------     RefundResult      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResult {
    pub refund_id: String,
    pub charge_id: String,
    pub amount: Money,
    pub currency: String,
    pub refunded_at: DateTime<Utc>,
}

//--------------------------------------         Order         ---------------------------------------------------------
/// The buyer-facing (master) order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: String,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_result: Option<PaymentResult>,
    pub refund_result: Option<RefundResult>,
    pub items_price: Money,
    pub tax_price: Money,
    pub shipping_price: Money,
    pub total_price: Money,
    pub currency: String,
    pub order_status: OrderStatus,
    /// True iff the items span two or more sellers
    pub is_master_order: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub sub_orders: Vec<SubOrderId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Order {
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

//--------------------------------------        SubOrder       ---------------------------------------------------------
/// A seller-scoped slice of a master order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubOrder {
    pub id: SubOrderId,
    pub master_order_id: OrderId,
    pub seller_id: String,
    pub buyer_id: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub commission_rate: CommissionRate,
    pub commission: Money,
    pub seller_earnings: Money,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub seller_approval_status: SellerApprovalStatus,
    pub earnings_released: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub refund_result: Option<RefundResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

//--------------------------------------        Catalog        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: String,
    pub name: String,
    pub commission_rate: CommissionRate,
}

impl Seller {
    pub fn new<S: Into<String>>(id: S, name: S, commission_rate: CommissionRate) -> Self {
        Self { id: id.into(), name: name.into(), commission_rate }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub price: Money,
    pub image: String,
    pub stock: i64,
}

impl Product {
    pub fn new<S: Into<String>>(id: S, seller_id: S, name: S, price: Money, stock: i64) -> Self {
        Self { id: id.into(), seller_id: seller_id.into(), name: name.into(), price, image: String::new(), stock }
    }

    pub fn with_image<S: Into<String>>(mut self, image: S) -> Self {
        self.image = image.into();
        self
    }
}

//--------------------------------------        Checkout       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

impl LineItemRequest {
    pub fn new<S: Into<String>>(product_id: S, quantity: i64) -> Self {
        Self { product_id: product_id.into(), quantity }
    }
}

/// A buyer's request to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    pub buyer_id: String,
    pub items: Vec<LineItemRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

impl Checkout {
    pub fn new<S: Into<String>>(buyer_id: S, shipping_address: ShippingAddress, payment_method: PaymentMethod) -> Self {
        Self { buyer_id: buyer_id.into(), items: Vec::new(), shipping_address, payment_method }
    }

    pub fn with_item<S: Into<String>>(mut self, product_id: S, quantity: i64) -> Self {
        self.items.push(LineItemRequest::new(product_id, quantity));
        self
    }
}
