//! The order record.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};

use crate::{OrderError, Result};

/// Lifecycle status of an order.
///
/// Only `Created` is produced by order placement; the other values are
/// accepted when reading stored orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Created,
    Shipped,
    Cancelled,
}

impl OrderStatus {
    /// Returns the stored name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a stored status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(OrderStatus::Created),
            "shipped" => Some(OrderStatus::Shipped),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted order.
///
/// `product_name` and `unit_price` are snapshots taken at placement time;
/// `total_price` is computed once and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// An order ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl NewOrder {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// `unit_price × quantity`; fails if the product does not fit.
    pub fn total_price(&self) -> Result<Money> {
        self.unit_price.checked_multiply(self.quantity).ok_or_else(|| {
            OrderError::Invalid(format!(
                "total price of {} x {} is out of range",
                self.quantity, self.unit_price
            ))
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.product_id.is_blank() {
            return Err(OrderError::Invalid("productId is required".to_string()));
        }
        if self.quantity == 0 {
            return Err(OrderError::Invalid(
                "quantity must be positive".to_string(),
            ));
        }
        self.total_price()?;
        Ok(())
    }

    /// Builds the stored order under `id`.
    pub(crate) fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> Result<Order> {
        let total_price = self.total_price()?;
        Ok(Order {
            id,
            product_id: self.product_id,
            product_name: self.product_name,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_price,
            status: OrderStatus::Created,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_price_is_exact() {
        let order = NewOrder::new(ProductId::new("P1"), "Laptop", 3, Money::from_cents(1005));
        assert_eq!(order.total_price().unwrap(), Money::from_cents(3015));
    }

    #[test]
    fn test_status_names() {
        for status in [
            OrderStatus::Created,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("lost"), None);
        assert_eq!(OrderStatus::default(), OrderStatus::Created);
    }

    #[test]
    fn test_order_wire_format() {
        let order = NewOrder::new(ProductId::new("P1"), "Laptop", 2, Money::from_major(25000))
            .into_order(OrderId::new(1), Utc::now())
            .unwrap();
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(json["id"], 1);
        assert_eq!(json["productId"], "P1");
        assert_eq!(json["productName"], "Laptop");
        assert_eq!(json["status"], "created");
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["unitPrice"], 25000.0);
        assert_eq!(json["totalPrice"], 50000.0);
    }

    #[test]
    fn test_validation() {
        let zero = NewOrder::new(ProductId::new("P1"), "Laptop", 0, Money::from_major(1));
        assert!(zero.validate().is_err());

        let blank = NewOrder::new(ProductId::new(""), "Laptop", 1, Money::from_major(1));
        assert!(blank.validate().is_err());

        let overflow = NewOrder::new(ProductId::new("P1"), "Laptop", 10, Money::from_decimal(1e16));
        assert!(matches!(overflow.validate(), Err(OrderError::Invalid(_))));
    }
}
