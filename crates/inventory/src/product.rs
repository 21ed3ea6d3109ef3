//! Product records and stock mutation outcomes.

use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::{InventoryError, Result};

/// Category assigned when a product is created without one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Highest accepted unit price: one trillion in major units.
pub const MAX_PRICE: Money = Money::from_cents(100_000_000_000_000);

/// A catalogue entry with its current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    /// Caller-chosen ID; one is generated when absent.
    #[serde(default)]
    pub id: Option<ProductId>,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub category: Option<String>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: None,
            name: name.into(),
            price,
            stock,
            category: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<ProductId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Checks the input and resolves defaults into a full product.
    pub fn into_product(self, created_at: DateTime<Utc>) -> Result<Product> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(InventoryError::Invalid("name is required".to_string()));
        }
        if self.price.is_negative() {
            return Err(InventoryError::Invalid(
                "price must not be negative".to_string(),
            ));
        }
        if self.price > MAX_PRICE {
            return Err(InventoryError::Invalid(format!(
                "price must not exceed {MAX_PRICE}"
            )));
        }
        let id = match self.id {
            Some(id) if id.is_blank() => {
                return Err(InventoryError::Invalid("id must not be blank".to_string()));
            }
            Some(id) => id,
            None => ProductId::generate(),
        };
        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        Ok(Product {
            id,
            name: name.to_string(),
            price: self.price,
            stock: self.stock,
            category,
            created_at,
        })
    }
}

/// What an idempotent stock decrement did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// Stock was decremented; `remaining` is the new level.
    Applied { remaining: u32 },
    /// The effect key was already recorded; nothing changed.
    AlreadyApplied,
    /// The product does not exist; nothing changed.
    ProductMissing,
    /// The decrement exceeded the stock, which was set to zero instead.
    Clamped { requested: u32, available: u32 },
}

impl DecrementOutcome {
    /// Returns true if this call changed the stock.
    pub fn changed_stock(&self) -> bool {
        matches!(
            self,
            DecrementOutcome::Applied { .. } | DecrementOutcome::Clamped { .. }
        )
    }
}

/// Applies a decrement to a stock level, clamping at zero.
pub(crate) fn decrement(stock: u32, quantity: u32) -> (u32, DecrementOutcome) {
    match stock.checked_sub(quantity) {
        Some(remaining) => (remaining, DecrementOutcome::Applied { remaining }),
        None => (
            0,
            DecrementOutcome::Clamped {
                requested: quantity,
                available: stock,
            },
        ),
    }
}
