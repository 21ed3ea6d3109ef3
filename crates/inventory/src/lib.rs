//! Inventory ledger: the product-owning service's source of truth for stock.
//!
//! Stock changes through manual adjustment or through
//! [`InventoryLedger::apply_decrement`], which records an
//! [`EffectKey`](common::EffectKey) and the decrement atomically so a
//! redelivered `order.created` event is applied once.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod product;
pub mod seed;

pub use error::{InventoryError, Result};
pub use ledger::{InventoryLedger, InventoryLedgerExt};
pub use memory::InMemoryInventoryLedger;
pub use postgres::PgInventoryLedger;
pub use product::{DEFAULT_CATEGORY, DecrementOutcome, MAX_PRICE, NewProduct, Product};
pub use seed::default_catalogue;
