//! Order ledger: the order-owning service's durable record of placed orders.
//!
//! Orders are created once and never mutated. IDs are sequential integers
//! assigned by the ledger on insert.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod order;
pub mod postgres;

pub use error::{OrderError, Result};
pub use ledger::OrderLedger;
pub use memory::InMemoryOrderLedger;
pub use order::{NewOrder, Order, OrderStatus};
pub use postgres::PgOrderLedger;
