//! Order placement workflow.
//!
//! [`OrderWorkflow`] validates a request, checks stock with the
//! product-owning service through a [`ProductCatalog`], records the order
//! and publishes `order.created`. Stock is only decremented later, by the
//! consumer of that event.

pub mod catalog;
pub mod coordinator;
pub mod error;

pub use catalog::{CatalogError, HttpProductCatalog, LedgerCatalog, ProductCatalog, ProductSnapshot};
pub use coordinator::{Communication, OrderPlacement, OrderWorkflow, PlaceOrder};
pub use error::{Result, WorkflowError};
