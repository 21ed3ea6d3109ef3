//! Shared state for the service routers.

use std::sync::Arc;

use inventory::InventoryLedger;
use serde::Serialize;
use workflow::OrderWorkflow;

use crate::config::Config;

/// Identity of the running process, reported by `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub instance: String,
}

impl ServiceInfo {
    pub fn new(service: &'static str, instance: impl Into<String>) -> Self {
        Self {
            service,
            instance: instance.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.service.name(), config.instance.clone())
    }
}

/// State of the order service routes.
pub struct OrderState {
    pub workflow: OrderWorkflow,
}

impl OrderState {
    pub fn new(workflow: OrderWorkflow) -> Arc<Self> {
        Arc::new(Self { workflow })
    }
}

/// State of the product service routes.
pub struct ProductState {
    pub ledger: Arc<dyn InventoryLedger>,
}

impl ProductState {
    pub fn new(ledger: Arc<dyn InventoryLedger>) -> Arc<Self> {
        Arc::new(Self { ledger })
    }
}
