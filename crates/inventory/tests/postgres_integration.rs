//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need Docker. Run with:
//!
//! ```bash
//! cargo test -p inventory --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;

use common::{EffectKey, EffectType, Money, OrderId, ProductId};
use inventory::{
    DecrementOutcome, InventoryError, InventoryLedger, InventoryLedgerExt, NewProduct,
    PgInventoryLedger, default_catalogue,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            PgInventoryLedger::new(pool.clone())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh ledger with its own pool and cleared tables
async fn get_test_ledger() -> PgInventoryLedger {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE products, applied_effects")
        .execute(&pool)
        .await
        .unwrap();

    PgInventoryLedger::new(pool)
}

fn stock_key(order: i64) -> EffectKey {
    EffectKey::new(OrderId::new(order), EffectType::StockDecrement)
}

async fn create_p1(ledger: &PgInventoryLedger, stock: u32) -> ProductId {
    ledger
        .create_product(
            NewProduct::new("Laptop", Money::from_major(25000), stock)
                .with_id("P1")
                .with_category("electronics"),
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn create_and_get_product() {
    let ledger = get_test_ledger().await;
    let id = create_p1(&ledger, 50).await;

    let product = ledger.get_product(&id).await.unwrap().unwrap();
    assert_eq!(product.name, "Laptop");
    assert_eq!(product.price, Money::from_major(25000));
    assert_eq!(product.stock, 50);
    assert_eq!(product.category, "electronics");
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn duplicate_product_id_is_rejected() {
    let ledger = get_test_ledger().await;
    create_p1(&ledger, 50).await;

    let result = ledger
        .create_product(NewProduct::new("Again", Money::from_major(1), 1).with_id("P1"))
        .await;
    assert!(matches!(result, Err(InventoryError::AlreadyExists(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn set_stock_on_missing_product_fails() {
    let ledger = get_test_ledger().await;
    let result = ledger.set_stock(&ProductId::new("missing"), 3).await;
    assert!(matches!(result, Err(InventoryError::ProductNotFound(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn redelivered_decrement_applies_once() {
    let ledger = get_test_ledger().await;
    let id = create_p1(&ledger, 50).await;

    let first = ledger.apply_decrement(stock_key(1), &id, 2).await.unwrap();
    let second = ledger.apply_decrement(stock_key(1), &id, 2).await.unwrap();

    assert_eq!(first, DecrementOutcome::Applied { remaining: 48 });
    assert_eq!(second, DecrementOutcome::AlreadyApplied);
    assert_eq!(ledger.get_product(&id).await.unwrap().unwrap().stock, 48);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn decrement_past_zero_clamps() {
    let ledger = get_test_ledger().await;
    let id = create_p1(&ledger, 1).await;

    let outcome = ledger.apply_decrement(stock_key(1), &id, 5).await.unwrap();

    assert_eq!(
        outcome,
        DecrementOutcome::Clamped {
            requested: 5,
            available: 1
        }
    );
    assert_eq!(ledger.get_product(&id).await.unwrap().unwrap().stock, 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn decrement_for_missing_product_is_not_recorded() {
    let ledger = get_test_ledger().await;
    let missing = ProductId::new("ghost");

    let outcome = ledger
        .apply_decrement(stock_key(9), &missing, 1)
        .await
        .unwrap();
    assert_eq!(outcome, DecrementOutcome::ProductMissing);

    let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applied_effects")
        .fetch_one(ledger.pool())
        .await
        .unwrap();
    assert_eq!(recorded, 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn concurrent_decrements_do_not_lose_updates() {
    let ledger = get_test_ledger().await;
    let id = create_p1(&ledger, 100).await;

    let mut handles = Vec::new();
    for order in 1..=10 {
        let ledger = ledger.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            ledger.apply_decrement(stock_key(order), &id, 3).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(ledger.get_product(&id).await.unwrap().unwrap().stock, 70);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn seed_fills_empty_catalogue_once() {
    let ledger = get_test_ledger().await;

    assert_eq!(ledger.seed_if_empty(default_catalogue()).await.unwrap(), 5);
    assert_eq!(ledger.seed_if_empty(default_catalogue()).await.unwrap(), 0);

    let products = ledger.list_products().await.unwrap();
    assert_eq!(products.len(), 5);
    assert!(products.iter().any(|p| p.name == "Laptop" && p.stock == 50));
}
