//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need Docker. Run with:
//!
//! ```bash
//! cargo test -p orders --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;

use common::{Money, OrderId, ProductId};
use orders::{NewOrder, OrderLedger, OrderStatus, PgOrderLedger};
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
            PgOrderLedger::new(pool.clone())
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
async fn get_test_ledger() -> PgOrderLedger {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE orders RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PgOrderLedger::new(pool)
}

fn laptop_order(quantity: u32) -> NewOrder {
    NewOrder::new(ProductId::new("P1"), "Laptop", quantity, Money::from_major(25000))
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn create_assigns_sequential_ids_and_totals() {
    let ledger = get_test_ledger().await;

    let first = ledger.create(laptop_order(2)).await.unwrap();
    let second = ledger.create(laptop_order(1)).await.unwrap();

    assert_eq!(first.id, OrderId::new(1));
    assert_eq!(second.id, OrderId::new(2));
    assert_eq!(first.total_price, Money::from_major(50000));
    assert_eq!(first.status, OrderStatus::Created);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn get_returns_stored_snapshot() {
    let ledger = get_test_ledger().await;
    let created = ledger.create(laptop_order(3)).await.unwrap();

    let found = ledger.get(created.id).await.unwrap().unwrap();
    assert_eq!(found.product_name, "Laptop");
    assert_eq!(found.unit_price, Money::from_major(25000));
    assert_eq!(found.total_price, Money::from_major(75000));

    assert!(ledger.get(OrderId::new(404)).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn list_is_newest_first() {
    let ledger = get_test_ledger().await;
    ledger.create(laptop_order(1)).await.unwrap();
    ledger.create(laptop_order(2)).await.unwrap();
    ledger.create(laptop_order(3)).await.unwrap();

    let ids: Vec<i64> = ledger
        .list()
        .await
        .unwrap()
        .iter()
        .map(|o| o.id.as_i64())
        .collect();
    assert_eq!(ids, vec![3, 2, 1]);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn zero_quantity_is_rejected_before_insert() {
    let ledger = get_test_ledger().await;
    assert!(ledger.create(laptop_order(0)).await.is_err());
    assert!(ledger.list().await.unwrap().is_empty());
}
