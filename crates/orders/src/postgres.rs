use async_trait::async_trait;
use common::{Money, OrderId, ProductId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{NewOrder, Order, OrderError, OrderLedger, OrderStatus, Result};

const ORDER_COLUMNS: &str =
    "id, product_id, product_name, quantity, unit_price_cents, total_price_cents, status, created_at";

/// PostgreSQL-backed order ledger.
#[derive(Clone)]
pub struct PgOrderLedger {
    pool: PgPool,
}

impl PgOrderLedger {
    /// Creates a new ledger over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| OrderError::Corrupt(format!("negative quantity {quantity}")))?;
        let status: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status)
            .ok_or_else(|| OrderError::Corrupt(format!("unknown status '{status}'")))?;

        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            total_price: Money::from_cents(row.try_get("total_price_cents")?),
            status,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl OrderLedger for PgOrderLedger {
    #[tracing::instrument(skip(self, order), fields(product_id = %order.product_id, quantity = order.quantity))]
    async fn create(&self, order: NewOrder) -> Result<Order> {
        order.validate()?;
        let total_price = order.total_price()?;
        let quantity = i32::try_from(order.quantity)
            .map_err(|_| OrderError::Invalid(format!("quantity {} is too large", order.quantity)))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (product_id, product_name, quantity, unit_price_cents, total_price_cents, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.product_id.as_str())
        .bind(&order.product_name)
        .bind(quantity)
        .bind(order.unit_price.cents())
        .bind(total_price.cents())
        .bind(OrderStatus::Created.as_str())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_order(row)
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}
