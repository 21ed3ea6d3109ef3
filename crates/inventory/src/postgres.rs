use async_trait::async_trait;
use chrono::Utc;
use common::{EffectKey, Money, ProductId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::product::decrement;
use crate::{DecrementOutcome, InventoryError, InventoryLedger, NewProduct, Product, Result};

const PRODUCT_COLUMNS: &str = "id, name, price_cents, stock, category, created_at";

/// PostgreSQL-backed inventory ledger.
#[derive(Clone)]
pub struct PgInventoryLedger {
    pool: PgPool,
}

impl PgInventoryLedger {
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

    fn row_to_product(row: PgRow) -> Result<Product> {
        let stock: i32 = row.try_get("stock")?;
        let stock = u32::try_from(stock)
            .map_err(|_| InventoryError::Corrupt(format!("negative stock {stock}")))?;

        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock,
            category: row.try_get("category")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn stock_to_db(stock: u32) -> Result<i32> {
    i32::try_from(stock).map_err(|_| InventoryError::Invalid(format!("stock {stock} is too large")))
}

#[async_trait]
impl InventoryLedger for PgInventoryLedger {
    #[tracing::instrument(skip(self))]
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let product = product.into_product(Utc::now())?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, price_cents, stock, category, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(stock_to_db(product.stock)?)
        .bind(&product.category)
        .bind(product.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return InventoryError::AlreadyExists(product.id.clone());
            }
            InventoryError::Database(e)
        })?;

        Self::row_to_product(row)
    }

    #[tracing::instrument(skip(self))]
    async fn set_stock(&self, id: &ProductId, stock: u32) -> Result<Product> {
        let row = sqlx::query(&format!(
            "UPDATE products SET stock = $2 WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_str())
        .bind(stock_to_db(stock)?)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(InventoryError::ProductNotFound(id.clone())),
        }
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    async fn apply_decrement(
        &self,
        key: EffectKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<DecrementOutcome> {
        let mut tx = self.pool.begin().await?;

        let recorded = sqlx::query(
            r#"
            INSERT INTO applied_effects (order_id, effect_type)
            VALUES ($1, $2)
            ON CONFLICT (order_id, effect_type) DO NOTHING
            "#,
        )
        .bind(key.order_id.as_i64())
        .bind(key.effect.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if recorded == 0 {
            tx.rollback().await?;
            return Ok(DecrementOutcome::AlreadyApplied);
        }

        // Row lock serializes concurrent decrements of the same product
        let stock: Option<i32> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;

        let Some(stock) = stock else {
            tx.rollback().await?;
            return Ok(DecrementOutcome::ProductMissing);
        };
        let stock = u32::try_from(stock)
            .map_err(|_| InventoryError::Corrupt(format!("negative stock {stock}")))?;

        let (remaining, outcome) = decrement(stock, quantity);
        sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(product_id.as_str())
            .bind(stock_to_db(remaining)?)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(outcome)
    }

    async fn product_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }
}
