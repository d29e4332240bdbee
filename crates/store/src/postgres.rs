use std::str::FromStr;

use async_trait::async_trait;
use common::{CartId, OrderId, PrincipalId};
use domain::{
    Cart, CartLine, Delivery, Money, Order, OrderHeader, OrderLine, OrderStatus, Payment,
    ProductId, Variant, VariantId,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgExecutor, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{Store, UnitOfWork, check_variant},
};

/// PostgreSQL-backed store implementation.
///
/// Units of work are database transactions. Variant and order reads inside
/// a unit of work use `SELECT ... FOR UPDATE`, and stock decrements are
/// conditional on enough stock being left, so concurrent placements against
/// the same variant serialize on its row.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
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
}

const SELECT_VARIANT: &str = r#"
    SELECT id, product_id, unit_price_cents, stock_quantity, availability
    FROM variants
    WHERE id = $1
"#;

const SELECT_ORDER: &str = r#"
    SELECT id, principal_id, status, total_amount_cents, special_instructions, created_at
    FROM orders
    WHERE id = $1
"#;

fn to_db_quantity(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::InvalidValue(format!("quantity {value} is out of range")))
}

fn from_db_quantity(value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidValue(format!("negative quantity {value}")))
}

fn parse_column<T: FromStr<Err = String>>(row: &PgRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(StoreError::InvalidValue)
}

fn row_to_variant(row: &PgRow) -> Result<Variant> {
    Ok(Variant {
        id: VariantId::new(row.try_get::<String, _>("id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        stock_quantity: from_db_quantity(row.try_get("stock_quantity")?)?,
        availability: parse_column(row, "availability")?,
    })
}

fn row_to_header(row: &PgRow) -> Result<OrderHeader> {
    Ok(OrderHeader {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        principal_id: PrincipalId::from_uuid(row.try_get::<Uuid, _>("principal_id")?),
        status: parse_column(row, "status")?,
        total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
        special_instructions: row.try_get("special_instructions")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_line(row: &PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        variant_id: VariantId::new(row.try_get::<String, _>("variant_id")?),
        quantity: from_db_quantity(row.try_get("quantity")?)?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
    })
}

fn row_to_delivery(row: &PgRow) -> Result<Delivery> {
    Ok(Delivery {
        method: parse_column(row, "method")?,
        status: parse_column(row, "status")?,
        estimated_days: from_db_quantity(row.try_get("estimated_days")?)?,
    })
}

fn row_to_payment(row: &PgRow) -> Result<Payment> {
    Ok(Payment {
        method: parse_column(row, "method")?,
        status: parse_column(row, "status")?,
        amount: Money::from_cents(row.try_get("amount_cents")?),
    })
}

async fn fetch_order_lines<'e>(
    executor: impl PgExecutor<'e>,
    id: OrderId,
) -> Result<Vec<OrderLine>> {
    let rows = sqlx::query(
        r#"
        SELECT variant_id, quantity, unit_price_cents, subtotal_cents
        FROM order_items
        WHERE order_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(id.as_uuid())
    .fetch_all(executor)
    .await?;

    rows.iter().map(row_to_line).collect()
}

async fn fetch_cart_lines<'e>(
    executor: impl PgExecutor<'e>,
    cart_id: Uuid,
) -> Result<Vec<CartLine>> {
    let rows = sqlx::query(
        r#"
        SELECT variant_id, quantity
        FROM cart_items
        WHERE cart_id = $1
        ORDER BY added_at ASC, variant_id ASC
        "#,
    )
    .bind(cart_id)
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CartLine {
                variant_id: VariantId::new(row.try_get::<String, _>("variant_id")?),
                quantity: from_db_quantity(row.try_get("quantity")?)?,
            })
        })
        .collect()
}

#[async_trait]
impl Store for PostgresStore {
    type UnitOfWork = PostgresUnitOfWork;

    async fn begin(&self) -> Result<PostgresUnitOfWork> {
        let tx = self.pool.begin().await?;
        Ok(PostgresUnitOfWork { tx })
    }

    async fn get_variant(&self, id: &VariantId) -> Result<Option<Variant>> {
        let row = sqlx::query(SELECT_VARIANT)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_variant).transpose()
    }

    async fn upsert_variant(&self, variant: &Variant) -> Result<()> {
        check_variant(variant)?;
        sqlx::query(
            r#"
            INSERT INTO variants (id, product_id, unit_price_cents, stock_quantity, availability)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                product_id = EXCLUDED.product_id,
                unit_price_cents = EXCLUDED.unit_price_cents,
                stock_quantity = EXCLUDED.stock_quantity,
                availability = EXCLUDED.availability,
                updated_at = NOW()
            "#,
        )
        .bind(variant.id.as_str())
        .bind(variant.product_id.as_str())
        .bind(variant.unit_price.cents())
        .bind(to_db_quantity(variant.stock_quantity)?)
        .bind(variant.availability.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let Some(row) = sqlx::query(SELECT_ORDER)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let header = row_to_header(&row)?;
        let lines = fetch_order_lines(&self.pool, id).await?;

        let delivery = sqlx::query(
            "SELECT method, status, estimated_days FROM deliveries WHERE order_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(row_to_delivery)
        .transpose()?;

        let payment =
            sqlx::query("SELECT method, status, amount_cents FROM payments WHERE order_id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
                .as_ref()
                .map(row_to_payment)
                .transpose()?;

        Ok(Some(Order {
            header,
            lines,
            delivery,
            payment,
        }))
    }

    async fn get_active_cart(&self, principal_id: PrincipalId) -> Result<Option<Cart>> {
        let cart_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM carts WHERE principal_id = $1 AND status = 'active'",
        )
        .bind(principal_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(cart_id) = cart_id else {
            return Ok(None);
        };
        let lines = fetch_cart_lines(&self.pool, cart_id).await?;

        Ok(Some(Cart {
            id: CartId::from_uuid(cart_id),
            principal_id,
            lines,
        }))
    }

    async fn add_to_cart(
        &self,
        principal_id: PrincipalId,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<Cart> {
        let mut tx = self.pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM variants WHERE id = $1)")
                .bind(variant_id.as_str())
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Err(StoreError::NotFound {
                entity: "Variant",
                id: variant_id.to_string(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO carts (id, principal_id, status)
            VALUES ($1, $2, 'active')
            ON CONFLICT (principal_id) WHERE status = 'active' DO NOTHING
            "#,
        )
        .bind(CartId::new().as_uuid())
        .bind(principal_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        let cart_id: Uuid = sqlx::query_scalar(
            "SELECT id FROM carts WHERE principal_id = $1 AND status = 'active'",
        )
        .bind(principal_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, variant_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, variant_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(cart_id)
        .bind(variant_id.as_str())
        .bind(to_db_quantity(quantity)?)
        .execute(&mut *tx)
        .await?;

        let lines = fetch_cart_lines(&mut *tx, cart_id).await?;
        tx.commit().await?;

        Ok(Cart {
            id: CartId::from_uuid(cart_id),
            principal_id,
            lines,
        })
    }
}

/// Unit of work backed by a PostgreSQL transaction.
///
/// sqlx rolls the transaction back if it is dropped before `commit`.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn lock_variant(&mut self, id: &VariantId) -> Result<Option<Variant>> {
        let row = sqlx::query(&format!("{SELECT_VARIANT} FOR UPDATE"))
            .bind(id.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_variant).transpose()
    }

    async fn decrement_stock(&mut self, id: &VariantId, quantity: u32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE variants
            SET stock_quantity = stock_quantity - $2, updated_at = NOW()
            WHERE id = $1 AND stock_quantity >= $2
            "#,
        )
        .bind(id.as_str())
        .bind(to_db_quantity(quantity)?)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM variants WHERE id = $1)")
                .bind(id.as_str())
                .fetch_one(&mut *self.tx)
                .await?;
        if exists {
            tracing::debug!(variant_id = %id, quantity, "conditional stock decrement matched no row");
            Err(StoreError::StockConflict {
                variant_id: id.clone(),
                requested: quantity,
            })
        } else {
            Err(StoreError::NotFound {
                entity: "Variant",
                id: id.to_string(),
            })
        }
    }

    async fn increment_stock(&mut self, id: &VariantId, quantity: u32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE variants
            SET stock_quantity = stock_quantity + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(to_db_quantity(quantity)?)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "Variant",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_order(&mut self, header: &OrderHeader) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, principal_id, status, total_amount_cents, special_instructions, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(header.id.as_uuid())
        .bind(header.principal_id.as_uuid())
        .bind(header.status.as_str())
        .bind(header.total_amount.cents())
        .bind(header.special_instructions.as_deref())
        .bind(header.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_order_line(&mut self, order_id: OrderId, line: &OrderLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, variant_id, quantity, unit_price_cents, subtotal_cents)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(line.variant_id.as_str())
        .bind(to_db_quantity(line.quantity)?)
        .bind(line.unit_price.cents())
        .bind(line.subtotal.cents())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_delivery(&mut self, order_id: OrderId, delivery: &Delivery) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO deliveries (order_id, method, status, estimated_days)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(delivery.method.as_str())
        .bind(delivery.status.as_str())
        .bind(to_db_quantity(delivery.estimated_days)?)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_payment(&mut self, order_id: OrderId, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (order_id, method, status, amount_cents)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(payment.amount.cents())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderHeader>> {
        let row = sqlx::query(&format!("{SELECT_ORDER} FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_header).transpose()
    }

    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>> {
        fetch_order_lines(&mut *self.tx, id).await
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "Order",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn active_cart_id(&mut self, principal_id: PrincipalId) -> Result<Option<CartId>> {
        let cart_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM carts WHERE principal_id = $1 AND status = 'active' FOR UPDATE",
        )
        .bind(principal_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(cart_id.map(CartId::from_uuid))
    }

    async fn cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>> {
        fetch_cart_lines(&mut *self.tx, cart_id.as_uuid()).await
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        metrics::counter!("store_units_of_work_total", "outcome" => "committed").increment(1);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        metrics::counter!("store_units_of_work_total", "outcome" => "rolled_back").increment(1);
        Ok(())
    }
}
