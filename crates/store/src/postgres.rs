//! PostgreSQL-backed store.
//!
//! The unique constraints declared in the migrations are the authoritative
//! guards for display ids and card phone pairs; version checks ride on
//! `UPDATE ... WHERE version = $expected`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CardId, LocationId, OrderId, StampId};
use domain::{
    Contact, DisplayId, Money, Order, OrderItem, OrderStatus, OrderStore, PaymentStatus,
    PhoneNumber, Stamp, StampCard, StampStore, StoreError, Version,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

type Result<T> = std::result::Result<T, StoreError>;

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::backend(err)
}

/// PostgreSQL implementation of [`OrderStore`] and [`StampStore`].
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database and builds a pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(db_err)?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let status: String = row.try_get("status").map_err(db_err)?;
        let payment_status: String = row.try_get("payment_status").map_err(db_err)?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db_err)?),
            location_id: LocationId::from_uuid(
                row.try_get::<Uuid, _>("location_id").map_err(db_err)?,
            ),
            display_id: DisplayId::from_raw(row.try_get("display_id").map_err(db_err)?),
            status: status.parse::<OrderStatus>().map_err(StoreError::backend)?,
            payment_status: payment_status
                .parse::<PaymentStatus>()
                .map_err(StoreError::backend)?,
            total_amount: Money::from_cents(row.try_get("total_amount").map_err(db_err)?),
            payment_amount: Money::from_cents(row.try_get("payment_amount").map_err(db_err)?),
            payment_captured_amount: row
                .try_get::<Option<i64>, _>("payment_captured_amount")
                .map_err(db_err)?
                .map(Money::from_cents),
            payment_intent: row.try_get("payment_intent").map_err(db_err)?,
            contact: Contact {
                email: row.try_get("contact_email").map_err(db_err)?,
                phone: row.try_get("contact_phone").map_err(db_err)?,
            },
            items,
            created_at: row.try_get("created_at").map_err(db_err)?,
            payment_captured_at: row.try_get("payment_captured_at").map_err(db_err)?,
            version: Version::new(row.try_get("version").map_err(db_err)?),
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            product_id: row.try_get::<String, _>("product_id").map_err(db_err)?.into(),
            product_name: row.try_get("product_name").map_err(db_err)?,
            quantity: row.try_get::<i32, _>("quantity").map_err(db_err)? as u32,
            unit_price: Money::from_cents(row.try_get("unit_price").map_err(db_err)?),
            options_total: Money::from_cents(row.try_get("options_total").map_err(db_err)?),
        })
    }

    fn row_to_card(row: &PgRow) -> Result<StampCard> {
        Ok(StampCard {
            id: CardId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db_err)?),
            location_id: LocationId::from_uuid(
                row.try_get::<Uuid, _>("location_id").map_err(db_err)?,
            ),
            phone: PhoneNumber::from_canonical(
                row.try_get::<String, _>("phone").map_err(db_err)?,
            ),
            first_name: row.try_get("first_name").map_err(db_err)?,
            stamps_required: row.try_get::<i32, _>("stamps_required").map_err(db_err)? as u32,
            is_deleted: row.try_get("is_deleted").map_err(db_err)?,
            created_at: row.try_get("created_at").map_err(db_err)?,
            version: Version::new(row.try_get("version").map_err(db_err)?),
        })
    }

    fn row_to_stamp(row: &PgRow) -> Result<Stamp> {
        Ok(Stamp {
            id: StampId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db_err)?),
            card_id: CardId::from_uuid(row.try_get::<Uuid, _>("card_id").map_err(db_err)?),
            created_at: row.try_get("created_at").map_err(db_err)?,
            claimed_at: row.try_get("claimed_at").map_err(db_err)?,
            is_deleted: row.try_get("is_deleted").map_err(db_err)?,
        })
    }

    async fn items_for_order(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, product_name, quantity, unit_price, options_total
            FROM order_items
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_item).collect()
    }

    /// Bumps the card version under CAS inside an open transaction. The
    /// caller's statements ride on the same transaction and commit together.
    async fn bump_card_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        card_id: CardId,
        expected: Version,
    ) -> Result<Version> {
        let next = expected.next();
        let updated = sqlx::query(
            "UPDATE stamp_cards SET version = $1 WHERE id = $2 AND version = $3",
        )
        .bind(next.as_i64())
        .bind(card_id.as_uuid())
        .bind(expected.as_i64())
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM stamp_cards WHERE id = $1")
                    .bind(card_id.as_uuid())
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(db_err)?;
            return Err(match actual {
                Some(actual) => StoreError::ConcurrencyConflict {
                    entity: "stamp card",
                    id: card_id.to_string(),
                    expected,
                    actual: Version::new(actual),
                },
                None => StoreError::CardNotFound(card_id),
            });
        }
        Ok(next)
    }
}

const ORDER_COLUMNS: &str = "id, location_id, display_id, status, payment_status, total_amount, \
     payment_amount, payment_captured_amount, payment_intent, contact_email, contact_phone, \
     created_at, payment_captured_at, version";

const CARD_COLUMNS: &str =
    "id, location_id, phone, first_name, stamps_required, is_deleted, created_at, version";

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, location_id, display_id, status, payment_status,
                total_amount, payment_amount, payment_captured_amount, payment_intent,
                contact_email, contact_phone, created_at, payment_captured_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.location_id.as_uuid())
        .bind(order.display_id.value())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.total_amount.cents())
        .bind(order.payment_amount.cents())
        .bind(order.payment_captured_amount.map(|m| m.cents()))
        .bind(&order.payment_intent)
        .bind(&order.contact.email)
        .bind(&order.contact.phone)
        .bind(order.created_at)
        .bind(order.payment_captured_at)
        .bind(Version::first().as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db) = e
                && db.constraint() == Some("orders_display_id_key")
            {
                return StoreError::DuplicateDisplayId(order.display_id);
            }
            db_err(e)
        })?;

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_no, product_id, product_name,
                    quantity, unit_price, options_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(line_no as i32)
            .bind(item.product_id.as_str())
            .bind(&item.product_name)
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .bind(item.options_total.cents())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => {
                let items = self.items_for_order(id).await?;
                Ok(Some(Self::row_to_order(&row, items)?))
            }
            None => Ok(None),
        }
    }

    async fn display_id_exists(&self, display_id: DisplayId) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE display_id = $1)")
            .bind(display_id.value())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn update_order(&self, order: &Order, expected: Version) -> Result<Version> {
        let next = expected.next();
        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, payment_status = $2, payment_captured_amount = $3,
                payment_intent = $4, contact_email = $5, contact_phone = $6,
                payment_captured_at = $7, version = $8
            WHERE id = $9 AND version = $10
            "#,
        )
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_captured_amount.map(|m| m.cents()))
        .bind(&order.payment_intent)
        .bind(&order.contact.email)
        .bind(&order.contact.phone)
        .bind(order.payment_captured_at)
        .bind(next.as_i64())
        .bind(order.id.as_uuid())
        .bind(expected.as_i64())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                    .bind(order.id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_err)?;
            return Err(match actual {
                Some(actual) => StoreError::ConcurrencyConflict {
                    entity: "order",
                    id: order.id.to_string(),
                    expected,
                    actual: Version::new(actual),
                },
                None => StoreError::OrderNotFound(order.id),
            });
        }
        Ok(next)
    }

    async fn orders_for_location(&self, location_id: LocationId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE location_id = $1 ORDER BY created_at DESC"
        ))
        .bind(location_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = OrderId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db_err)?);
            let items = self.items_for_order(id).await?;
            orders.push(Self::row_to_order(row, items)?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl StampStore for PostgresStore {
    async fn insert_card(&self, card: &StampCard) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stamp_cards (id, location_id, phone, first_name,
                stamps_required, is_deleted, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(card.id.as_uuid())
        .bind(card.location_id.as_uuid())
        .bind(card.phone.as_str())
        .bind(&card.first_name)
        .bind(card.stamps_required as i32)
        .bind(card.is_deleted)
        .bind(card.created_at)
        .bind(Version::first().as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db) = e
                && db.constraint() == Some("stamp_cards_location_phone_key")
            {
                return StoreError::DuplicateCard;
            }
            db_err(e)
        })?;
        Ok(())
    }

    async fn get_card(&self, id: CardId) -> Result<Option<StampCard>> {
        let row = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM stamp_cards WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::row_to_card).transpose()
    }

    async fn find_card_by_phone(
        &self,
        location_id: LocationId,
        phone: &PhoneNumber,
    ) -> Result<Option<StampCard>> {
        let row = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM stamp_cards \
             WHERE location_id = $1 AND phone = $2 AND NOT is_deleted"
        ))
        .bind(location_id.as_uuid())
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::row_to_card).transpose()
    }

    async fn update_card(&self, card: &StampCard, expected: Version) -> Result<Version> {
        let next = expected.next();
        let updated = sqlx::query(
            r#"
            UPDATE stamp_cards
            SET first_name = $1, stamps_required = $2, is_deleted = $3, version = $4
            WHERE id = $5 AND version = $6
            "#,
        )
        .bind(&card.first_name)
        .bind(card.stamps_required as i32)
        .bind(card.is_deleted)
        .bind(next.as_i64())
        .bind(card.id.as_uuid())
        .bind(expected.as_i64())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM stamp_cards WHERE id = $1")
                    .bind(card.id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_err)?;
            return Err(match actual {
                Some(actual) => StoreError::ConcurrencyConflict {
                    entity: "stamp card",
                    id: card.id.to_string(),
                    expected,
                    actual: Version::new(actual),
                },
                None => StoreError::CardNotFound(card.id),
            });
        }
        Ok(next)
    }

    async fn cards_for_location(&self, location_id: LocationId) -> Result<Vec<StampCard>> {
        let rows = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM stamp_cards \
             WHERE location_id = $1 AND NOT is_deleted ORDER BY created_at ASC"
        ))
        .bind(location_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_card).collect()
    }

    async fn insert_stamp(&self, stamp: &Stamp) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stamps (id, card_id, created_at, claimed_at, is_deleted)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(stamp.id.as_uuid())
        .bind(stamp.card_id.as_uuid())
        .bind(stamp.created_at)
        .bind(stamp.claimed_at)
        .bind(stamp.is_deleted)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db) = e
                && db.constraint() == Some("stamps_card_id_fkey")
            {
                return StoreError::CardNotFound(stamp.card_id);
            }
            db_err(e)
        })?;
        Ok(())
    }

    async fn stamps_for_card(&self, card_id: CardId) -> Result<Vec<Stamp>> {
        let rows = sqlx::query(
            r#"
            SELECT id, card_id, created_at, claimed_at, is_deleted
            FROM stamps
            WHERE card_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(card_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_stamp).collect()
    }

    async fn mark_stamps_claimed(
        &self,
        card_id: CardId,
        expected: Version,
        stamp_ids: &[StampId],
        claimed_at: DateTime<Utc>,
    ) -> Result<Version> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let next = Self::bump_card_version(&mut tx, card_id, expected).await?;

        let ids: Vec<Uuid> = stamp_ids.iter().map(|id| id.as_uuid()).collect();
        let claimed = sqlx::query(
            r#"
            UPDATE stamps
            SET claimed_at = $1
            WHERE card_id = $2 AND id = ANY($3)
              AND claimed_at IS NULL AND NOT is_deleted
            "#,
        )
        .bind(claimed_at)
        .bind(card_id.as_uuid())
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        // All-or-nothing: a partially claimable batch rolls back untouched.
        if claimed.rows_affected() != stamp_ids.len() as u64 {
            tx.rollback().await.map_err(db_err)?;
            return Err(StoreError::ConcurrencyConflict {
                entity: "stamp card",
                id: card_id.to_string(),
                expected,
                actual: expected,
            });
        }

        tx.commit().await.map_err(db_err)?;
        Ok(next)
    }

    async fn soft_delete_stamp(
        &self,
        card_id: CardId,
        expected: Version,
        stamp_id: StampId,
    ) -> Result<Version> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let next = Self::bump_card_version(&mut tx, card_id, expected).await?;

        let deleted = sqlx::query(
            r#"
            UPDATE stamps
            SET is_deleted = TRUE
            WHERE card_id = $1 AND id = $2 AND NOT is_deleted
            "#,
        )
        .bind(card_id.as_uuid())
        .bind(stamp_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Err(StoreError::ConcurrencyConflict {
                entity: "stamp card",
                id: card_id.to_string(),
                expected,
                actual: expected,
            });
        }

        tx.commit().await.map_err(db_err)?;
        Ok(next)
    }
}
