/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    FromRow, Postgres, Transaction,
};
use tracing::{error, info};
use uuid::Uuid;

use super::*;
use crate::environment::DatabaseConfig;

pub async fn connect(cfg: &DatabaseConfig) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .min_connections(cfg.min_connections)
        .idle_timeout(Duration::from_secs(cfg.idle_timeout))
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout))
        .connect(&cfg.url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|err| AppError::DatabaseError(err.to_string()))?;

    info!(tag = "[Database Connected]", max_connections = %cfg.max_connections);

    Ok(pool)
}

/// Commits on success. On failure the transaction is rolled back and the original error is
/// returned; a rolled-back transaction is never committed.
async fn finish_transaction<T>(
    tx: Transaction<'_, Postgres>,
    outcome: Result<T, AppError>,
) -> Result<T, AppError> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(tag = "[Transaction Rollback - ERROR]", error = %rollback_err, cause = %err);
            }
            Err(err)
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    passenger_id: String,
    driver_id: Option<String>,
    pickup_lat: f64,
    pickup_lon: f64,
    dropoff_lat: f64,
    dropoff_lon: f64,
    status: String,
    price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::from_str(&row.status).map_err(|_| {
            AppError::DatabaseError(format!("Unknown order status : {}", row.status))
        })?;

        Ok(Order {
            order_id: OrderId(row.id),
            passenger_id: UserId(row.passenger_id),
            driver_id: row.driver_id.map(DriverId),
            pickup: Point {
                lat: Latitude(row.pickup_lat),
                lon: Longitude(row.pickup_lon),
            },
            dropoff: Point {
                lat: Latitude(row.dropoff_lat),
                lon: Longitude(row.dropoff_lon),
            },
            status,
            price: Money(row.price),
            created_at: TimeStamp(row.created_at),
            updated_at: TimeStamp(row.updated_at),
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentIntentRow {
    order_id: Uuid,
    user_id: String,
    amount: i64,
    created_at: DateTime<Utc>,
}

impl From<PaymentIntentRow> for PaymentIntent {
    fn from(row: PaymentIntentRow) -> Self {
        PaymentIntent {
            order_id: OrderId(row.order_id),
            user_id: UserId(row.user_id),
            amount: Money(row.amount),
            created_at: TimeStamp(row.created_at),
        }
    }
}

const ORDER_COLUMNS: &str = "id, passenger_id, driver_id, pickup_lat, pickup_lon, dropoff_lat, dropoff_lon, status, price, created_at, updated_at";

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn transition_in_transaction(
    tx: &mut Transaction<'_, Postgres>,
    OrderId(order_id): &OrderId,
    requested: OrderStatus,
) -> Result<StatusUpdate, AppError> {
    let current: Option<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(current) = current else {
        return Ok(StatusUpdate::NotFound);
    };
    let current = Order::try_from(current)?;

    match current.status.transition_to(requested) {
        Transition::Repeat => Ok(StatusUpdate::Unchanged(current)),
        Transition::Reject => Ok(StatusUpdate::Rejected(current.status)),
        Transition::Advance => {
            let updated: OrderRow = sqlx::query_as(&format!(
                "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
            ))
            .bind(order_id)
            .bind(requested.to_string())
            .fetch_one(&mut **tx)
            .await?;
            let updated = Order::try_from(updated)?;

            if requested != OrderStatus::FINISHED {
                return Ok(StatusUpdate::Advanced(updated, None));
            }

            let intent: PaymentIntentRow = sqlx::query_as(
                "INSERT INTO payment_intents (order_id, user_id, amount) VALUES ($1, $2, $3) \
                 RETURNING order_id, user_id, amount, created_at",
            )
            .bind(order_id)
            .bind(&updated.passenger_id.0)
            .bind(updated.price.0)
            .fetch_one(&mut **tx)
            .await?;

            Ok(StatusUpdate::Advanced(updated, Some(intent.into())))
        }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO orders (id, passenger_id, driver_id, pickup_lat, pickup_lon, dropoff_lat, dropoff_lon, status, price, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(order.order_id.0)
        .bind(&order.passenger_id.0)
        .bind(order.driver_id.as_ref().map(|DriverId(id)| id.as_str()))
        .bind(order.pickup.lat.0)
        .bind(order.pickup.lon.0)
        .bind(order.dropoff.lat.0)
        .bind(order.dropoff.lon.0)
        .bind(order.status.to_string())
        .bind(order.price.0)
        .bind(order.created_at.0)
        .bind(order.updated_at.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_order(&self, OrderId(order_id): &OrderId) -> Result<Option<Order>, AppError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Order::try_from).transpose()
    }

    async fn bind_driver(
        &self,
        OrderId(order_id): &OrderId,
        DriverId(driver_id): &DriverId,
    ) -> Result<DriverBinding, AppError> {
        let bound: Option<(Uuid,)> = sqlx::query_as(
            "UPDATE orders SET driver_id = $2, updated_at = now() \
             WHERE id = $1 AND driver_id IS NULL RETURNING id",
        )
        .bind(order_id)
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?;

        if bound.is_some() {
            return Ok(DriverBinding::Bound);
        }

        let existing: Option<(Option<String>,)> =
            sqlx::query_as("SELECT driver_id FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match existing {
            None => DriverBinding::OrderNotFound,
            Some((Some(existing),)) if existing == *driver_id => DriverBinding::AlreadyBound,
            Some((Some(existing),)) => DriverBinding::Conflict(DriverId(existing)),
            // Cleared between the two statements; nothing in this service unbinds a driver.
            Some((None,)) => {
                return Err(AppError::DatabaseError(format!(
                    "Driver binding raced for order {order_id}"
                )))
            }
        })
    }

    async fn transition_status(
        &self,
        order_id: &OrderId,
        requested: OrderStatus,
    ) -> Result<StatusUpdate, AppError> {
        let mut tx = self.pool.begin().await?;
        let outcome = transition_in_transaction(&mut tx, order_id, requested).await;
        finish_transaction(tx, outcome).await
    }

    async fn pending_payment_intents(&self, limit: i64) -> Result<Vec<PaymentIntent>, AppError> {
        let rows: Vec<PaymentIntentRow> = sqlx::query_as(
            "SELECT order_id, user_id, amount, created_at FROM payment_intents \
             WHERE published_at IS NULL ORDER BY created_at LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PaymentIntent::from).collect())
    }

    async fn mark_payment_published(&self, OrderId(order_id): &OrderId) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE payment_intents SET published_at = now() \
             WHERE order_id = $1 AND published_at IS NULL",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgWalletStore {
    pool: PgPool,
}

impl PgWalletStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn apply_entry_in_transaction(
    tx: &mut Transaction<'_, Postgres>,
    UserId(user_id): &UserId,
    entry: LedgerEntry,
    amount: Money,
    reference_id: Option<&str>,
) -> Result<LedgerOutcome, AppError> {
    let wallet: Option<(Uuid, i64)> =
        sqlx::query_as("SELECT id, balance FROM wallets WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;

    let Some((wallet_id, balance)) = wallet else {
        return Err(AppError::WalletNotFound(user_id.to_owned()));
    };

    let Money(signed_amount) = entry.signed(amount);

    let inserted: Option<(Uuid,)> = sqlx::query_as(
        "INSERT INTO transactions (id, wallet_id, amount, description, reference_id) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (wallet_id, reference_id) WHERE reference_id IS NOT NULL DO NOTHING \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(wallet_id)
    .bind(signed_amount)
    .bind(entry.description())
    .bind(reference_id)
    .fetch_optional(&mut **tx)
    .await?;

    if inserted.is_none() {
        return Ok(LedgerOutcome::Duplicate(Money(balance)));
    }

    let (new_balance,): (i64,) = sqlx::query_as(
        "UPDATE wallets SET balance = balance + $2, updated_at = now() WHERE id = $1 RETURNING balance",
    )
    .bind(wallet_id)
    .bind(signed_amount)
    .fetch_one(&mut **tx)
    .await?;

    Ok(LedgerOutcome::Applied(Money(new_balance)))
}

#[async_trait]
impl WalletStore for PgWalletStore {
    async fn create_wallet(&self, UserId(user_id): &UserId) -> Result<Money, AppError> {
        sqlx::query(
            "INSERT INTO wallets (id, user_id, balance) VALUES ($1, $2, 0) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let (balance,): (i64,) = sqlx::query_as("SELECT balance FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Money(balance))
    }

    async fn get_balance(&self, UserId(user_id): &UserId) -> Result<Option<Money>, AppError> {
        let balance: Option<(i64,)> = sqlx::query_as("SELECT balance FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(balance.map(|(balance,)| Money(balance)))
    }

    async fn apply_entry(
        &self,
        user_id: &UserId,
        entry: LedgerEntry,
        amount: Money,
        reference_id: Option<&str>,
    ) -> Result<LedgerOutcome, AppError> {
        let mut tx = self.pool.begin().await?;
        let outcome =
            apply_entry_in_transaction(&mut tx, user_id, entry, amount, reference_id).await;
        finish_transaction(tx, outcome).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
