/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

//! Runs the store implementations against live services. Each test is skipped unless its
//! environment variable is set:
//!
//! - `TEST_REDIS_HOST` (and optionally `TEST_REDIS_PORT`)
//! - `TEST_DATABASE_URL`
//! - `TEST_KAFKA_BROKERS` (comma separated)

use std::time::Duration;

use chrono::{TimeZone, Utc};
use fred::prelude::*;
use ride_hailing_service::{
    common::{
        kafka::{EventConsumer, EventPublisher, KafkaEventConsumer, KafkaEventPublisher},
        types::*,
    },
    environment::{DatabaseConfig, KafkaConfig, RedisConfig},
    redis::{
        commands::RedisConnectionPool,
        keys::{driver_last_seen_key, driver_positions_key, driver_reported_at_key},
        GeoStore,
    },
    storage::{
        postgres::{connect, PgOrderStore, PgWalletStore},
        LedgerEntry, LedgerOutcome, Order, OrderStore, StatusUpdate, WalletStore,
    },
    tools::error::AppError,
};
use uuid::Uuid;

fn env(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => {
            eprintln!("{name} is not set, skipping");
            None
        }
    }
}

fn pt(lat: f64, lon: f64) -> Point {
    Point {
        lat: Latitude(lat),
        lon: Longitude(lon),
    }
}

fn unique_driver(prefix: &str) -> DriverId {
    DriverId(format!("{prefix}-{}", Uuid::new_v4()))
}

async fn redis() -> Option<RedisConnectionPool> {
    let redis_host = env("TEST_REDIS_HOST")?;
    let redis_port = std::env::var("TEST_REDIS_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(6379);

    let pool = RedisConnectionPool::new(&RedisConfig {
        redis_host,
        redis_port,
        redis_pool_size: 2,
        redis_partition: 0,
        reconnect_max_attempts: 3,
        reconnect_delay: 500,
    })
    .await
    .expect("Failed to create Redis connection pool");

    Some(pool)
}

async fn score(pool: &RedisConnectionPool, key: String, DriverId(driver_id): &DriverId) -> Option<f64> {
    pool.pool
        .next()
        .zscore(key, driver_id.to_owned())
        .await
        .expect("zscore")
}

async fn reported_at(pool: &RedisConnectionPool, DriverId(driver_id): &DriverId) -> Option<String> {
    pool.pool
        .next()
        .hget(driver_reported_at_key(), driver_id.to_owned())
        .await
        .expect("hget")
}

#[tokio::test]
async fn redis_eviction_clears_every_key() {
    let Some(pool) = redis().await else { return };

    // Far in the past so that no other test's drivers fall below the cutoffs used here.
    let base = Utc
        .with_ymd_and_hms(2001, 1, 1, 0, 0, 0)
        .single()
        .expect("valid date");
    let stale = unique_driver("stale");
    let recent = unique_driver("recent");
    let stale_at = TimeStamp(base);
    let recent_at = TimeStamp(base + chrono::Duration::seconds(10));

    pool.upsert_position(&stale, &pt(-6.2100, 106.8100), stale_at, stale_at)
        .await
        .expect("upsert");
    pool.upsert_position(&recent, &pt(-6.2101, 106.8101), recent_at, recent_at)
        .await
        .expect("upsert");

    let evicted = pool
        .evict_seen_before(TimeStamp(base + chrono::Duration::seconds(5)))
        .await
        .expect("evict");

    assert!(evicted.contains(&stale));
    assert!(!evicted.contains(&recent));
    assert_eq!(score(&pool, driver_positions_key(), &stale).await, None);
    assert_eq!(score(&pool, driver_last_seen_key(), &stale).await, None);
    assert_eq!(reported_at(&pool, &stale).await, None);
    assert!(pool.get_position(&stale).await.expect("read").is_none());

    let nearby = pool
        .search_nearby(&pt(-6.2100, 106.8100), Radius(0.5), 1000)
        .await
        .expect("search");
    assert!(nearby.iter().all(|driver| driver.driver_id != stale));
    assert!(nearby.iter().any(|driver| driver.driver_id == recent));

    pool.evict_seen_before(TimeStamp(base + chrono::Duration::seconds(11)))
        .await
        .expect("cleanup");
    assert!(pool.get_position(&recent).await.expect("read").is_none());
}

#[tokio::test]
async fn redis_replayed_report_never_regresses() {
    let Some(pool) = redis().await else { return };

    let driver = unique_driver("replay");
    let now = Utc::now();
    let reported = TimeStamp(now - chrono::Duration::seconds(5));
    let older = TimeStamp(now - chrono::Duration::seconds(30));

    let applied = pool
        .upsert_position(&driver, &pt(-6.2088, 106.8456), reported, TimeStamp(now))
        .await
        .expect("upsert");
    let replayed = pool
        .upsert_position(
            &driver,
            &pt(-6.3000, 106.9000),
            older,
            TimeStamp(now + chrono::Duration::seconds(1)),
        )
        .await
        .expect("upsert");

    assert!(applied);
    assert!(!replayed);

    let position = pool
        .get_position(&driver)
        .await
        .expect("read")
        .expect("present");
    assert!((position.location.lat.0 - -6.2088).abs() < 1e-4);
    assert!((position.location.lon.0 - 106.8456).abs() < 1e-4);
    assert_eq!(
        position.last_seen_at.0.timestamp_millis(),
        now.timestamp_millis()
    );
    assert_eq!(
        reported_at(&pool, &driver).await,
        Some(reported.0.timestamp_millis().to_string())
    );
}

#[tokio::test]
async fn redis_unknown_driver_has_no_position() {
    let Some(pool) = redis().await else { return };

    let position = pool
        .get_position(&unique_driver("unknown"))
        .await
        .expect("read");
    assert!(position.is_none());
}

async fn postgres() -> Option<sqlx::PgPool> {
    let url = env("TEST_DATABASE_URL")?;
    let pool = connect(&DatabaseConfig {
        url,
        max_connections: 4,
        min_connections: 0,
        idle_timeout: 30,
        acquire_timeout: 10,
    })
    .await
    .expect("Failed to connect to the test database");
    Some(pool)
}

fn new_order(price: i64) -> Order {
    let now = TimeStamp(Utc::now());
    Order {
        order_id: OrderId(Uuid::new_v4()),
        passenger_id: UserId(format!("passenger-{}", Uuid::new_v4())),
        driver_id: None,
        pickup: pt(-6.2088, 106.8456),
        dropoff: pt(-6.1754, 106.8272),
        status: OrderStatus::CREATED,
        price: Money(price),
        created_at: now,
        updated_at: now,
    }
}

async fn has_pending_intent(store: &PgOrderStore, order_id: &OrderId) -> bool {
    store
        .pending_payment_intents(100_000)
        .await
        .expect("pending")
        .iter()
        .any(|intent| intent.order_id == *order_id)
}

#[tokio::test]
async fn postgres_finish_records_the_payment_intent() {
    let Some(pool) = postgres().await else { return };
    let store = PgOrderStore::new(pool);
    let order = new_order(12_500);
    store.insert_order(&order).await.expect("insert");

    let started = store
        .transition_status(&order.order_id, OrderStatus::STARTED)
        .await
        .expect("start");
    assert!(matches!(started, StatusUpdate::Advanced(_, None)));

    let finished = store
        .transition_status(&order.order_id, OrderStatus::FINISHED)
        .await
        .expect("finish");
    let StatusUpdate::Advanced(updated, Some(intent)) = finished else {
        panic!("expected an advanced order with a payment intent");
    };
    assert_eq!(updated.status, OrderStatus::FINISHED);
    assert_eq!(intent.amount, Money(12_500));
    assert_eq!(intent.user_id, order.passenger_id);
    assert!(has_pending_intent(&store, &order.order_id).await);

    store
        .mark_payment_published(&order.order_id)
        .await
        .expect("mark");
    assert!(!has_pending_intent(&store, &order.order_id).await);

    let repeated = store
        .transition_status(&order.order_id, OrderStatus::FINISHED)
        .await
        .expect("repeat");
    assert!(matches!(repeated, StatusUpdate::Unchanged(_)));
    assert!(!has_pending_intent(&store, &order.order_id).await);
}

#[tokio::test]
async fn postgres_failed_intent_rolls_back_the_finish() {
    let Some(pool) = postgres().await else { return };
    let store = PgOrderStore::new(pool);
    // A zero amount violates the payment intent check constraint inside the transaction.
    let order = new_order(0);
    store.insert_order(&order).await.expect("insert");
    store
        .transition_status(&order.order_id, OrderStatus::STARTED)
        .await
        .expect("start");

    let finished = store
        .transition_status(&order.order_id, OrderStatus::FINISHED)
        .await;
    assert!(matches!(finished, Err(AppError::DatabaseError(_))));

    let stored = store
        .get_order(&order.order_id)
        .await
        .expect("read")
        .expect("present");
    assert_eq!(stored.status, OrderStatus::STARTED);
    assert!(!has_pending_intent(&store, &order.order_id).await);
}

#[tokio::test]
async fn postgres_debit_reference_applies_once_per_wallet() {
    let Some(pool) = postgres().await else { return };
    let store = PgWalletStore::new(pool);
    let user = UserId(format!("user-{}", Uuid::new_v4()));
    let other = UserId(format!("user-{}", Uuid::new_v4()));
    let reference = Uuid::new_v4().to_string();

    assert_eq!(store.create_wallet(&user).await.expect("create"), Money(0));
    store.create_wallet(&other).await.expect("create");
    store
        .apply_entry(&user, LedgerEntry::Credit, Money(50_000), None)
        .await
        .expect("credit");

    let first = store
        .apply_entry(&user, LedgerEntry::Debit, Money(12_500), Some(&reference))
        .await
        .expect("debit");
    let replayed = store
        .apply_entry(&user, LedgerEntry::Debit, Money(12_500), Some(&reference))
        .await
        .expect("debit");
    let elsewhere = store
        .apply_entry(&other, LedgerEntry::Debit, Money(12_500), Some(&reference))
        .await
        .expect("debit");

    assert_eq!(first, LedgerOutcome::Applied(Money(37_500)));
    assert_eq!(replayed, LedgerOutcome::Duplicate(Money(37_500)));
    assert_eq!(elsewhere, LedgerOutcome::Applied(Money(-12_500)));
    assert_eq!(
        store.get_balance(&user).await.expect("balance"),
        Some(Money(37_500))
    );
}

#[tokio::test]
async fn postgres_entry_on_missing_wallet_writes_nothing() {
    let Some(pool) = postgres().await else { return };
    let store = PgWalletStore::new(pool.clone());
    let user = UserId(format!("user-{}", Uuid::new_v4()));

    let debit = store
        .apply_entry(&user, LedgerEntry::Debit, Money(1_000), Some("order-1"))
        .await;
    assert!(matches!(debit, Err(AppError::WalletNotFound(_))));
    assert_eq!(store.get_balance(&user).await.expect("balance"), None);

    let (rows,): (i64,) = sqlx::query_as(
        "SELECT count(*) FROM transactions t JOIN wallets w ON w.id = t.wallet_id WHERE w.user_id = $1",
    )
    .bind(&user.0)
    .fetch_one(&pool)
    .await
    .expect("count");
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn kafka_consumer_rewinds_then_commits() {
    let Some(brokers) = env("TEST_KAFKA_BROKERS") else { return };
    let cfg = KafkaConfig {
        brokers: brokers.split(',').map(str::to_string).collect(),
        publish_timeout: 10_000,
        retry_backoff: 100,
    };
    let topic = format!("rhs-test-{}", Uuid::new_v4());

    let publisher = KafkaEventPublisher::new(&cfg).expect("producer");
    publisher.publish(&topic, "k", b"first").await.expect("publish");
    publisher.publish(&topic, "k", b"second").await.expect("publish");

    let consumer =
        KafkaEventConsumer::new(&cfg, &format!("{topic}-group"), &topic).expect("consumer");
    let fetch = || async {
        tokio::time::timeout(Duration::from_secs(30), consumer.fetch_message())
            .await
            .expect("record within timeout")
            .expect("fetch")
    };

    let first = fetch().await;
    assert_eq!(first.payload, b"first");

    consumer.redeliver(&first).await.expect("rewind");
    let again = fetch().await;
    assert_eq!(again.offset, first.offset);
    assert_eq!(again.payload, b"first");

    consumer.commit_message(&again).await.expect("commit");
    let second = fetch().await;
    assert_eq!(second.payload, b"second");
    consumer.commit_message(&second).await.expect("commit");
}
