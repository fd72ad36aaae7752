/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

//! In-process stand-ins for Redis, Postgres, Kafka and the peer services, used by unit tests and
//! by the end-to-end tests behind the `test-helpers` feature.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use crate::{
    common::{
        kafka::{EventConsumer, EventMessage, EventPublisher},
        types::*,
        utils::distance_between_in_km,
    },
    domain::action::geo_index::nearby_query,
    outbound::{BalanceLookup, DriverLocator},
    redis::GeoStore,
    storage::*,
    tools::error::AppError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps positions, last-seen and report times in separate maps, like the Redis keys.
#[derive(Default)]
pub struct InMemoryGeoStore {
    positions: Mutex<HashMap<DriverId, Point>>,
    last_seen: Mutex<HashMap<DriverId, TimeStamp>>,
    reported_at: Mutex<HashMap<DriverId, TimeStamp>>,
}

impl InMemoryGeoStore {
    pub fn contains_position(&self, driver_id: &DriverId) -> bool {
        lock(&self.positions).contains_key(driver_id)
    }

    pub fn contains_last_seen(&self, driver_id: &DriverId) -> bool {
        lock(&self.last_seen).contains_key(driver_id)
    }

    pub fn driver_count(&self) -> usize {
        lock(&self.positions).len()
    }
}

#[async_trait]
impl GeoStore for InMemoryGeoStore {
    async fn upsert_position(
        &self,
        driver_id: &DriverId,
        location: &Point,
        reported_at: TimeStamp,
        seen_at: TimeStamp,
    ) -> Result<bool, AppError> {
        let mut positions = lock(&self.positions);
        let mut seen = lock(&self.last_seen);
        let mut reported = lock(&self.reported_at);
        if let Some(stored) = reported.get(driver_id) {
            if *stored > reported_at {
                return Ok(false);
            }
        }
        positions.insert(driver_id.to_owned(), *location);
        seen.insert(driver_id.to_owned(), seen_at);
        reported.insert(driver_id.to_owned(), reported_at);
        Ok(true)
    }

    async fn search_nearby(
        &self,
        center: &Point,
        Radius(radius_km): Radius,
        limit: usize,
    ) -> Result<Vec<NearbyDriver>, AppError> {
        let mut drivers: Vec<NearbyDriver> = lock(&self.positions)
            .iter()
            .map(|(driver_id, location)| NearbyDriver {
                driver_id: driver_id.to_owned(),
                location: *location,
                distance_km: distance_between_in_km(center, location),
            })
            .filter(|driver| driver.distance_km <= radius_km)
            .collect();
        drivers.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        drivers.truncate(limit);
        Ok(drivers)
    }

    async fn get_position(&self, driver_id: &DriverId) -> Result<Option<DriverPosition>, AppError> {
        let last_seen_at = lock(&self.last_seen).get(driver_id).copied();
        let location = lock(&self.positions).get(driver_id).copied();
        Ok(match (location, last_seen_at) {
            (Some(location), Some(last_seen_at)) => Some(DriverPosition {
                driver_id: driver_id.to_owned(),
                location,
                last_seen_at,
            }),
            _ => None,
        })
    }

    async fn evict_seen_before(&self, cutoff: TimeStamp) -> Result<Vec<DriverId>, AppError> {
        let mut positions = lock(&self.positions);
        let mut seen = lock(&self.last_seen);
        let mut reported = lock(&self.reported_at);
        let mut evicted: Vec<DriverId> = seen
            .iter()
            .filter(|(_, last_seen)| **last_seen < cutoff)
            .map(|(driver_id, _)| driver_id.to_owned())
            .collect();
        for driver_id in &evicted {
            positions.remove(driver_id);
            seen.remove(driver_id);
            reported.remove(driver_id);
        }
        evicted.sort();
        Ok(evicted)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Default)]
struct OrderTables {
    orders: HashMap<OrderId, Order>,
    /// Payment intents and whether each has been published.
    intents: Vec<(PaymentIntent, bool)>,
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    tables: Mutex<OrderTables>,
}

impl InMemoryOrderStore {
    pub fn order_count(&self) -> usize {
        lock(&self.tables).orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<(), AppError> {
        lock(&self.tables)
            .orders
            .insert(order.order_id, order.to_owned());
        Ok(())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, AppError> {
        Ok(lock(&self.tables).orders.get(order_id).cloned())
    }

    async fn bind_driver(
        &self,
        order_id: &OrderId,
        driver_id: &DriverId,
    ) -> Result<DriverBinding, AppError> {
        let mut tables = lock(&self.tables);
        let Some(order) = tables.orders.get_mut(order_id) else {
            return Ok(DriverBinding::OrderNotFound);
        };
        Ok(match order.driver_id.clone() {
            None => {
                order.driver_id = Some(driver_id.to_owned());
                order.updated_at = TimeStamp(Utc::now());
                DriverBinding::Bound
            }
            Some(bound) if bound == *driver_id => DriverBinding::AlreadyBound,
            Some(bound) => DriverBinding::Conflict(bound),
        })
    }

    async fn transition_status(
        &self,
        order_id: &OrderId,
        requested: OrderStatus,
    ) -> Result<StatusUpdate, AppError> {
        let mut tables = lock(&self.tables);
        let Some(order) = tables.orders.get_mut(order_id) else {
            return Ok(StatusUpdate::NotFound);
        };

        match order.status.transition_to(requested) {
            Transition::Repeat => Ok(StatusUpdate::Unchanged(order.to_owned())),
            Transition::Reject => Ok(StatusUpdate::Rejected(order.status)),
            Transition::Advance => {
                let now = TimeStamp(Utc::now());
                order.status = requested;
                order.updated_at = now;
                let order = order.to_owned();

                let intent = (requested == OrderStatus::FINISHED).then(|| PaymentIntent {
                    order_id: order.order_id,
                    user_id: order.passenger_id.to_owned(),
                    amount: order.price,
                    created_at: now,
                });
                if let Some(intent) = &intent {
                    tables.intents.push((intent.to_owned(), false));
                }

                Ok(StatusUpdate::Advanced(order, intent))
            }
        }
    }

    async fn pending_payment_intents(&self, limit: i64) -> Result<Vec<PaymentIntent>, AppError> {
        Ok(lock(&self.tables)
            .intents
            .iter()
            .filter(|(_, published)| !published)
            .take(usize::try_from(limit).unwrap_or_default())
            .map(|(intent, _)| intent.to_owned())
            .collect())
    }

    async fn mark_payment_published(&self, order_id: &OrderId) -> Result<(), AppError> {
        lock(&self.tables)
            .intents
            .iter_mut()
            .filter(|(intent, _)| intent.order_id == *order_id)
            .for_each(|(_, published)| *published = true);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Default)]
struct WalletTables {
    balances: HashMap<UserId, Money>,
    /// Ledger rows: owner, signed amount and optional reference.
    transactions: Vec<(UserId, Money, Option<String>)>,
}

#[derive(Default)]
pub struct InMemoryWalletStore {
    tables: Mutex<WalletTables>,
}

impl InMemoryWalletStore {
    pub fn transaction_count(&self, user_id: &UserId) -> usize {
        lock(&self.tables)
            .transactions
            .iter()
            .filter(|(owner, _, _)| owner == user_id)
            .count()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn create_wallet(&self, user_id: &UserId) -> Result<Money, AppError> {
        Ok(*lock(&self.tables)
            .balances
            .entry(user_id.to_owned())
            .or_default())
    }

    async fn get_balance(&self, user_id: &UserId) -> Result<Option<Money>, AppError> {
        Ok(lock(&self.tables).balances.get(user_id).copied())
    }

    async fn apply_entry(
        &self,
        user_id: &UserId,
        entry: LedgerEntry,
        amount: Money,
        reference_id: Option<&str>,
    ) -> Result<LedgerOutcome, AppError> {
        let mut tables = lock(&self.tables);
        let Some(Money(balance)) = tables.balances.get(user_id).copied() else {
            return Err(AppError::WalletNotFound(user_id.0.to_owned()));
        };

        if let Some(reference_id) = reference_id {
            let seen = tables.transactions.iter().any(|(owner, _, reference)| {
                owner == user_id && reference.as_deref() == Some(reference_id)
            });
            if seen {
                return Ok(LedgerOutcome::Duplicate(Money(balance)));
            }
        }

        let signed = entry.signed(amount);
        let updated = Money(balance + signed.0);
        tables.balances.insert(user_id.to_owned(), updated);
        tables
            .transactions
            .push((user_id.to_owned(), signed, reference_id.map(str::to_string)));

        Ok(LedgerOutcome::Applied(updated))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Topic log shared by every publisher and consumer created from it. Offsets are indices.
#[derive(Default)]
pub struct InMemoryEventBus {
    topics: Mutex<HashMap<String, Vec<EventMessage>>>,
    fail_publishes: AtomicBool,
    appended: Notify,
}

impl InMemoryEventBus {
    pub fn records(&self, topic: &str) -> Vec<EventMessage> {
        lock(&self.topics).get(topic).cloned().unwrap_or_default()
    }

    /// Makes every following publish fail as an unreachable broker would.
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Appends a copy of an already delivered record, as a producer retry would.
    pub fn replay(&self, message: &EventMessage) {
        self.append(&message.topic, message.key.to_owned(), message.payload.to_owned());
    }

    /// Appends a record directly, bypassing the failure switch.
    pub fn publish_raw(&self, topic: &str, key: &str, payload: &[u8]) {
        self.append(topic, Some(key.to_string()), payload.to_vec());
    }

    pub fn consumer(self: &Arc<Self>, topic: &str) -> InMemoryConsumer {
        InMemoryConsumer {
            bus: self.clone(),
            topic: topic.to_string(),
            position: Mutex::new(0),
            committed: Mutex::new(0),
            failing_redeliveries: AtomicUsize::new(0),
        }
    }

    fn append(&self, topic: &str, key: Option<String>, payload: Vec<u8>) {
        {
            let mut topics = lock(&self.topics);
            let records = topics.entry(topic.to_string()).or_default();
            let offset = records.len() as i64;
            records.push(EventMessage {
                topic: topic.to_string(),
                partition: 0,
                offset,
                key,
                payload,
            });
        }
        self.appended.notify_waiters();
    }

    fn record_at(&self, topic: &str, offset: usize) -> Option<EventMessage> {
        lock(&self.topics)
            .get(topic)
            .and_then(|records| records.get(offset).cloned())
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), AppError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(AppError::KafkaPushFailed(format!(
                "broker unavailable for topic {topic}"
            )));
        }
        self.append(topic, Some(key.to_string()), payload.to_vec());
        Ok(())
    }
}

/// Single-partition consumer over an [`InMemoryEventBus`] topic.
pub struct InMemoryConsumer {
    bus: Arc<InMemoryEventBus>,
    topic: String,
    position: Mutex<usize>,
    committed: Mutex<i64>,
    failing_redeliveries: AtomicUsize,
}

impl InMemoryConsumer {
    /// Offset of the next record the group would resume from.
    pub fn committed_offset(&self) -> i64 {
        *lock(&self.committed)
    }

    /// Makes the next `count` rewinds fail without moving the position, as a failed seek would.
    pub fn fail_next_redeliveries(&self, count: usize) {
        self.failing_redeliveries.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventConsumer for InMemoryConsumer {
    async fn fetch_message(&self) -> Result<EventMessage, AppError> {
        loop {
            let appended = self.bus.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            {
                let mut position = lock(&self.position);
                if let Some(message) = self.bus.record_at(&self.topic, *position) {
                    *position += 1;
                    return Ok(message);
                }
            }

            appended.await;
        }
    }

    async fn commit_message(&self, message: &EventMessage) -> Result<(), AppError> {
        let mut committed = lock(&self.committed);
        *committed = (*committed).max(message.offset + 1);
        Ok(())
    }

    async fn redeliver(&self, message: &EventMessage) -> Result<(), AppError> {
        let failing = self
            .failing_redeliveries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if failing.is_ok() {
            return Err(AppError::KafkaConsumeFailed(format!(
                "seek failed for {}@{}",
                message.topic, message.offset
            )));
        }
        *lock(&self.position) = usize::try_from(message.offset).unwrap_or_default();
        Ok(())
    }
}

/// Answers nearby queries from an in-process geo store instead of the tracker's HTTP API.
pub struct LocalDriverLocator {
    geo_store: Arc<InMemoryGeoStore>,
    store_timeout: Duration,
}

impl LocalDriverLocator {
    pub fn new(geo_store: Arc<InMemoryGeoStore>, store_timeout: Duration) -> Self {
        Self {
            geo_store,
            store_timeout,
        }
    }
}

#[async_trait]
impl DriverLocator for LocalDriverLocator {
    async fn nearby_drivers(
        &self,
        center: &Point,
        radius: Radius,
        limit: usize,
    ) -> Result<Vec<NearbyDriver>, AppError> {
        nearby_query(
            self.geo_store.as_ref(),
            center,
            radius,
            limit,
            self.store_timeout,
        )
        .await
    }
}

pub struct StaticBalanceLookup(pub Money);

#[async_trait]
impl BalanceLookup for StaticBalanceLookup {
    async fn balance(&self, _user_id: &UserId) -> Result<Money, AppError> {
        Ok(self.0)
    }
}

/// Reads balances straight from an in-process wallet store.
pub struct LocalBalanceLookup(pub Arc<InMemoryWalletStore>);

#[async_trait]
impl BalanceLookup for LocalBalanceLookup {
    async fn balance(&self, user_id: &UserId) -> Result<Money, AppError> {
        Ok(self.0.get_balance(user_id).await?.unwrap_or_default())
    }
}
