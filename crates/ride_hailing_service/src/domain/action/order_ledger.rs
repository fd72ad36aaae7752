/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::{str::FromStr, time::Duration};

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    common::{
        kafka::{publish_event, EventPublisher},
        types::*,
        utils::*,
    },
    domain::types::{dispatch::RideDispatchedEvent, order::*},
    environment::OrderState,
    outbound::BalanceLookup,
    storage::{DriverBinding, Order, OrderStore, PaymentIntent, StatusUpdate},
    tools::{error::AppError, prometheus::RELAYED_PAYMENT_INTENTS},
};

#[macros::measure_duration]
pub async fn create_order(
    data: &OrderState,
    request: CreateOrderRequest,
) -> Result<CreateOrderResponse, AppError> {
    let CreateOrderRequest {
        user_id,
        pickup_lat,
        pickup_long,
        dropoff_lat,
        dropoff_long,
    } = request;

    if user_id.0.trim().is_empty() {
        return Err(AppError::InvalidRequest("userId is required".to_string()));
    }

    let pickup = Point {
        lat: pickup_lat,
        lon: pickup_long,
    };
    let dropoff = Point {
        lat: dropoff_lat,
        lon: dropoff_long,
    };
    validate_point(&pickup)?;
    validate_point(&dropoff)?;

    let price = calculate_price(&pickup, &dropoff);

    let balance = data.balance_lookup.balance(&user_id).await?;
    if balance < price {
        return Err(AppError::InsufficientBalance(balance.0, price.0));
    }

    let now = TimeStamp(Utc::now());
    let order = Order {
        order_id: OrderId(Uuid::new_v4()),
        passenger_id: user_id,
        driver_id: None,
        pickup,
        dropoff,
        status: OrderStatus::CREATED,
        price,
        created_at: now,
        updated_at: now,
    };

    with_timeout(
        data.store_timeout,
        "order store",
        data.order_store.insert_order(&order),
    )
    .await?;

    info!(tag = "[Order Created]", order_id = %order.order_id, passenger_id = %order.passenger_id.0, price = %order.price);

    Ok(CreateOrderResponse {
        order_id: order.order_id,
        status: order.status,
        price: order.price,
    })
}

pub async fn get_order(data: &OrderState, order_id: &str) -> Result<Order, AppError> {
    let order_id = parse_order_id(order_id)?;

    with_timeout(
        data.store_timeout,
        "order store",
        data.order_store.get_order(&order_id),
    )
    .await?
    .ok_or_else(|| AppError::OrderNotFound(order_id.to_string()))
}

/// Moves an order forward. FINISHED is persisted together with a payment intent; the debit event
/// is then published, and if that fails the relay publishes it later.
#[macros::measure_duration]
pub async fn update_order_status(
    data: &OrderState,
    order_id: &str,
    request: UpdateOrderStatusRequest,
) -> Result<UpdateOrderStatusResponse, AppError> {
    let order_id = parse_order_id(order_id)?;

    let requested = match OrderStatus::from_str(request.status.trim()) {
        Ok(status @ (OrderStatus::STARTED | OrderStatus::FINISHED)) => status,
        _ => {
            return Err(AppError::InvalidRequest(format!(
                "Status must be STARTED or FINISHED : {}",
                request.status
            )))
        }
    };

    let update = with_timeout(
        data.store_timeout,
        "order store",
        data.order_store.transition_status(&order_id, requested),
    )
    .await?;

    let order = match update {
        StatusUpdate::NotFound => return Err(AppError::OrderNotFound(order_id.to_string())),
        StatusUpdate::Rejected(current) => {
            return Err(AppError::InvalidOrderTransition(
                current.to_string(),
                requested.to_string(),
            ))
        }
        StatusUpdate::Unchanged(order) => order,
        StatusUpdate::Advanced(order, intent) => {
            info!(tag = "[Order Status Updated]", order_id = %order_id, status = %order.status);
            if let Some(intent) = intent {
                if let Err(err) = publish_payment_intent(
                    data.publisher.as_ref(),
                    &data.wallet_transactions_topic,
                    data.order_store.as_ref(),
                    &intent,
                )
                .await
                {
                    warn!(tag = "[Payment Intent Deferred]", order_id = %order_id, error = %err);
                }
            }
            order
        }
    };

    Ok(UpdateOrderStatusResponse {
        order_id: order.order_id,
        status: order.status,
        updated_at: order.updated_at,
    })
}

pub async fn publish_payment_intent(
    publisher: &dyn EventPublisher,
    topic: &str,
    order_store: &dyn OrderStore,
    intent: &PaymentIntent,
) -> Result<(), AppError> {
    let reference = intent.order_id.to_string();

    let event = DebitBalanceEvent {
        amount: intent.amount,
        user_id: intent.user_id.0.to_owned(),
        reference: reference.to_owned(),
    };

    publish_event(publisher, topic, &reference, &event).await?;

    order_store.mark_payment_published(&intent.order_id).await
}

/// Publishes payment intents left pending by an earlier failure. Returns how many went out.
pub async fn relay_pending_payments(
    publisher: &dyn EventPublisher,
    topic: &str,
    order_store: &dyn OrderStore,
    batch_size: i64,
    store_timeout: Duration,
) -> Result<usize, AppError> {
    let pending = with_timeout(
        store_timeout,
        "order store",
        order_store.pending_payment_intents(batch_size),
    )
    .await?;

    let mut published = 0;
    for intent in pending {
        match publish_payment_intent(publisher, topic, order_store, &intent).await {
            Ok(()) => {
                RELAYED_PAYMENT_INTENTS.with_label_values(&["SUCCESS"]).inc();
                published += 1;
            }
            Err(err) => {
                RELAYED_PAYMENT_INTENTS.with_label_values(&["FAILURE"]).inc();
                error!(tag = "[Payment Relay - ERROR]", order_id = %intent.order_id, error = %err);
                break;
            }
        }
    }

    Ok(published)
}

/// Binds the matched driver to the order named by the event's ride id.
pub async fn bind_driver(
    order_store: &dyn OrderStore,
    event: &RideDispatchedEvent,
    store_timeout: Duration,
) -> Result<DriverBinding, AppError> {
    let order_id = parse_order_id(&event.ride_id)?;

    if event.driver_id.trim().is_empty() {
        return Err(AppError::InvalidRequest("driver_id is required".to_string()));
    }
    let driver_id = DriverId(event.driver_id.to_owned());

    let binding = with_timeout(
        store_timeout,
        "order store",
        order_store.bind_driver(&order_id, &driver_id),
    )
    .await?;

    match &binding {
        DriverBinding::Bound => {
            info!(tag = "[Driver Bound]", order_id = %order_id, driver_id = %driver_id.0)
        }
        DriverBinding::AlreadyBound => {
            info!(tag = "[Driver Already Bound]", order_id = %order_id, driver_id = %driver_id.0)
        }
        DriverBinding::Conflict(existing) => {
            warn!(tag = "[Driver Binding Conflict]", order_id = %order_id, bound_driver_id = %existing.0, driver_id = %driver_id.0)
        }
        DriverBinding::OrderNotFound => {
            warn!(tag = "[Driver Binding - Order Not Found]", order_id = %order_id, driver_id = %driver_id.0)
        }
    }

    Ok(binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryEventBus, InMemoryOrderStore, StaticBalanceLookup};
    use std::sync::Arc;

    const TOPIC: &str = "wallet-transactions";

    fn state(
        store: Arc<InMemoryOrderStore>,
        bus: Arc<InMemoryEventBus>,
        balance: i64,
    ) -> OrderState {
        OrderState {
            order_store: store,
            balance_lookup: Arc::new(StaticBalanceLookup(Money(balance))),
            publisher: bus,
            wallet_transactions_topic: TOPIC.to_string(),
            store_timeout: Duration::from_secs(1),
        }
    }

    fn create_request() -> CreateOrderRequest {
        CreateOrderRequest {
            user_id: UserId("passenger-1".to_string()),
            pickup_lat: Latitude(-6.2088),
            pickup_long: Longitude(106.8456),
            dropoff_lat: Latitude(-6.1751),
            dropoff_long: Longitude(106.8650),
        }
    }

    fn status(status: &str) -> UpdateOrderStatusRequest {
        UpdateOrderStatusRequest {
            status: status.to_string(),
        }
    }

    #[tokio::test]
    async fn insufficient_balance_creates_nothing() {
        let store = Arc::new(InMemoryOrderStore::default());
        let bus = Arc::new(InMemoryEventBus::default());

        let res = create_order(&state(store.clone(), bus, 100), create_request()).await;

        assert!(matches!(res, Err(AppError::InsufficientBalance(100, _))));
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn order_lifecycle_emits_one_debit() {
        let store = Arc::new(InMemoryOrderStore::default());
        let bus = Arc::new(InMemoryEventBus::default());
        let data = state(store.clone(), bus.clone(), 1_000_000);

        let created = create_order(&data, create_request()).await.expect("create");
        assert_eq!(created.status, OrderStatus::CREATED);
        let order_id = created.order_id.to_string();

        let skipped = update_order_status(&data, &order_id, status("FINISHED")).await;
        assert!(matches!(skipped, Err(AppError::InvalidOrderTransition(_, _))));

        update_order_status(&data, &order_id, status("STARTED"))
            .await
            .expect("start");
        let finished = update_order_status(&data, &order_id, status("FINISHED"))
            .await
            .expect("finish");
        assert_eq!(finished.status, OrderStatus::FINISHED);

        // Repeating FINISHED is a no-op and emits nothing more.
        update_order_status(&data, &order_id, status("FINISHED"))
            .await
            .expect("repeat");

        let backward = update_order_status(&data, &order_id, status("STARTED")).await;
        assert!(matches!(backward, Err(AppError::InvalidOrderTransition(_, _))));

        let records = bus.records(TOPIC);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key.as_deref(), Some(order_id.as_str()));
        let event: DebitBalanceEvent =
            serde_json::from_slice(&records[0].payload).expect("event json");
        assert_eq!(event.amount, created.price);
        assert_eq!(event.reference, order_id);
        assert!(store
            .pending_payment_intents(10)
            .await
            .expect("pending")
            .is_empty());
    }

    #[tokio::test]
    async fn failed_debit_publish_is_relayed_later() {
        let store = Arc::new(InMemoryOrderStore::default());
        let bus = Arc::new(InMemoryEventBus::default());
        let data = state(store.clone(), bus.clone(), 1_000_000);

        let created = create_order(&data, create_request()).await.expect("create");
        let order_id = created.order_id.to_string();
        update_order_status(&data, &order_id, status("STARTED"))
            .await
            .expect("start");

        bus.fail_publishes(true);
        let finished = update_order_status(&data, &order_id, status("FINISHED"))
            .await
            .expect("finish succeeds while the bus is down");
        assert_eq!(finished.status, OrderStatus::FINISHED);
        assert!(bus.records(TOPIC).is_empty());
        assert_eq!(store.pending_payment_intents(10).await.expect("pending").len(), 1);

        bus.fail_publishes(false);
        let relayed = relay_pending_payments(
            bus.as_ref(),
            TOPIC,
            store.as_ref(),
            10,
            Duration::from_secs(1),
        )
        .await
        .expect("relay");

        assert_eq!(relayed, 1);
        assert_eq!(bus.records(TOPIC).len(), 1);
        assert!(store.pending_payment_intents(10).await.expect("pending").is_empty());
    }

    #[tokio::test]
    async fn invalid_requests_are_classified() {
        let store = Arc::new(InMemoryOrderStore::default());
        let bus = Arc::new(InMemoryEventBus::default());
        let data = state(store, bus, 1_000_000);

        assert!(matches!(
            get_order(&data, "not-a-uuid").await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            get_order(&data, &Uuid::new_v4().to_string()).await,
            Err(AppError::OrderNotFound(_))
        ));
        assert!(matches!(
            update_order_status(&data, &Uuid::new_v4().to_string(), status("CREATED")).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            update_order_status(&data, &Uuid::new_v4().to_string(), status("STARTED")).await,
            Err(AppError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn driver_binding_never_changes_once_set() {
        let store = Arc::new(InMemoryOrderStore::default());
        let bus = Arc::new(InMemoryEventBus::default());
        let data = state(store.clone(), bus, 1_000_000);
        let created = create_order(&data, create_request()).await.expect("create");

        let event = |driver: &str| RideDispatchedEvent {
            ride_id: created.order_id.to_string(),
            passenger_id: "passenger-1".to_string(),
            driver_id: driver.to_string(),
            pickup_lat: -6.2088,
            pickup_long: 106.8456,
            timestamp: 0,
        };

        let timeout = Duration::from_secs(1);
        assert_eq!(
            bind_driver(store.as_ref(), &event("d1"), timeout).await.expect("bind"),
            DriverBinding::Bound
        );
        assert_eq!(
            bind_driver(store.as_ref(), &event("d1"), timeout).await.expect("rebind"),
            DriverBinding::AlreadyBound
        );
        assert_eq!(
            bind_driver(store.as_ref(), &event("d2"), timeout).await.expect("conflict"),
            DriverBinding::Conflict(DriverId("d1".to_string()))
        );

        let order = get_order(&data, &created.order_id.to_string()).await.expect("order");
        assert_eq!(order.driver_id, Some(DriverId("d1".to_string())));
    }
}
