/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use ride_hailing_service::{
    common::types::*,
    domain::{
        action::{dispatch_matcher, geo_index, order_ledger, wallet_ledger},
        types::{dispatch::*, order::*, tracker::*, wallet::*},
    },
    environment::{DispatchState, OrderState, TrackerState, WalletState},
    testing::*,
    workers::{
        driver_gps::DriverGpsHandler, process_next, ride_dispatch::DriverBindingHandler,
        wallet_transactions::WalletDebitHandler, Outcome,
    },
};

const DRIVER_GPS: &str = "driver-gps";
const RIDE_DISPATCH: &str = "ride-dispatch";
const WALLET_TRANSACTIONS: &str = "wallet-transactions";
const TIMEOUT: Duration = Duration::from_secs(1);

/// Every service wired against the same in-process bus, as they would be against one broker.
struct Cluster {
    bus: Arc<InMemoryEventBus>,
    geo: Arc<InMemoryGeoStore>,
    orders: Arc<InMemoryOrderStore>,
    wallets: Arc<InMemoryWalletStore>,
    tracker: TrackerState,
    dispatch: DispatchState,
    order: OrderState,
    wallet: WalletState,
}

impl Cluster {
    fn new() -> Self {
        let bus = Arc::new(InMemoryEventBus::default());
        let geo = Arc::new(InMemoryGeoStore::default());
        let orders = Arc::new(InMemoryOrderStore::default());
        let wallets = Arc::new(InMemoryWalletStore::default());

        Cluster {
            tracker: TrackerState {
                geo_store: geo.clone(),
                publisher: bus.clone(),
                driver_gps_topic: DRIVER_GPS.to_string(),
                store_timeout: TIMEOUT,
                nearby_max_limit: 50,
            },
            dispatch: DispatchState {
                driver_locator: Arc::new(LocalDriverLocator::new(geo.clone(), TIMEOUT)),
                publisher: bus.clone(),
                ride_dispatch_topic: RIDE_DISPATCH.to_string(),
            },
            order: OrderState {
                order_store: orders.clone(),
                balance_lookup: Arc::new(LocalBalanceLookup(wallets.clone())),
                publisher: bus.clone(),
                wallet_transactions_topic: WALLET_TRANSACTIONS.to_string(),
                store_timeout: TIMEOUT,
            },
            wallet: WalletState {
                wallet_store: wallets.clone(),
                store_timeout: TIMEOUT,
            },
            bus,
            geo,
            orders,
            wallets,
        }
    }
}

async fn balance(cluster: &Cluster, user: &str) -> Money {
    wallet_ledger::get_balance(&cluster.wallet, UserId(user.to_string()))
        .await
        .expect("balance")
        .balance
}

#[tokio::test]
async fn ride_is_matched_finished_and_charged_exactly_once() {
    let cluster = Cluster::new();

    let gps_consumer = cluster.bus.consumer(DRIVER_GPS);
    let binding_consumer = cluster.bus.consumer(RIDE_DISPATCH);
    let debit_consumer = cluster.bus.consumer(WALLET_TRANSACTIONS);

    let gps_handler = DriverGpsHandler {
        geo_store: cluster.geo.clone(),
        store_timeout: TIMEOUT,
    };
    let binding_handler = DriverBindingHandler {
        order_store: cluster.orders.clone(),
        store_timeout: TIMEOUT,
    };
    let debit_handler = WalletDebitHandler {
        wallet_store: cluster.wallets.clone(),
        debit_timeout: TIMEOUT,
    };

    // Driver reports a position, which reaches the index through the ingestion topic.
    geo_index::update_location(
        &cluster.tracker,
        UpdateLocationRequest {
            user_id: DriverId("driver-1".to_string()),
            latitude: Latitude(-6.21),
            longitude: Longitude(106.81),
            timestamp: Some(Utc::now().to_rfc3339()),
        },
    )
    .await
    .expect("location accepted");
    assert_eq!(
        process_next(&gps_consumer, &gps_handler).await.expect("gps"),
        Outcome::Processed
    );

    // Passenger funds a wallet and books a ride.
    wallet_ledger::create_wallet(
        &cluster.wallet,
        CreateWalletRequest {
            user_id: UserId("passenger-1".to_string()),
        },
    )
    .await
    .expect("wallet");
    wallet_ledger::credit_balance(
        &cluster.wallet,
        UserId("passenger-1".to_string()),
        LedgerRequest {
            amount: Money(100_000),
            reference_id: Some("top-up-1".to_string()),
        },
    )
    .await
    .expect("credit");

    let created = order_ledger::create_order(
        &cluster.order,
        CreateOrderRequest {
            user_id: UserId("passenger-1".to_string()),
            pickup_lat: Latitude(-6.2088),
            pickup_long: Longitude(106.8456),
            dropoff_lat: Latitude(-6.1751),
            dropoff_long: Longitude(106.8650),
        },
    )
    .await
    .expect("order");
    assert_eq!(created.status, OrderStatus::CREATED);
    let order_id = created.order_id.to_string();

    let dispatched = dispatch_matcher::request_ride(
        &cluster.dispatch,
        RideRequest {
            pickup_lat: Latitude(-6.2088),
            pickup_long: Longitude(106.8456),
            passenger_id: UserId("passenger-1".to_string()),
            order_id: Some(order_id.clone()),
        },
    )
    .await
    .expect("dispatch");
    assert_eq!(dispatched.status, SearchStatus::DriversFound);
    assert_eq!(dispatched.driver_id, Some(DriverId("driver-1".to_string())));
    assert_eq!(dispatched.ride_id, Some(RideId(order_id.clone())));

    assert_eq!(
        process_next(&binding_consumer, &binding_handler)
            .await
            .expect("binding"),
        Outcome::Processed
    );
    let bound = order_ledger::get_order(&cluster.order, &order_id)
        .await
        .expect("order");
    assert_eq!(bound.driver_id, Some(DriverId("driver-1".to_string())));

    for status in ["STARTED", "FINISHED"] {
        order_ledger::update_order_status(
            &cluster.order,
            &order_id,
            UpdateOrderStatusRequest {
                status: status.to_string(),
            },
        )
        .await
        .expect("transition");
    }

    assert_eq!(
        process_next(&debit_consumer, &debit_handler)
            .await
            .expect("debit"),
        Outcome::Processed
    );
    let charged = Money(100_000 - created.price.0);
    assert_eq!(balance(&cluster, "passenger-1").await, charged);

    // The same debit delivered again leaves the balance alone.
    let debit = cluster.bus.records(WALLET_TRANSACTIONS);
    assert_eq!(debit.len(), 1);
    cluster.bus.replay(&debit[0]);
    assert_eq!(
        process_next(&debit_consumer, &debit_handler)
            .await
            .expect("replayed debit"),
        Outcome::Processed
    );
    assert_eq!(balance(&cluster, "passenger-1").await, charged);
    assert_eq!(
        cluster
            .wallets
            .transaction_count(&UserId("passenger-1".to_string())),
        2
    );
}

#[tokio::test]
async fn debit_for_a_missing_wallet_waits_for_the_wallet() {
    let cluster = Cluster::new();
    let debit_consumer = cluster.bus.consumer(WALLET_TRANSACTIONS);
    let debit_handler = WalletDebitHandler {
        wallet_store: cluster.wallets.clone(),
        debit_timeout: TIMEOUT,
    };

    cluster.bus.publish_raw(
        WALLET_TRANSACTIONS,
        "order-9",
        &serde_json::to_vec(&DebitBalanceEvent {
            amount: Money(25_000),
            user_id: "late-passenger".to_string(),
            reference: "order-9".to_string(),
        })
        .expect("json"),
    );

    assert_eq!(
        process_next(&debit_consumer, &debit_handler)
            .await
            .expect("first attempt"),
        Outcome::Retried
    );
    assert_eq!(debit_consumer.committed_offset(), 0);

    wallet_ledger::create_wallet(
        &cluster.wallet,
        CreateWalletRequest {
            user_id: UserId("late-passenger".to_string()),
        },
    )
    .await
    .expect("wallet");

    assert_eq!(
        process_next(&debit_consumer, &debit_handler)
            .await
            .expect("second attempt"),
        Outcome::Processed
    );
    assert_eq!(debit_consumer.committed_offset(), 1);
    assert_eq!(balance(&cluster, "late-passenger").await, Money(-25_000));
}

#[tokio::test]
async fn ride_without_nearby_drivers_leaves_the_order_unbound() {
    let cluster = Cluster::new();

    wallet_ledger::create_wallet(
        &cluster.wallet,
        CreateWalletRequest {
            user_id: UserId("passenger-2".to_string()),
        },
    )
    .await
    .expect("wallet");
    wallet_ledger::credit_balance(
        &cluster.wallet,
        UserId("passenger-2".to_string()),
        LedgerRequest {
            amount: Money(50_000),
            reference_id: None,
        },
    )
    .await
    .expect("credit");

    let created = order_ledger::create_order(
        &cluster.order,
        CreateOrderRequest {
            user_id: UserId("passenger-2".to_string()),
            pickup_lat: Latitude(-6.2088),
            pickup_long: Longitude(106.8456),
            dropoff_lat: Latitude(-6.2000),
            dropoff_long: Longitude(106.8500),
        },
    )
    .await
    .expect("order");

    let dispatched = dispatch_matcher::request_ride(
        &cluster.dispatch,
        RideRequest {
            pickup_lat: Latitude(-6.2088),
            pickup_long: Longitude(106.8456),
            passenger_id: UserId("passenger-2".to_string()),
            order_id: Some(created.order_id.to_string()),
        },
    )
    .await
    .expect("dispatch");

    assert_eq!(dispatched.status, SearchStatus::DriversNotFound);
    assert!(cluster.bus.records(RIDE_DISPATCH).is_empty());
    assert_eq!(cluster.orders.order_count(), 1);
}
