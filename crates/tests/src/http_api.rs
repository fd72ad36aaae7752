/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::{sync::Arc, time::Duration};

use actix_web::{
    http::StatusCode,
    test::{self, TestRequest},
    web, App,
};
use ride_hailing_service::{
    common::types::*,
    domain::{
        api,
        types::{order::*, tracker::*, wallet::*},
    },
    environment::{OrderState, TrackerState, WalletState},
    testing::*,
    tools::error::{AppError, ErrorBody},
};
use serde_json::json;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(1);

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _| AppError::UnprocessibleRequest(err.to_string()).into())
}

fn wallet_state() -> WalletState {
    WalletState {
        wallet_store: Arc::new(InMemoryWalletStore::default()),
        store_timeout: TIMEOUT,
    }
}

fn order_state(balance: i64) -> OrderState {
    OrderState {
        order_store: Arc::new(InMemoryOrderStore::default()),
        balance_lookup: Arc::new(StaticBalanceLookup(Money(balance))),
        publisher: Arc::new(InMemoryEventBus::default()),
        wallet_transactions_topic: "wallet-transactions".to_string(),
        store_timeout: TIMEOUT,
    }
}

fn create_order_body() -> serde_json::Value {
    json!({
        "userId": "passenger-1",
        "pickupLat": -6.2088,
        "pickupLong": 106.8456,
        "dropoffLat": -6.1751,
        "dropoffLong": 106.8650
    })
}

#[actix_web::test]
async fn wallet_endpoints() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(wallet_state()))
            .app_data(json_config())
            .configure(api::wallet_handler),
    )
    .await;

    let req = TestRequest::get()
        .uri("/internal/wallets/u1/balance")
        .to_request();
    let resp: BalanceResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp.balance, Money(0));

    let req = TestRequest::post()
        .uri("/wallets/u1/credit")
        .set_json(json!({ "amount": 500 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.error_code, "WALLET_NOT_FOUND");

    let req = TestRequest::post()
        .uri("/wallets")
        .set_json(json!({ "userId": "u1" }))
        .to_request();
    let resp: BalanceResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp.balance, Money(0));

    for _ in 0..2 {
        let req = TestRequest::post()
            .uri("/wallets/u1/credit")
            .set_json(json!({ "amount": 500, "referenceId": "top-up-1" }))
            .to_request();
        let resp: LedgerResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp.new_balance, Money(500));
    }

    let req = TestRequest::post()
        .uri("/wallets/u1/debit")
        .set_json(json!({ "amount": "200" }))
        .to_request();
    let resp: LedgerResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp.new_balance, Money(300));

    let req = TestRequest::post()
        .uri("/wallets/u1/debit")
        .set_json(json!({ "amount": 0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = TestRequest::post()
        .uri("/wallets/u1/debit")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"amount\":")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn order_endpoints() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(order_state(1_000_000)))
            .app_data(json_config())
            .configure(api::order_handler),
    )
    .await;

    let req = TestRequest::post()
        .uri("/orders")
        .set_json(create_order_body())
        .to_request();
    let created: CreateOrderResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(created.status, OrderStatus::CREATED);

    let req = TestRequest::get()
        .uri(&format!("/orders/{}", created.order_id))
        .to_request();
    let order: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(order["status"], "CREATED");
    assert_eq!(order["price"], created.price.0);
    assert_eq!(order["driverId"], serde_json::Value::Null);

    let req = TestRequest::put()
        .uri(&format!("/orders/{}/status", created.order_id))
        .set_json(json!({ "status": "FINISHED" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);

    let req = TestRequest::put()
        .uri(&format!("/orders/{}/status", created.order_id))
        .set_json(json!({ "status": "STARTED" }))
        .to_request();
    let started: UpdateOrderStatusResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(started.status, OrderStatus::STARTED);

    let req = TestRequest::get().uri("/orders/not-a-uuid").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = TestRequest::get()
        .uri(&format!("/orders/{}", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn order_beyond_balance_is_refused() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(order_state(5_000)))
            .app_data(json_config())
            .configure(api::order_handler),
    )
    .await;

    let req = TestRequest::post()
        .uri("/orders")
        .set_json(create_order_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.error_code, "INSUFFICIENT_BALANCE");
}

#[actix_web::test]
async fn tracker_endpoints() {
    let bus = Arc::new(InMemoryEventBus::default());
    let state = TrackerState {
        geo_store: Arc::new(InMemoryGeoStore::default()),
        publisher: bus.clone(),
        driver_gps_topic: "driver-gps".to_string(),
        store_timeout: TIMEOUT,
        nearby_max_limit: 50,
    };
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .app_data(json_config())
            .configure(api::tracker_handler),
    )
    .await;

    let req = TestRequest::post()
        .uri("/tracker/location")
        .set_json(json!({ "userId": "driver-1", "latitude": -6.21, "longitude": 106.81 }))
        .to_request();
    let resp: UpdateLocationResponse = test::call_and_read_body_json(&app, req).await;
    assert!(resp.success);
    assert_eq!(bus.records("driver-gps").len(), 1);

    let req = TestRequest::post()
        .uri("/tracker/location")
        .set_json(json!({ "userId": "driver-1", "latitude": 100.0, "longitude": 106.81 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = TestRequest::post()
        .uri("/internal/drivers/nearby")
        .set_json(json!({ "latitude": -6.21, "longitude": 106.81, "radius": 0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = TestRequest::post()
        .uri("/internal/drivers/nearby")
        .set_json(json!({ "latitude": -6.21, "longitude": 106.81, "radius": 5 }))
        .to_request();
    let resp: NearbyDriversResponse = test::call_and_read_body_json(&app, req).await;
    assert!(resp.drivers.is_empty());

    let req = TestRequest::get()
        .uri("/internal/drivers/driver-1/location")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = TestRequest::get().uri("/healthcheck").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
