/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use prometheus::{
    opts, register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

pub static INCOMING_API: once_cell::sync::Lazy<HistogramVec> = once_cell::sync::Lazy::new(|| {
    register_histogram_vec!(
        opts!("http_request_duration_seconds", "Incoming API requests").into(),
        &["method", "handler", "status_code", "code", "version"]
    )
    .expect("Failed to register incoming API metrics")
});

pub static CALL_EXTERNAL_API: once_cell::sync::Lazy<HistogramVec> =
    once_cell::sync::Lazy::new(|| {
        register_histogram_vec!(
            opts!("external_request_duration", "Call external API requests").into(),
            &["method", "host", "service", "status"]
        )
        .expect("Failed to register call external API metrics")
    });

pub static CONSUMED_EVENTS: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            "consumed_events",
            "Events consumed from the bus by outcome",
            &["topic", "outcome"]
        )
        .expect("Failed to register consumed events metrics")
    });

pub static PUBLISHED_EVENTS: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            "published_events",
            "Events published to the bus by status",
            &["topic", "status"]
        )
        .expect("Failed to register published events metrics")
    });

pub static EVICTED_DRIVERS: once_cell::sync::Lazy<IntCounter> = once_cell::sync::Lazy::new(|| {
    register_int_counter!("evicted_drivers", "Drivers evicted from the geo index")
        .expect("Failed to register evicted drivers metrics")
});

pub static RELAYED_PAYMENT_INTENTS: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            "relayed_payment_intents",
            "Pending payment intents picked up by the relay",
            &["status"]
        )
        .expect("Failed to register relayed payment intents metrics")
    });

pub static TERMINATION: once_cell::sync::Lazy<HistogramVec> = once_cell::sync::Lazy::new(|| {
    register_histogram_vec!(
        opts!("termination", "Terminations").into(),
        &["type", "version"]
    )
    .expect("Failed to register termination metrics")
});

/// Observes the latency of an incoming request under its method, route, status and error code.
#[macro_export]
macro_rules! incoming_api {
    ($method:expr, $endpoint:expr, $status:expr, $code:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        let version = std::env::var("DEPLOYMENT_VERSION").unwrap_or("DEV".to_string());
        $crate::tools::prometheus::INCOMING_API
            .with_label_values(&[$method, $endpoint, $status, $code, version.as_str()])
            .observe(duration);
    };
}

/// Observes the latency of a call to a peer service.
#[macro_export]
macro_rules! call_external_api {
    ($method:expr, $host:expr, $path:expr, $status:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        $crate::tools::prometheus::CALL_EXTERNAL_API
            .with_label_values(&[$method, $host, $path, $status])
            .observe(duration);
    };
}

#[macro_export]
macro_rules! consumed_event {
    ($topic:expr, $outcome:expr) => {
        $crate::tools::prometheus::CONSUMED_EVENTS
            .with_label_values(&[$topic, $outcome])
            .inc();
    };
}

#[macro_export]
macro_rules! published_event {
    ($topic:expr, $status:expr) => {
        $crate::tools::prometheus::PUBLISHED_EVENTS
            .with_label_values(&[$topic, $status])
            .inc();
    };
}

#[macro_export]
macro_rules! termination {
    ($type_:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        let version = std::env::var("DEPLOYMENT_VERSION").unwrap_or("DEV".to_string());
        $crate::tools::prometheus::TERMINATION
            .with_label_values(&[$type_, version.as_str()])
            .observe(duration);
    };
}

/// Builds the `/metrics` middleware with every service collector registered on it.
///
/// Build it once per process and clone it into each actix worker.
///
/// # Panics
///
/// If the registry rejects one of the collectors.
pub fn prometheus_metrics() -> PrometheusMetrics {
    let prometheus = PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus Metrics");

    prometheus
        .registry
        .register(Box::new(INCOMING_API.to_owned()))
        .expect("Failed to register incoming API metrics");

    prometheus
        .registry
        .register(Box::new(CALL_EXTERNAL_API.to_owned()))
        .expect("Failed to register call external API metrics");

    prometheus
        .registry
        .register(Box::new(CONSUMED_EVENTS.to_owned()))
        .expect("Failed to register consumed events metrics");

    prometheus
        .registry
        .register(Box::new(PUBLISHED_EVENTS.to_owned()))
        .expect("Failed to register published events metrics");

    prometheus
        .registry
        .register(Box::new(EVICTED_DRIVERS.to_owned()))
        .expect("Failed to register evicted drivers metrics");

    prometheus
        .registry
        .register(Box::new(RELAYED_PAYMENT_INTENTS.to_owned()))
        .expect("Failed to register relayed payment intents metrics");

    prometheus
        .registry
        .register(Box::new(TERMINATION.to_owned()))
        .expect("Failed to register termination metrics");

    prometheus
}
