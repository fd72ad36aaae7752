/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use std::{env::var, sync::Arc, time::Duration};

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::{
    common::kafka::{EventPublisher, KafkaEventPublisher},
    outbound::{
        external::{TrackerClient, WalletClient},
        BalanceLookup, DriverLocator,
    },
    redis::{commands::RedisConnectionPool, GeoStore},
    storage::{
        postgres::{connect, PgOrderStore, PgWalletStore},
        OrderStore, WalletStore,
    },
    tools::logger::LoggerConfig,
};

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub workers: usize,
    /// Milliseconds.
    pub request_timeout: u64,
    /// Seconds.
    pub shutdown_grace_period: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    /// Milliseconds.
    pub publish_timeout: u64,
    /// Milliseconds to wait before a transiently failed message is fetched again.
    pub retry_backoff: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TopicsConfig {
    pub driver_gps: String,
    pub ride_dispatch: String,
    pub wallet_transactions: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_pool_size: usize,
    pub redis_partition: usize,
    pub reconnect_max_attempts: u32,
    pub reconnect_delay: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds.
    pub idle_timeout: u64,
    /// Seconds.
    pub acquire_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PeerConfig {
    pub url: String,
    /// Milliseconds.
    pub timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    pub server_cfg: ServerConfig,
    pub logger_cfg: LoggerConfig,
    pub redis_cfg: RedisConfig,
    pub kafka_cfg: KafkaConfig,
    pub topics: TopicsConfig,
    pub consumer_group: String,
    /// Seconds without a report after which a driver is evicted.
    pub driver_location_ttl: u64,
    /// Seconds between eviction sweeps.
    pub eviction_interval: u64,
    /// Milliseconds.
    pub store_timeout: u64,
    pub nearby_max_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    pub server_cfg: ServerConfig,
    pub logger_cfg: LoggerConfig,
    pub kafka_cfg: KafkaConfig,
    pub topics: TopicsConfig,
    pub tracker: PeerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrderConfig {
    pub server_cfg: ServerConfig,
    pub logger_cfg: LoggerConfig,
    pub kafka_cfg: KafkaConfig,
    pub topics: TopicsConfig,
    pub database_cfg: DatabaseConfig,
    pub consumer_group: String,
    pub wallet: PeerConfig,
    /// Milliseconds.
    pub store_timeout: u64,
    /// Seconds between sweeps of unpublished payment intents.
    pub payment_relay_interval: u64,
    pub payment_relay_batch_size: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    pub server_cfg: ServerConfig,
    pub logger_cfg: LoggerConfig,
    pub kafka_cfg: KafkaConfig,
    pub topics: TopicsConfig,
    pub database_cfg: DatabaseConfig,
    pub consumer_group: String,
    /// Milliseconds.
    pub store_timeout: u64,
    /// Milliseconds allowed for one debit taken off the bus.
    pub debit_timeout: u64,
}

/// Constraints the Dhall types cannot express, checked once the config is read.
pub trait ConfigCheck {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

fn positive(field: &str, value: u64) -> Result<(), String> {
    if value == 0 {
        return Err(format!("{field} must be greater than zero"));
    }
    Ok(())
}

impl ConfigCheck for TrackerConfig {
    fn check(&self) -> Result<(), String> {
        positive("driver_location_ttl", self.driver_location_ttl)?;
        positive("eviction_interval", self.eviction_interval)
    }
}

impl ConfigCheck for DispatchConfig {}

impl ConfigCheck for OrderConfig {
    fn check(&self) -> Result<(), String> {
        positive("payment_relay_interval", self.payment_relay_interval)?;
        if self.payment_relay_batch_size <= 0 {
            return Err("payment_relay_batch_size must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl ConfigCheck for WalletConfig {}

pub fn read_dhall_config<T>(config_path: &str) -> Result<T, String>
where
    T: DeserializeOwned + ConfigCheck,
{
    let config = serde_dhall::from_file(config_path)
        .parse::<T>()
        .map_err(|err| format!("Error reading config: {err}"))?;
    config
        .check()
        .map_err(|err| format!("Invalid config {config_path}: {err}"))?;
    Ok(config)
}

/// Reads the config named by `DHALL_CONFIG`, falling back to `./dhall_config/<default_file>`.
pub fn load_config<T>(default_file: &str) -> T
where
    T: DeserializeOwned + ConfigCheck,
{
    let dhall_config_path =
        var("DHALL_CONFIG").unwrap_or_else(|_| format!("./dhall_config/{default_file}"));
    read_dhall_config(&dhall_config_path).unwrap_or_else(|err| {
        eprintln!("Dhall Config Reading Error : {err}");
        std::process::exit(1);
    })
}

fn peer_client(peer: &PeerConfig) -> (Client, Url) {
    let client = Client::builder()
        .timeout(Duration::from_millis(peer.timeout))
        .build()
        .expect("Failed to build http client");
    let url = Url::parse(&peer.url).expect("Invalid peer url");
    (client, url)
}

#[derive(Clone)]
pub struct TrackerState {
    pub geo_store: Arc<dyn GeoStore>,
    pub publisher: Arc<dyn EventPublisher>,
    pub driver_gps_topic: String,
    pub store_timeout: Duration,
    pub nearby_max_limit: usize,
}

impl TrackerState {
    pub async fn new(cfg: &TrackerConfig) -> TrackerState {
        let redis = RedisConnectionPool::new(&cfg.redis_cfg)
            .await
            .expect("Failed to create Redis connection pool");

        let publisher =
            KafkaEventPublisher::new(&cfg.kafka_cfg).expect("Failed to create Kafka producer");

        TrackerState {
            geo_store: Arc::new(redis),
            publisher: Arc::new(publisher),
            driver_gps_topic: cfg.topics.driver_gps.to_owned(),
            store_timeout: Duration::from_millis(cfg.store_timeout),
            nearby_max_limit: cfg.nearby_max_limit,
        }
    }
}

#[derive(Clone)]
pub struct DispatchState {
    pub driver_locator: Arc<dyn DriverLocator>,
    pub publisher: Arc<dyn EventPublisher>,
    pub ride_dispatch_topic: String,
}

impl DispatchState {
    pub fn new(cfg: &DispatchConfig) -> DispatchState {
        let (client, url) = peer_client(&cfg.tracker);

        let publisher =
            KafkaEventPublisher::new(&cfg.kafka_cfg).expect("Failed to create Kafka producer");

        DispatchState {
            driver_locator: Arc::new(TrackerClient::new(client, url)),
            publisher: Arc::new(publisher),
            ride_dispatch_topic: cfg.topics.ride_dispatch.to_owned(),
        }
    }
}

#[derive(Clone)]
pub struct OrderState {
    pub order_store: Arc<dyn OrderStore>,
    pub balance_lookup: Arc<dyn BalanceLookup>,
    pub publisher: Arc<dyn EventPublisher>,
    pub wallet_transactions_topic: String,
    pub store_timeout: Duration,
}

impl OrderState {
    pub async fn new(cfg: &OrderConfig) -> OrderState {
        let pool = connect(&cfg.database_cfg)
            .await
            .expect("Failed to connect to the order database");

        let (client, url) = peer_client(&cfg.wallet);

        let publisher =
            KafkaEventPublisher::new(&cfg.kafka_cfg).expect("Failed to create Kafka producer");

        OrderState {
            order_store: Arc::new(PgOrderStore::new(pool)),
            balance_lookup: Arc::new(WalletClient::new(client, url)),
            publisher: Arc::new(publisher),
            wallet_transactions_topic: cfg.topics.wallet_transactions.to_owned(),
            store_timeout: Duration::from_millis(cfg.store_timeout),
        }
    }
}

#[derive(Clone)]
pub struct WalletState {
    pub wallet_store: Arc<dyn WalletStore>,
    pub store_timeout: Duration,
}

impl WalletState {
    pub async fn new(cfg: &WalletConfig) -> WalletState {
        let pool = connect(&cfg.database_cfg)
            .await
            .expect("Failed to connect to the wallet database");

        WalletState {
            wallet_store: Arc::new(PgWalletStore::new(pool)),
            store_timeout: Duration::from_millis(cfg.store_timeout),
        }
    }
}
