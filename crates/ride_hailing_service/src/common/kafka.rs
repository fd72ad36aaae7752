/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::Message,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
    ClientConfig, Offset, TopicPartitionList,
};
use serde::Serialize;
use tracing::{error, info};

use crate::{environment::KafkaConfig, published_event, tools::error::AppError};

/// A record taken off the bus, detached from the client that fetched it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Resolves only once the broker has acknowledged the record.
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), AppError>;
}

/// Pull side of the bus with explicit acknowledgement.
///
/// A message is acknowledged by `commit_message`. `redeliver` is the negative acknowledgement:
/// the partition is rewound so that the same message is fetched again before anything after it.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    async fn fetch_message(&self) -> Result<EventMessage, AppError>;
    async fn commit_message(&self, message: &EventMessage) -> Result<(), AppError>;
    async fn redeliver(&self, message: &EventMessage) -> Result<(), AppError>;
}

pub async fn publish_event<T>(
    publisher: &dyn EventPublisher,
    topic: &str,
    key: &str,
    message: &T,
) -> Result<(), AppError>
where
    T: Serialize,
{
    let payload =
        serde_json::to_vec(message).map_err(|err| AppError::SerializationError(err.to_string()))?;

    match publisher.publish(topic, key, &payload).await {
        Ok(()) => {
            published_event!(topic, "SUCCESS");
            info!(tag = "[Kafka Publish]", topic = %topic, key = %key);
            Ok(())
        }
        Err(err) => {
            published_event!(topic, "FAILURE");
            error!(tag = "[Kafka Publish - ERROR]", topic = %topic, key = %key, error = %err);
            Err(err)
        }
    }
}

pub struct KafkaEventPublisher {
    producer: FutureProducer,
    publish_timeout: Duration,
}

impl KafkaEventPublisher {
    pub fn new(cfg: &KafkaConfig) -> Result<Self, AppError> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", cfg.brokers.join(","))
            .set("message.timeout.ms", cfg.publish_timeout.to_string())
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .create::<FutureProducer>()
            .map_err(|err| AppError::KafkaPushFailed(err.to_string()))?;

        Ok(Self {
            producer,
            publish_timeout: Duration::from_millis(cfg.publish_timeout),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), AppError> {
        self.producer
            .send(
                FutureRecord::to(topic).key(key).payload(payload),
                Timeout::After(self.publish_timeout),
            )
            .await
            .map(|_| ())
            .map_err(|(err, _)| AppError::KafkaPushFailed(err.to_string()))
    }
}

pub struct KafkaEventConsumer {
    consumer: StreamConsumer,
    seek_timeout: Duration,
}

impl KafkaEventConsumer {
    pub fn new(cfg: &KafkaConfig, group_id: &str, topic: &str) -> Result<Self, AppError> {
        let consumer = ClientConfig::new()
            .set("bootstrap.servers", cfg.brokers.join(","))
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .create::<StreamConsumer>()
            .map_err(|err| AppError::KafkaConsumeFailed(err.to_string()))?;

        consumer
            .subscribe(&[topic])
            .map_err(|err| AppError::KafkaConsumeFailed(err.to_string()))?;

        info!(tag = "[Kafka Subscribe]", topic = %topic, group_id = %group_id);

        Ok(Self {
            consumer,
            seek_timeout: Duration::from_millis(cfg.publish_timeout),
        })
    }
}

#[async_trait]
impl EventConsumer for KafkaEventConsumer {
    async fn fetch_message(&self) -> Result<EventMessage, AppError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|err| AppError::KafkaConsumeFailed(err.to_string()))?;

        Ok(EventMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message
                .key()
                .map(|key| String::from_utf8_lossy(key).into_owned()),
            payload: message.payload().map(|p| p.to_vec()).unwrap_or_default(),
        })
    }

    async fn commit_message(&self, message: &EventMessage) -> Result<(), AppError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )
        .map_err(|err| AppError::KafkaConsumeFailed(err.to_string()))?;

        // Enqueued without waiting for the broker. A lost commit only causes a redelivery.
        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|err| AppError::KafkaConsumeFailed(err.to_string()))
    }

    async fn redeliver(&self, message: &EventMessage) -> Result<(), AppError> {
        self.consumer
            .seek(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset),
                self.seek_timeout,
            )
            .map_err(|err| AppError::KafkaConsumeFailed(err.to_string()))
    }
}
