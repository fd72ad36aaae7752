/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

pub mod driver_gps;
pub mod payment_relay;
pub mod ride_dispatch;
pub mod stale_driver_evictor;
pub mod wallet_transactions;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{error, warn};

use crate::{
    common::kafka::{EventConsumer, EventMessage},
    consumed_event,
    supervisor::Shutdown,
    tools::error::AppError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerError {
    /// The message can never succeed. It is logged and committed so the partition moves on.
    Permanent(String),
    /// A dependency failed. The message is not committed and will be fetched again.
    Transient(String),
}

impl From<AppError> for ConsumerError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InvalidRequest(_)
            | AppError::UnprocessibleRequest(_)
            | AppError::DeserializationError(_) => ConsumerError::Permanent(err.message()),
            _ => ConsumerError::Transient(err.message()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    Discarded,
    Retried,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Processed => "PROCESSED",
            Outcome::Discarded => "DISCARDED",
            Outcome::Retried => "RETRIED",
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, message: &EventMessage) -> Result<(), ConsumerError>;
}

pub fn decode_event<T: DeserializeOwned>(message: &EventMessage) -> Result<T, ConsumerError> {
    serde_json::from_slice(&message.payload).map_err(|err| {
        ConsumerError::Permanent(format!(
            "Undecodable payload at {}/{}@{} : {err}",
            message.topic, message.partition, message.offset
        ))
    })
}

/// Fetches one message, runs the handler and acknowledges according to the result.
pub async fn process_next(
    consumer: &dyn EventConsumer,
    handler: &dyn EventHandler,
) -> Result<Outcome, AppError> {
    let message = consumer.fetch_message().await?;
    handle_message(consumer, handler, &message).await
}

pub async fn handle_message(
    consumer: &dyn EventConsumer,
    handler: &dyn EventHandler,
    message: &EventMessage,
) -> Result<Outcome, AppError> {
    let outcome = match handler.handle(message).await {
        Ok(()) => {
            consumer.commit_message(message).await?;
            Outcome::Processed
        }
        Err(ConsumerError::Permanent(reason)) => {
            error!(tag = "[Event Discarded]", handler = handler.name(), topic = %message.topic, partition = message.partition, offset = message.offset, reason = %reason);
            consumer.commit_message(message).await?;
            Outcome::Discarded
        }
        Err(ConsumerError::Transient(reason)) => {
            warn!(tag = "[Event Retry]", handler = handler.name(), topic = %message.topic, partition = message.partition, offset = message.offset, reason = %reason);
            consumer.redeliver(message).await?;
            Outcome::Retried
        }
    };

    consumed_event!(message.topic.as_str(), outcome.as_str());

    Ok(outcome)
}

/// Consumes until shutdown. A message already fetched is handled before the loop exits.
///
/// When a message could not be acknowledged or rewound, the consumer position may already be past
/// it. It is then held and handled again in-process before anything new is fetched.
pub async fn run_consumer(
    consumer: Arc<dyn EventConsumer>,
    handler: Arc<dyn EventHandler>,
    mut shutdown: Shutdown,
    retry_backoff: Duration,
) {
    let mut held: Option<EventMessage> = None;

    loop {
        let message = match held.take() {
            Some(message) => message,
            None => {
                let fetched = tokio::select! {
                    biased;
                    _ = shutdown.recv() => break,
                    fetched = consumer.fetch_message() => fetched,
                };
                match fetched {
                    Ok(message) => message,
                    Err(err) => {
                        error!(tag = "[Consumer - ERROR]", handler = handler.name(), error = %err);
                        if !back_off(&mut shutdown, retry_backoff).await {
                            break;
                        }
                        continue;
                    }
                }
            }
        };

        let backoff = match handle_message(consumer.as_ref(), handler.as_ref(), &message).await {
            Ok(Outcome::Retried) => true,
            Ok(_) => false,
            Err(err) => {
                error!(tag = "[Consumer - ERROR]", handler = handler.name(), topic = %message.topic, partition = message.partition, offset = message.offset, error = %err);
                held = Some(message);
                true
            }
        };

        if backoff && !back_off(&mut shutdown, retry_backoff).await {
            break;
        }
    }
}

/// Sleeps for `retry_backoff`. Returns `false` when shutdown fired first.
async fn back_off(shutdown: &mut Shutdown, retry_backoff: Duration) -> bool {
    tokio::select! {
        _ = shutdown.recv() => false,
        _ = tokio::time::sleep(retry_backoff) => true,
    }
}
