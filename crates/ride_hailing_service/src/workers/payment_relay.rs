/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::{sync::Arc, time::Duration};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::{
    common::kafka::EventPublisher, domain::action::order_ledger::relay_pending_payments,
    storage::OrderStore, supervisor::Shutdown,
};

pub struct PaymentRelay {
    pub publisher: Arc<dyn EventPublisher>,
    pub topic: String,
    pub order_store: Arc<dyn OrderStore>,
    pub batch_size: i64,
    pub every: Duration,
    pub store_timeout: Duration,
}

/// Republishes payment intents whose debit event never reached the bus.
pub async fn run_payment_relay(relay: PaymentRelay, mut shutdown: Shutdown) {
    let mut timer = interval(relay.every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            _ = timer.tick() => {
                match relay_pending_payments(
                    relay.publisher.as_ref(),
                    &relay.topic,
                    relay.order_store.as_ref(),
                    relay.batch_size,
                    relay.store_timeout,
                )
                .await
                {
                    Ok(0) => {}
                    Ok(published) => info!(tag = "[Payment Relay]", published = published),
                    Err(err) => error!(tag = "[Payment Relay - ERROR]", error = %err),
                }
            }
        }
    }
}
