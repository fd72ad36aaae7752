/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use super::{decode_event, ConsumerError, EventHandler};
use crate::{
    common::kafka::EventMessage,
    domain::{action::order_ledger::bind_driver, types::dispatch::RideDispatchedEvent},
    storage::{DriverBinding, OrderStore},
};

/// Binds dispatched drivers to their orders from `ride-dispatch`.
pub struct DriverBindingHandler {
    pub order_store: Arc<dyn OrderStore>,
    pub store_timeout: Duration,
}

#[async_trait]
impl EventHandler for DriverBindingHandler {
    fn name(&self) -> &'static str {
        "driver_binding"
    }

    async fn handle(&self, message: &EventMessage) -> Result<(), ConsumerError> {
        let event: RideDispatchedEvent = decode_event(message)?;

        match bind_driver(self.order_store.as_ref(), &event, self.store_timeout).await? {
            DriverBinding::Bound | DriverBinding::AlreadyBound => Ok(()),
            DriverBinding::Conflict(bound) => Err(ConsumerError::Permanent(format!(
                "Order {} already bound to driver {}",
                event.ride_id, bound.0
            ))),
            DriverBinding::OrderNotFound => Err(ConsumerError::Permanent(format!(
                "Order {} not found",
                event.ride_id
            ))),
        }
    }
}
