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
    domain::{action::wallet_ledger::apply_debit_event, types::order::DebitBalanceEvent},
    storage::WalletStore,
};

/// Applies debits from `wallet-transactions`. The order id in `Reference` keeps it idempotent.
pub struct WalletDebitHandler {
    pub wallet_store: Arc<dyn WalletStore>,
    pub debit_timeout: Duration,
}

#[async_trait]
impl EventHandler for WalletDebitHandler {
    fn name(&self) -> &'static str {
        "wallet_debit"
    }

    async fn handle(&self, message: &EventMessage) -> Result<(), ConsumerError> {
        let event: DebitBalanceEvent = decode_event(message)?;

        apply_debit_event(self.wallet_store.as_ref(), &event, self.debit_timeout).await?;

        Ok(())
    }
}
