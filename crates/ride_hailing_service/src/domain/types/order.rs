/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use serde::{Deserialize, Serialize};

use crate::common::types::*;

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub pickup_lat: Latitude,
    pub pickup_long: Longitude,
    pub dropoff_lat: Latitude,
    pub dropoff_long: Longitude,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub price: Money,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub updated_at: TimeStamp,
}

/// Value of a `wallet-transactions` record, keyed by the order id.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DebitBalanceEvent {
    #[serde(rename = "Amount")]
    pub amount: Money,
    #[serde(rename = "UserID")]
    pub user_id: String,
    #[serde(rename = "Reference")]
    pub reference: String,
}
