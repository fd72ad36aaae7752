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
pub struct RideRequest {
    pub pickup_lat: Latitude,
    pub pickup_long: Longitude,
    pub passenger_id: UserId,
    pub order_id: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RideResponse {
    pub status: SearchStatus,
    pub ride_id: Option<RideId>,
    pub driver_id: Option<DriverId>,
}

/// Value of a `ride-dispatch` record, keyed by the driver id.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RideDispatchedEvent {
    pub ride_id: String,
    pub passenger_id: String,
    pub driver_id: String,
    pub pickup_lat: f64,
    pub pickup_long: f64,
    /// Unix seconds.
    pub timestamp: i64,
}
