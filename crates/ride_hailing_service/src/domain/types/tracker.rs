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
pub struct UpdateLocationRequest {
    pub user_id: DriverId,
    pub latitude: Latitude,
    pub longitude: Longitude,
    /// RFC 3339. Absent means the time of the request.
    pub timestamp: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct UpdateLocationResponse {
    pub success: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NearbyDriversRequest {
    pub latitude: Latitude,
    pub longitude: Longitude,
    pub radius: Radius,
    pub limit: Option<usize>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct NearbyDriversResponse {
    pub drivers: Vec<NearbyDriver>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationResponse {
    pub driver_id: DriverId,
    pub latitude: Latitude,
    pub longitude: Longitude,
    pub last_seen_at: TimeStamp,
}

/// Value of a `driver-gps` record, keyed by the driver id.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LocationEvent {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timestamp: String,
}
