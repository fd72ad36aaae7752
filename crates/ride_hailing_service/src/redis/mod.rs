/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

pub mod commands;
pub mod keys;

use async_trait::async_trait;

use crate::{common::types::*, tools::error::AppError};

/// Geospatial index of driver positions and their last-seen times.
///
/// The indices are always mutated together: a driver is either present in all of them or in none.
#[async_trait]
pub trait GeoStore: Send + Sync {
    /// Returns `false` when the stored report is newer than `reported_at` and nothing was written.
    /// `seen_at` is the last-seen time that eviction compares against.
    async fn upsert_position(
        &self,
        driver_id: &DriverId,
        location: &Point,
        reported_at: TimeStamp,
        seen_at: TimeStamp,
    ) -> Result<bool, AppError>;

    /// Drivers within `radius` of `center`, nearest first, at most `limit` of them.
    async fn search_nearby(
        &self,
        center: &Point,
        radius: Radius,
        limit: usize,
    ) -> Result<Vec<NearbyDriver>, AppError>;

    async fn get_position(&self, driver_id: &DriverId) -> Result<Option<DriverPosition>, AppError>;

    /// Removes every driver last seen strictly before `cutoff` and returns their ids.
    async fn evict_seen_before(&self, cutoff: TimeStamp) -> Result<Vec<DriverId>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
