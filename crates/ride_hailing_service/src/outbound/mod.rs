/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

pub mod external;

use async_trait::async_trait;

use crate::{common::types::*, tools::error::AppError};

/// Tracker lookups made by the dispatch service.
#[async_trait]
pub trait DriverLocator: Send + Sync {
    async fn nearby_drivers(
        &self,
        center: &Point,
        radius: Radius,
        limit: usize,
    ) -> Result<Vec<NearbyDriver>, AppError>;
}

/// Wallet lookups made by the order service.
#[async_trait]
pub trait BalanceLookup: Send + Sync {
    async fn balance(&self, user_id: &UserId) -> Result<Money, AppError>;
}
