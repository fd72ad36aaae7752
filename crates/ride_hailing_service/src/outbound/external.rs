/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use async_trait::async_trait;
use reqwest::{Client, Method, Url};

use super::{BalanceLookup, DriverLocator};
use crate::{
    common::types::*,
    domain::types::{
        tracker::{NearbyDriversRequest, NearbyDriversResponse},
        wallet::BalanceResponse,
    },
    tools::{callapi::call_api, error::AppError},
};

fn endpoint(base_url: &Url, segments: &[&str]) -> Result<Url, AppError> {
    let mut url = base_url.to_owned();
    url.path_segments_mut()
        .map_err(|_| AppError::InvalidConfiguration(format!("Invalid base url : {base_url}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub struct TrackerClient {
    client: Client,
    base_url: Url,
}

impl TrackerClient {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl DriverLocator for TrackerClient {
    async fn nearby_drivers(
        &self,
        center: &Point,
        radius: Radius,
        limit: usize,
    ) -> Result<Vec<NearbyDriver>, AppError> {
        let url = endpoint(&self.base_url, &["internal", "drivers", "nearby"])?;

        let resp: NearbyDriversResponse = call_api(
            &self.client,
            Method::POST,
            &url,
            vec![],
            Some(NearbyDriversRequest {
                latitude: center.lat,
                longitude: center.lon,
                radius,
                limit: Some(limit),
            }),
        )
        .await?;

        Ok(resp.drivers)
    }
}

pub struct WalletClient {
    client: Client,
    base_url: Url,
}

impl WalletClient {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl BalanceLookup for WalletClient {
    async fn balance(&self, UserId(user_id): &UserId) -> Result<Money, AppError> {
        let url = endpoint(
            &self.base_url,
            &["internal", "wallets", user_id.as_str(), "balance"],
        )?;

        let resp: BalanceResponse =
            call_api::<BalanceResponse, ()>(&self.client, Method::GET, &url, vec![], None).await?;

        Ok(resp.balance)
    }
}
