/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use actix_web::{
    get,
    web::{Data, Json},
};
use serde::{Deserialize, Serialize};

use crate::{
    environment::{DispatchState, OrderState, TrackerState, WalletState},
    redis::GeoStore,
    storage::{OrderStore, WalletStore},
    tools::error::AppError,
};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ResponseData {
    pub result: String,
}

fn service_is_up() -> Json<ResponseData> {
    Json(ResponseData {
        result: "Service Is Up".to_string(),
    })
}

#[get("/healthcheck")]
pub async fn tracker_health_check(
    data: Data<TrackerState>,
) -> Result<Json<ResponseData>, AppError> {
    data.geo_store.health_check().await?;
    Ok(service_is_up())
}

#[get("/healthcheck")]
pub async fn dispatch_health_check(
    _data: Data<DispatchState>,
) -> Result<Json<ResponseData>, AppError> {
    Ok(service_is_up())
}

#[get("/healthcheck")]
pub async fn order_health_check(data: Data<OrderState>) -> Result<Json<ResponseData>, AppError> {
    data.order_store.health_check().await?;
    Ok(service_is_up())
}

#[get("/healthcheck")]
pub async fn wallet_health_check(
    data: Data<WalletState>,
) -> Result<Json<ResponseData>, AppError> {
    data.wallet_store.health_check().await?;
    Ok(service_is_up())
}
