/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use actix_web::{
    get, post,
    web::{Data, Json, Path},
};

use crate::{
    common::types::*,
    domain::{action::geo_index, types::tracker::*},
    environment::TrackerState,
    tools::error::AppError,
};

#[post("/tracker/location")]
pub async fn update_location(
    data: Data<TrackerState>,
    param_obj: Json<UpdateLocationRequest>,
) -> Result<Json<UpdateLocationResponse>, AppError> {
    let request_body = param_obj.into_inner();

    Ok(Json(
        geo_index::update_location(&data, request_body).await?,
    ))
}

#[post("/internal/drivers/nearby")]
pub async fn get_nearby_drivers(
    data: Data<TrackerState>,
    param_obj: Json<NearbyDriversRequest>,
) -> Result<Json<NearbyDriversResponse>, AppError> {
    let request_body = param_obj.into_inner();

    Ok(Json(
        geo_index::get_nearby_drivers(&data, request_body).await?,
    ))
}

#[get("/internal/drivers/{driverId}/location")]
pub async fn get_driver_location(
    data: Data<TrackerState>,
    path: Path<String>,
) -> Result<Json<DriverLocationResponse>, AppError> {
    let driver_id = DriverId(path.into_inner());

    Ok(Json(
        geo_index::get_driver_location(&data, driver_id).await?,
    ))
}
