/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    common::{kafka::publish_event, types::*, utils::validate_point},
    domain::{action::geo_index::DEFAULT_NEARBY_LIMIT, types::dispatch::*},
    environment::DispatchState,
    outbound::DriverLocator,
    tools::error::AppError,
};

pub const SEARCH_RADIUS_KM: f64 = 5.0;

/// Finds the nearest driver around the pickup point and announces the match on `ride-dispatch`.
///
/// Either the event is acknowledged by the broker and `DRIVERS_FOUND` is returned, or the call
/// fails. With no driver in range nothing is published.
#[macros::measure_duration]
pub async fn request_ride(
    data: &DispatchState,
    request: RideRequest,
) -> Result<RideResponse, AppError> {
    let RideRequest {
        pickup_lat,
        pickup_long,
        passenger_id: UserId(passenger_id),
        order_id,
    } = request;

    if passenger_id.trim().is_empty() {
        return Err(AppError::InvalidRequest("passengerId is required".to_string()));
    }

    let pickup = Point {
        lat: pickup_lat,
        lon: pickup_long,
    };
    validate_point(&pickup)?;

    let ride_id = match order_id.as_deref().map(str::trim) {
        Some(order_id) if !order_id.is_empty() => parse_order_id(order_id)?.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    let drivers = data
        .driver_locator
        .nearby_drivers(&pickup, Radius(SEARCH_RADIUS_KM), DEFAULT_NEARBY_LIMIT)
        .await?;

    let Some(nearest) = drivers
        .into_iter()
        .filter(|driver| driver.distance_km <= SEARCH_RADIUS_KM)
        .min_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
    else {
        warn!(tag = "[No Drivers Found]", passenger_id = %passenger_id, lat = %pickup_lat.0, lon = %pickup_long.0);
        return Ok(RideResponse {
            status: SearchStatus::DriversNotFound,
            ride_id: None,
            driver_id: None,
        });
    };

    let DriverId(driver_id) = nearest.driver_id;

    let event = RideDispatchedEvent {
        ride_id: ride_id.to_owned(),
        passenger_id: passenger_id.to_owned(),
        driver_id: driver_id.to_owned(),
        pickup_lat: pickup_lat.0,
        pickup_long: pickup_long.0,
        timestamp: Utc::now().timestamp(),
    };

    publish_event(
        data.publisher.as_ref(),
        &data.ride_dispatch_topic,
        &driver_id,
        &event,
    )
    .await?;

    info!(tag = "[Ride Dispatched]", ride_id = %ride_id, driver_id = %driver_id, distance_km = %nearest.distance_km);

    Ok(RideResponse {
        status: SearchStatus::DriversFound,
        ride_id: Some(RideId(ride_id)),
        driver_id: Some(DriverId(driver_id)),
    })
}
