/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use geo::{point, HaversineDistance};

use super::types::*;
use crate::tools::error::AppError;

/// Latitude bound accepted by the Redis geo commands.
pub const MAX_GEO_LATITUDE: f64 = 85.05112878;
pub const KM_PER_DEGREE: f64 = 111.32;
pub const BASE_FARE: f64 = 10000.0;
pub const FARE_PER_KM: f64 = 3000.0;

pub fn validate_point(Point { lat, lon }: &Point) -> Result<(), AppError> {
    let (Latitude(lat), Longitude(lon)) = (*lat, *lon);
    if !lat.is_finite() || !(-MAX_GEO_LATITUDE..=MAX_GEO_LATITUDE).contains(&lat) {
        return Err(AppError::InvalidRequest(format!(
            "Latitude out of range : {lat}"
        )));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::InvalidRequest(format!(
            "Longitude out of range : {lon}"
        )));
    }
    Ok(())
}

/// Straight-line distance on the lat/lon plane, scaled by the length of one degree at the equator.
pub fn planar_distance_km(pickup: &Point, dropoff: &Point) -> f64 {
    let dlat = dropoff.lat.0 - pickup.lat.0;
    let dlon = dropoff.lon.0 - pickup.lon.0;
    (dlat * dlat + dlon * dlon).sqrt() * KM_PER_DEGREE
}

/// `round(10000 + planar_distance_km * 3000)`, half away from zero.
pub fn calculate_price(pickup: &Point, dropoff: &Point) -> Money {
    Money((BASE_FARE + planar_distance_km(pickup, dropoff) * FARE_PER_KM).round() as i64)
}

pub fn distance_between_in_km(latlong1: &Point, latlong2: &Point) -> f64 {
    let p1 = point!(x: latlong1.lon.0, y: latlong1.lat.0);
    let p2 = point!(x: latlong2.lon.0, y: latlong2.lat.0);
    p1.haversine_distance(&p2) / 1000.0
}

/// Clamps a reported timestamp so that a skewed client clock cannot push `last seen` into the future.
pub fn clamp_to_now(TimeStamp(ts): TimeStamp, now: DateTime<Utc>) -> TimeStamp {
    TimeStamp(std::cmp::min(ts, now))
}

pub async fn with_timeout<T, F>(duration: Duration, dependency: &str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| AppError::DependencyTimeout(dependency.to_string()))?
}
