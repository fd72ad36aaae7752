/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    common::{kafka::publish_event, types::*, utils::*},
    domain::types::tracker::*,
    environment::TrackerState,
    redis::GeoStore,
    tools::{error::AppError, prometheus::EVICTED_DRIVERS},
};

pub const DEFAULT_NEARBY_LIMIT: usize = 10;

/// Parses an RFC 3339 report time. Anything else is treated as reported `now`.
pub fn parse_report_time(timestamp: &str, now: DateTime<Utc>) -> TimeStamp {
    DateTime::parse_from_rfc3339(timestamp.trim())
        .map(|ts| TimeStamp(ts.with_timezone(&Utc)))
        .unwrap_or(TimeStamp(now))
}

/// Accepts a position report and hands it to the ingestion topic keyed by the driver.
#[macros::measure_duration]
pub async fn update_location(
    data: &TrackerState,
    request: UpdateLocationRequest,
) -> Result<UpdateLocationResponse, AppError> {
    let UpdateLocationRequest {
        user_id: DriverId(driver_id),
        latitude,
        longitude,
        timestamp,
    } = request;

    if driver_id.trim().is_empty() {
        return Err(AppError::InvalidRequest("userId is required".to_string()));
    }

    validate_point(&Point {
        lat: latitude,
        lon: longitude,
    })?;

    let reported_at = match timestamp.as_deref().map(str::trim) {
        None | Some("") => Utc::now(),
        Some(ts) => DateTime::parse_from_rfc3339(ts)
            .map_err(|err| AppError::InvalidRequest(format!("Invalid timestamp {ts} : {err}")))?
            .with_timezone(&Utc),
    };

    let event = LocationEvent {
        user_id: driver_id.to_owned(),
        latitude: latitude.0,
        longitude: longitude.0,
        timestamp: reported_at.to_rfc3339(),
    };

    publish_event(
        data.publisher.as_ref(),
        &data.driver_gps_topic,
        &driver_id,
        &event,
    )
    .await?;

    Ok(UpdateLocationResponse { success: true })
}

/// Idempotent upsert of a driver position. Returns `false` when a newer report is already stored.
///
/// Replays are ordered by the reported time. The last-seen time used for eviction is the time of
/// ingestion, so a driver with a slow clock is not evicted while still reporting.
pub async fn update_position(
    geo_store: &dyn GeoStore,
    driver_id: &DriverId,
    location: &Point,
    reported_at: TimeStamp,
    store_timeout: Duration,
) -> Result<bool, AppError> {
    validate_point(location)?;

    let now = Utc::now();
    let reported_at = clamp_to_now(reported_at, now);

    let applied = with_timeout(
        store_timeout,
        "geo store",
        geo_store.upsert_position(driver_id, location, reported_at, TimeStamp(now)),
    )
    .await?;

    if !applied {
        debug!(tag = "[Stale Position Skipped]", driver_id = %driver_id.0, reported_at = %reported_at.0);
    }

    Ok(applied)
}

/// Drivers inside `radius`, nearest first, never more than `limit`.
pub async fn nearby_query(
    geo_store: &dyn GeoStore,
    center: &Point,
    radius: Radius,
    limit: usize,
    store_timeout: Duration,
) -> Result<Vec<NearbyDriver>, AppError> {
    let Radius(radius_km) = radius;

    let mut drivers = with_timeout(
        store_timeout,
        "geo store",
        geo_store.search_nearby(center, radius, limit),
    )
    .await?;

    drivers.retain(|driver| driver.distance_km <= radius_km);
    drivers.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    drivers.truncate(limit);

    Ok(drivers)
}

#[macros::measure_duration]
pub async fn get_nearby_drivers(
    data: &TrackerState,
    request: NearbyDriversRequest,
) -> Result<NearbyDriversResponse, AppError> {
    let center = Point {
        lat: request.latitude,
        lon: request.longitude,
    };
    validate_point(&center)?;

    let Radius(radius_km) = request.radius;
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(AppError::InvalidRequest(format!(
            "Radius must be positive : {radius_km}"
        )));
    }

    let limit = match request.limit {
        Some(0) => {
            return Err(AppError::InvalidRequest(
                "Limit must be at least 1".to_string(),
            ))
        }
        Some(limit) => limit.min(data.nearby_max_limit),
        None => DEFAULT_NEARBY_LIMIT,
    };

    let drivers = nearby_query(
        data.geo_store.as_ref(),
        &center,
        request.radius,
        limit,
        data.store_timeout,
    )
    .await?;

    Ok(NearbyDriversResponse { drivers })
}

pub async fn get_driver_location(
    data: &TrackerState,
    driver_id: DriverId,
) -> Result<DriverLocationResponse, AppError> {
    let position = with_timeout(
        data.store_timeout,
        "geo store",
        data.geo_store.get_position(&driver_id),
    )
    .await?
    .ok_or_else(|| AppError::DriverLocationNotFound(driver_id.0.to_owned()))?;

    Ok(DriverLocationResponse {
        driver_id: position.driver_id,
        latitude: position.location.lat,
        longitude: position.location.lon,
        last_seen_at: position.last_seen_at,
    })
}

/// Removes every driver whose last report is more than `ttl` before `now`, from both indices at once.
pub async fn evict_stale(
    geo_store: &dyn GeoStore,
    ttl: Duration,
    now: DateTime<Utc>,
    store_timeout: Duration,
) -> Result<Vec<DriverId>, AppError> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|err| AppError::InvalidConfiguration(err.to_string()))?;
    let cutoff = TimeStamp(now - ttl);

    let evicted = with_timeout(
        store_timeout,
        "geo store",
        geo_store.evict_seen_before(cutoff),
    )
    .await?;

    if !evicted.is_empty() {
        EVICTED_DRIVERS.inc_by(evicted.len() as u64);
        info!(tag = "[Stale Drivers Evicted]", count = evicted.len(), cutoff = %cutoff.0);
    } else {
        debug!(tag = "[Stale Drivers Evicted]", count = 0);
    }

    Ok(evicted)
}
