/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use fred::{
    prelude::*,
    types::{GeoPosition, GeoUnit, SortOrder},
};
use tracing::{error, info};

use super::{
    keys::{driver_last_seen_key, driver_positions_key, driver_reported_at_key},
    GeoStore,
};
use crate::{common::types::*, environment::RedisConfig, tools::error::AppError};

/// Writes position, last-seen and report time together, unless the stored report is newer.
///
/// KEYS: positions, last_seen, reported_at. ARGV: driver id, lon, lat, reported at, seen at
/// (both unix millis).
const UPSERT_POSITION_SCRIPT: &str = r#"
local stored = redis.call('HGET', KEYS[3], ARGV[1])
if stored and tonumber(stored) > tonumber(ARGV[4]) then
  return 0
end
redis.call('GEOADD', KEYS[1], ARGV[2], ARGV[3], ARGV[1])
redis.call('ZADD', KEYS[2], ARGV[5], ARGV[1])
redis.call('HSET', KEYS[3], ARGV[1], ARGV[4])
return 1
"#;

/// Removes drivers whose last-seen score is strictly below the cutoff from every key.
///
/// KEYS: positions, last_seen, reported_at. ARGV: cutoff (unix millis).
const EVICT_STALE_SCRIPT: &str = r#"
local stale = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', '(' .. ARGV[1])
for i = 1, #stale, 500 do
  local chunk = {unpack(stale, i, math.min(i + 499, #stale))}
  redis.call('ZREM', KEYS[1], unpack(chunk))
  redis.call('ZREM', KEYS[2], unpack(chunk))
  redis.call('HDEL', KEYS[3], unpack(chunk))
end
return stale
"#;

fn geo_keys() -> Vec<String> {
    vec![
        driver_positions_key(),
        driver_last_seen_key(),
        driver_reported_at_key(),
    ]
}

pub struct RedisConnectionPool {
    pub pool: RedisPool,
}

impl RedisConnectionPool {
    pub async fn new(conf: &RedisConfig) -> Result<Self, AppError> {
        let redis_connection_url = format!(
            "redis://{}:{}/{}",
            conf.redis_host, conf.redis_port, conf.redis_partition
        );

        let config = fred::types::RedisConfig::from_url(&redis_connection_url)
            .map_err(|err| AppError::InvalidConfiguration(err.to_string()))?;

        let pool = Builder::from_config(config)
            .set_policy(ReconnectPolicy::new_constant(
                conf.reconnect_max_attempts,
                conf.reconnect_delay,
            ))
            .build_pool(conf.redis_pool_size)
            .map_err(|err| AppError::InvalidConfiguration(err.to_string()))?;

        pool.init().await?;

        info!(tag = "[Redis Connected]", host = %conf.redis_host, port = %conf.redis_port);

        Ok(Self { pool })
    }
}

fn member_to_driver_id(member: &RedisValue) -> Option<DriverId> {
    member.as_string().map(DriverId)
}

/// GEOPOS answers with either a list of points or, for a single member, the point itself.
/// A member removed since the last-seen lookup comes back as `[nil]`.
fn first_geo_position(value: RedisValue) -> Result<Option<GeoPosition>, AppError> {
    match value {
        RedisValue::Array(items) if items.iter().all(|item| item.is_null()) => Ok(None),
        RedisValue::Array(items) if items.iter().all(|item| item.is_array()) => items
            .into_iter()
            .next()
            .map(|item| item.as_geo_position())
            .transpose()
            .map(Option::flatten)
            .map_err(AppError::from),
        RedisValue::Null => Ok(None),
        other => other.as_geo_position().map_err(AppError::from),
    }
}

#[async_trait]
impl GeoStore for RedisConnectionPool {
    async fn upsert_position(
        &self,
        DriverId(driver_id): &DriverId,
        Point {
            lat: Latitude(lat),
            lon: Longitude(lon),
        }: &Point,
        TimeStamp(reported_at): TimeStamp,
        TimeStamp(seen_at): TimeStamp,
    ) -> Result<bool, AppError> {
        let applied: i64 = self
            .pool
            .next()
            .eval(
                UPSERT_POSITION_SCRIPT,
                geo_keys(),
                vec![
                    driver_id.to_owned(),
                    lon.to_string(),
                    lat.to_string(),
                    reported_at.timestamp_millis().to_string(),
                    seen_at.timestamp_millis().to_string(),
                ],
            )
            .await?;

        Ok(applied == 1)
    }

    async fn search_nearby(
        &self,
        Point {
            lat: Latitude(lat),
            lon: Longitude(lon),
        }: &Point,
        Radius(radius): Radius,
        limit: usize,
    ) -> Result<Vec<NearbyDriver>, AppError> {
        let nearby_drivers: RedisValue = self
            .pool
            .next()
            .geosearch(
                driver_positions_key(),
                None,
                Some(GeoPosition::from((*lon, *lat))),
                Some((radius, GeoUnit::Kilometers)),
                None,
                Some(SortOrder::Asc),
                None,
                true,
                true,
                false,
            )
            .await?;

        let mut resp: Vec<NearbyDriver> = Vec::new();

        for driver in nearby_drivers.into_geo_radius_result(true, true, false)? {
            match (
                member_to_driver_id(&driver.member),
                &driver.position,
                driver.distance,
            ) {
                (Some(driver_id), Some(pos), Some(distance_km)) => resp.push(NearbyDriver {
                    driver_id,
                    location: Point {
                        lat: Latitude(pos.latitude),
                        lon: Longitude(pos.longitude),
                    },
                    distance_km,
                }),
                _ => {
                    error!(tag = "[Invalid Geo Search Entry]", entry = ?driver);
                }
            }

            if resp.len() >= limit {
                break;
            }
        }

        Ok(resp)
    }

    async fn get_position(&self, driver_id: &DriverId) -> Result<Option<DriverPosition>, AppError> {
        let client = self.pool.next();

        let last_seen: Option<f64> = client
            .zscore(driver_last_seen_key(), driver_id.0.to_owned())
            .await?;

        let Some(last_seen) = last_seen else {
            return Ok(None);
        };

        let position: RedisValue = client
            .geopos(driver_positions_key(), driver_id.0.to_owned())
            .await?;

        let last_seen_at = Utc
            .timestamp_millis_opt(last_seen as i64)
            .single()
            .ok_or_else(|| {
                AppError::InternalError(format!("Invalid last seen score : {last_seen}"))
            })?;

        Ok(first_geo_position(position)?.map(|pos| DriverPosition {
            driver_id: driver_id.to_owned(),
            location: Point {
                lat: Latitude(pos.latitude),
                lon: Longitude(pos.longitude),
            },
            last_seen_at: TimeStamp(last_seen_at),
        }))
    }

    async fn evict_seen_before(&self, TimeStamp(cutoff): TimeStamp) -> Result<Vec<DriverId>, AppError> {
        let evicted: Vec<String> = self
            .pool
            .next()
            .eval(
                EVICT_STALE_SCRIPT,
                geo_keys(),
                vec![cutoff.timestamp_millis().to_string()],
            )
            .await?;

        Ok(evicted.into_iter().map(DriverId).collect())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let _: u64 = self.pool.next().zcard(driver_last_seen_key()).await?;
        Ok(())
    }
}
