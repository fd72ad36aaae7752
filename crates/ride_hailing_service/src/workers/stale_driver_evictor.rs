/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::error;

use crate::{domain::action::geo_index::evict_stale, redis::GeoStore, supervisor::Shutdown};

/// Sweeps drivers whose last report is older than `ttl` every `every`.
pub async fn run_stale_driver_evictor(
    geo_store: Arc<dyn GeoStore>,
    ttl: Duration,
    every: Duration,
    store_timeout: Duration,
    mut shutdown: Shutdown,
) {
    let mut timer = interval(every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            _ = timer.tick() => {
                if let Err(err) = evict_stale(geo_store.as_ref(), ttl, Utc::now(), store_timeout).await {
                    error!(tag = "[Stale Driver Eviction - ERROR]", error = %err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::types::*, supervisor::shutdown_channel, testing::InMemoryGeoStore};
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn evictor_sweeps_until_shutdown() {
        let geo = Arc::new(InMemoryGeoStore::default());
        let point = Point {
            lat: Latitude(-6.2),
            lon: Longitude(106.8),
        };
        let stale_at = TimeStamp(Utc::now() - ChronoDuration::seconds(120));
        let fresh_at = TimeStamp(Utc::now());
        geo.upsert_position(&DriverId("stale".to_string()), &point, stale_at, stale_at)
            .await
            .expect("upsert");
        geo.upsert_position(&DriverId("fresh".to_string()), &point, fresh_at, fresh_at)
            .await
            .expect("upsert");

        let (trigger, shutdown) = shutdown_channel();
        let worker = tokio::spawn(run_stale_driver_evictor(
            geo.clone(),
            Duration::from_secs(60),
            Duration::from_millis(10),
            Duration::from_secs(1),
            shutdown,
        ));

        tokio::time::timeout(Duration::from_secs(2), async {
            while geo.contains_last_seen(&DriverId("stale".to_string())) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("stale driver evicted");

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("evictor stops")
            .expect("no panic");
        assert!(geo.contains_last_seen(&DriverId("fresh".to_string())));
    }
}
