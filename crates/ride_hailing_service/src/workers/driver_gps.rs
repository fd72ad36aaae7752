/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;

use super::{decode_event, ConsumerError, EventHandler};
use crate::{
    common::{kafka::EventMessage, types::*},
    domain::{
        action::geo_index::{parse_report_time, update_position},
        types::tracker::LocationEvent,
    },
    redis::GeoStore,
};

/// Applies `driver-gps` reports to the geo index.
pub struct DriverGpsHandler {
    pub geo_store: Arc<dyn GeoStore>,
    pub store_timeout: Duration,
}

#[async_trait]
impl EventHandler for DriverGpsHandler {
    fn name(&self) -> &'static str {
        "driver_gps"
    }

    async fn handle(&self, message: &EventMessage) -> Result<(), ConsumerError> {
        let event: LocationEvent = decode_event(message)?;

        if event.user_id.trim().is_empty() {
            return Err(ConsumerError::Permanent(
                "Location report without user_id".to_string(),
            ));
        }

        let location = Point {
            lat: Latitude(event.latitude),
            lon: Longitude(event.longitude),
        };
        let reported_at = parse_report_time(&event.timestamp, Utc::now());

        update_position(
            self.geo_store.as_ref(),
            &DriverId(event.user_id),
            &location,
            reported_at,
            self.store_timeout,
        )
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryGeoStore;

    fn message(payload: &str) -> EventMessage {
        EventMessage {
            topic: "driver-gps".to_string(),
            partition: 0,
            offset: 0,
            key: Some("d1".to_string()),
            payload: payload.as_bytes().to_vec(),
        }
    }

    fn handler(geo: Arc<InMemoryGeoStore>) -> DriverGpsHandler {
        DriverGpsHandler {
            geo_store: geo,
            store_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn report_is_indexed_at_ingestion_time() {
        let geo = Arc::new(InMemoryGeoStore::default());
        let before = Utc::now();

        handler(geo.clone())
            .handle(&message(
                r#"{"user_id":"d1","latitude":-6.21,"longitude":106.81,"timestamp":"2024-01-01T00:00:00Z"}"#,
            ))
            .await
            .expect("handled");

        let position = geo
            .get_position(&DriverId("d1".to_string()))
            .await
            .expect("read")
            .expect("indexed");
        assert_eq!(position.location.lat, Latitude(-6.21));
        assert!(position.last_seen_at.0 >= before);
    }

    #[tokio::test]
    async fn older_report_arriving_late_is_skipped() {
        let geo = Arc::new(InMemoryGeoStore::default());
        let handler = handler(geo.clone());

        for payload in [
            r#"{"user_id":"d1","latitude":-6.21,"longitude":106.81,"timestamp":"2024-01-01T00:00:10Z"}"#,
            r#"{"user_id":"d1","latitude":-6.30,"longitude":106.90,"timestamp":"2024-01-01T00:00:00Z"}"#,
        ] {
            handler.handle(&message(payload)).await.expect("handled");
        }

        let position = geo
            .get_position(&DriverId("d1".to_string()))
            .await
            .expect("read")
            .expect("indexed");
        assert_eq!(position.location.lat, Latitude(-6.21));
    }

    #[tokio::test]
    async fn malformed_reports_are_permanent() {
        let geo = Arc::new(InMemoryGeoStore::default());
        let handler = handler(geo.clone());

        for payload in [
            "not json",
            r#"{"user_id":"","latitude":1.0,"longitude":1.0}"#,
            r#"{"user_id":"d1","latitude":91.0,"longitude":1.0}"#,
        ] {
            assert!(matches!(
                handler.handle(&message(payload)).await,
                Err(ConsumerError::Permanent(_))
            ));
        }
        assert_eq!(geo.driver_count(), 0);
    }
}
