/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::tools::error::AppError;

#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct DriverId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq)]
pub struct UserId(pub String);
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct OrderId(pub Uuid);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq)]
pub struct RideId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Latitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Longitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Hash, Ord)]
pub struct TimeStamp(pub DateTime<Utc>);
/// Search radius in kilometers.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Radius(pub f64);

/// Whole currency units.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Default)]
pub struct Money(pub i64);

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{Error, Unexpected};

        struct MoneyVisitor;

        #[allow(clippy::needless_lifetimes)]
        impl<'de> serde::de::Visitor<'de> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a whole amount as an integer, an integral float or a string")
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Money(v))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: Error,
            {
                i64::try_from(v)
                    .map(Money)
                    .map_err(|_| Error::invalid_value(Unexpected::Unsigned(v), &self))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: Error,
            {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                    Ok(Money(v as i64))
                } else {
                    Err(Error::invalid_value(Unexpected::Float(v), &self))
                }
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                value
                    .trim()
                    .parse::<i64>()
                    .map(Money)
                    .map_err(|_| Error::invalid_value(Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub lat: Latitude,
    pub lon: Longitude,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, EnumString, Display, Serialize, Deserialize, Eq, Hash, PartialEq)]
pub enum OrderStatus {
    CREATED,
    STARTED,
    FINISHED,
}

impl OrderStatus {
    /// The only forward step allowed from this status, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::CREATED => Some(OrderStatus::STARTED),
            OrderStatus::STARTED => Some(OrderStatus::FINISHED),
            OrderStatus::FINISHED => None,
        }
    }

    pub fn transition_to(&self, requested: OrderStatus) -> Transition {
        if *self == requested {
            Transition::Repeat
        } else if self.next() == Some(requested) {
            Transition::Advance
        } else {
            Transition::Reject
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advance,
    /// Requested status equals the current one; nothing changes and nothing is emitted.
    Repeat,
    Reject,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, EnumString, Display, Serialize, Deserialize, Eq, PartialEq)]
pub enum SearchStatus {
    #[strum(serialize = "DRIVERS_FOUND")]
    #[serde(rename = "DRIVERS_FOUND")]
    DriversFound,
    #[strum(serialize = "DRIVERS_NOT_FOUND")]
    #[serde(rename = "DRIVERS_NOT_FOUND")]
    DriversNotFound,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NearbyDriver {
    pub driver_id: DriverId,
    pub location: Point,
    pub distance_km: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverPosition {
    pub driver_id: DriverId,
    pub location: Point,
    pub last_seen_at: TimeStamp,
}

pub fn parse_order_id(order_id: &str) -> Result<OrderId, AppError> {
    Uuid::parse_str(order_id.trim())
        .map(OrderId)
        .map_err(|_| AppError::InvalidRequest(format!("Invalid order id : {order_id}")))
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn money_accepts_integral_numbers_and_strings() {
        assert_eq!(serde_json::from_str::<Money>("21606").ok(), Some(Money(21606)));
        assert_eq!(serde_json::from_str::<Money>("21606.0").ok(), Some(Money(21606)));
        assert_eq!(serde_json::from_str::<Money>("\"150\"").ok(), Some(Money(150)));
        assert!(serde_json::from_str::<Money>("10.5").is_err());
        assert!(serde_json::from_str::<Money>("\"ten\"").is_err());
    }

    #[test]
    fn order_status_moves_forward_only() {
        assert_eq!(OrderStatus::CREATED.next(), Some(OrderStatus::STARTED));
        assert_eq!(OrderStatus::STARTED.next(), Some(OrderStatus::FINISHED));
        assert_eq!(OrderStatus::FINISHED.next(), None);
        assert_eq!(OrderStatus::from_str("FINISHED").ok(), Some(OrderStatus::FINISHED));
        assert!(OrderStatus::from_str("CANCELLED").is_err());
    }

    #[test]
    fn transitions_cannot_skip_or_go_backward() {
        use OrderStatus::*;
        assert_eq!(CREATED.transition_to(STARTED), Transition::Advance);
        assert_eq!(STARTED.transition_to(FINISHED), Transition::Advance);
        assert_eq!(CREATED.transition_to(FINISHED), Transition::Reject);
        assert_eq!(FINISHED.transition_to(STARTED), Transition::Reject);
        assert_eq!(STARTED.transition_to(CREATED), Transition::Reject);
        assert_eq!(FINISHED.transition_to(FINISHED), Transition::Repeat);
    }

    #[test]
    fn search_status_wire_names() {
        assert_eq!(SearchStatus::DriversFound.to_string(), "DRIVERS_FOUND");
        assert_eq!(
            serde_json::to_string(&SearchStatus::DriversNotFound).ok(),
            Some("\"DRIVERS_NOT_FOUND\"".to_string())
        );
    }

    #[test]
    fn malformed_order_id_is_invalid_request() {
        assert!(matches!(
            parse_order_id("not-a-uuid"),
            Err(AppError::InvalidRequest(_))
        ));
        assert!(parse_order_id("6f1c0c1e-8c8b-4c33-9b7e-2a4f8f0d1a11").is_ok());
    }
}
