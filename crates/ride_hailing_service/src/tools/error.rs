/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use actix_web::{
    http::{header::ContentType, StatusCode},
    HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_message: String,
    pub error_code: String,
}

#[macros::add_error]
pub enum AppError {
    InternalError(String),
    InvalidRequest(String),
    UnprocessibleRequest(String),
    OrderNotFound(String),
    WalletNotFound(String),
    DriverLocationNotFound(String),
    InsufficientBalance(i64, i64),
    InvalidOrderTransition(String, String),
    RedisError(String),
    DatabaseError(String),
    KafkaPushFailed(String),
    KafkaConsumeFailed(String),
    ExternalAPICallError(String),
    DependencyTimeout(String),
    SerializationError(String),
    DeserializationError(String),
    InvalidConfiguration(String),
    RequestTimeout,
}

impl AppError {
    pub fn error_message(&self) -> ErrorBody {
        ErrorBody {
            error_message: self.message(),
            error_code: self.code(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::InternalError(err) => err.to_string(),
            AppError::InvalidRequest(err) => err.to_string(),
            AppError::UnprocessibleRequest(err) => err.to_string(),
            AppError::OrderNotFound(order_id) => format!("Order not found : {order_id}"),
            AppError::WalletNotFound(user_id) => format!("Wallet not found : {user_id}"),
            AppError::DriverLocationNotFound(driver_id) => {
                format!("Driver location not found : {driver_id}")
            }
            AppError::InsufficientBalance(balance, price) => {
                format!("Insufficient balance : Balance - {balance}, Price - {price}")
            }
            AppError::InvalidOrderTransition(from, to) => {
                format!("Invalid order status transition : {from} -> {to}")
            }
            AppError::RedisError(err) => format!("Redis Error : {err}"),
            AppError::DatabaseError(err) => format!("Database Error : {err}"),
            AppError::KafkaPushFailed(reason) => format!("Kafka Push Failed : {reason}"),
            AppError::KafkaConsumeFailed(reason) => format!("Kafka Consume Failed : {reason}"),
            AppError::ExternalAPICallError(err) => err.to_string(),
            AppError::DependencyTimeout(dependency) => {
                format!("Timed out waiting for {dependency}")
            }
            AppError::SerializationError(err) => err.to_string(),
            AppError::DeserializationError(err) => err.to_string(),
            AppError::InvalidConfiguration(err) => err.to_string(),
            AppError::RequestTimeout => "Request Timed Out".to_string(),
        }
    }

    pub fn code(&self) -> String {
        match self {
            AppError::InternalError(_) => "INTERNAL_ERROR",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::UnprocessibleRequest(_) => "UNPROCESSIBLE_REQUEST",
            AppError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            AppError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            AppError::DriverLocationNotFound(_) => "DRIVER_LOCATION_NOT_FOUND",
            AppError::InsufficientBalance(_, _) => "INSUFFICIENT_BALANCE",
            AppError::InvalidOrderTransition(_, _) => "INVALID_ORDER_TRANSITION",
            AppError::RedisError(_) => "REDIS_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::KafkaPushFailed(_) => "KAFKA_PUSH_FAILED",
            AppError::KafkaConsumeFailed(_) => "KAFKA_CONSUME_FAILED",
            AppError::ExternalAPICallError(_) => "EXTERNAL_API_CALL_ERROR",
            AppError::DependencyTimeout(_) => "DEPENDENCY_TIMEOUT",
            AppError::SerializationError(_) => "SERIALIZATION_ERROR",
            AppError::DeserializationError(_) => "DESERIALIZATION_ERROR",
            AppError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            AppError::RequestTimeout => "REQUEST_TIMEOUT",
        }
        .to_string()
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(self.error_message())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnprocessibleRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::OrderNotFound(_)
            | AppError::WalletNotFound(_)
            | AppError::DriverLocationNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientBalance(_, _) | AppError::InvalidOrderTransition(_, _) => {
                StatusCode::PRECONDITION_FAILED
            }
            AppError::RedisError(_)
            | AppError::DatabaseError(_)
            | AppError::KafkaPushFailed(_)
            | AppError::KafkaConsumeFailed(_)
            | AppError::ExternalAPICallError(_)
            | AppError::DependencyTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalError(_)
            | AppError::SerializationError(_)
            | AppError::DeserializationError(_)
            | AppError::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl From<fred::error::RedisError> for AppError {
    fn from(error: fred::error::RedisError) -> Self {
        AppError::RedisError(error.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        AppError::DatabaseError(error.to_string())
    }
}
