/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;

use crate::{common::types::*, tools::error::AppError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub passenger_id: UserId,
    pub driver_id: Option<DriverId>,
    pub pickup: Point,
    pub dropoff: Point,
    pub status: OrderStatus,
    pub price: Money,
    pub created_at: TimeStamp,
    pub updated_at: TimeStamp,
}

/// Debit owed for a finished order, recorded in the same transaction as the FINISHED status.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub created_at: TimeStamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverBinding {
    Bound,
    AlreadyBound,
    Conflict(DriverId),
    OrderNotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// Status advanced. Carries the pending payment when the order just finished.
    Advanced(Order, Option<PaymentIntent>),
    Unchanged(Order),
    Rejected(OrderStatus),
    NotFound,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), AppError>;

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, AppError>;

    /// Sets the driver only if none is bound yet.
    async fn bind_driver(
        &self,
        order_id: &OrderId,
        driver_id: &DriverId,
    ) -> Result<DriverBinding, AppError>;

    /// Applies a forward transition. Moving to FINISHED records a payment intent atomically.
    async fn transition_status(
        &self,
        order_id: &OrderId,
        requested: OrderStatus,
    ) -> Result<StatusUpdate, AppError>;

    async fn pending_payment_intents(&self, limit: i64) -> Result<Vec<PaymentIntent>, AppError>;

    async fn mark_payment_published(&self, order_id: &OrderId) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEntry {
    Credit,
    Debit,
}

impl LedgerEntry {
    pub fn description(&self) -> &'static str {
        match self {
            LedgerEntry::Credit => "CREDIT",
            LedgerEntry::Debit => "DEBIT",
        }
    }

    pub fn signed(&self, Money(amount): Money) -> Money {
        match self {
            LedgerEntry::Credit => Money(amount),
            LedgerEntry::Debit => Money(-amount),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    Applied(Money),
    /// The reference was already recorded for this wallet; the balance is returned untouched.
    Duplicate(Money),
}

impl LedgerOutcome {
    pub fn balance(&self) -> Money {
        match self {
            LedgerOutcome::Applied(balance) | LedgerOutcome::Duplicate(balance) => *balance,
        }
    }
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Creates an empty wallet or returns the balance of the existing one.
    async fn create_wallet(&self, user_id: &UserId) -> Result<Money, AppError>;

    async fn get_balance(&self, user_id: &UserId) -> Result<Option<Money>, AppError>;

    /// Records the entry and moves the balance in one transaction. A missing wallet yields
    /// `WalletNotFound` and writes nothing.
    async fn apply_entry(
        &self,
        user_id: &UserId,
        entry: LedgerEntry,
        amount: Money,
        reference_id: Option<&str>,
    ) -> Result<LedgerOutcome, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
