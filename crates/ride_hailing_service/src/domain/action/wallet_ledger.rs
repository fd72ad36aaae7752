/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::time::Duration;

use tracing::info;

use crate::{
    common::{types::*, utils::with_timeout},
    domain::types::{order::DebitBalanceEvent, wallet::*},
    environment::WalletState,
    storage::{LedgerEntry, LedgerOutcome, WalletStore},
    tools::error::AppError,
};

fn validate_user(user_id: &UserId) -> Result<(), AppError> {
    if user_id.0.trim().is_empty() {
        return Err(AppError::InvalidRequest("userId is required".to_string()));
    }
    Ok(())
}

fn validate_amount(Money(amount): Money) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidRequest(format!(
            "Amount must be greater than zero : {amount}"
        )));
    }
    Ok(())
}

pub async fn create_wallet(
    data: &WalletState,
    request: CreateWalletRequest,
) -> Result<BalanceResponse, AppError> {
    validate_user(&request.user_id)?;

    let balance = with_timeout(
        data.store_timeout,
        "wallet store",
        data.wallet_store.create_wallet(&request.user_id),
    )
    .await?;

    Ok(BalanceResponse {
        user_id: request.user_id,
        balance,
    })
}

/// A user without a wallet has a balance of zero.
pub async fn get_balance(data: &WalletState, user_id: UserId) -> Result<BalanceResponse, AppError> {
    validate_user(&user_id)?;

    let balance = with_timeout(
        data.store_timeout,
        "wallet store",
        data.wallet_store.get_balance(&user_id),
    )
    .await?
    .unwrap_or_default();

    Ok(BalanceResponse { user_id, balance })
}

async fn apply_entry(
    wallet_store: &dyn WalletStore,
    user_id: &UserId,
    entry: LedgerEntry,
    amount: Money,
    reference_id: Option<&str>,
    timeout: Duration,
) -> Result<LedgerOutcome, AppError> {
    validate_user(user_id)?;
    validate_amount(amount)?;

    let reference_id = reference_id.map(str::trim).filter(|r| !r.is_empty());

    let outcome = with_timeout(
        timeout,
        "wallet store",
        wallet_store.apply_entry(user_id, entry, amount, reference_id),
    )
    .await?;

    match outcome {
        LedgerOutcome::Applied(balance) => {
            info!(tag = "[Ledger Entry Applied]", user_id = %user_id.0, entry = entry.description(), amount = %amount, balance = %balance)
        }
        LedgerOutcome::Duplicate(balance) => {
            info!(tag = "[Ledger Entry Duplicate]", user_id = %user_id.0, entry = entry.description(), reference_id = ?reference_id, balance = %balance)
        }
    }

    Ok(outcome)
}

#[macros::measure_duration]
pub async fn credit_balance(
    data: &WalletState,
    user_id: UserId,
    request: LedgerRequest,
) -> Result<LedgerResponse, AppError> {
    let outcome = apply_entry(
        data.wallet_store.as_ref(),
        &user_id,
        LedgerEntry::Credit,
        request.amount,
        request.reference_id.as_deref(),
        data.store_timeout,
    )
    .await?;

    Ok(LedgerResponse {
        new_balance: outcome.balance(),
    })
}

#[macros::measure_duration]
pub async fn debit_balance(
    data: &WalletState,
    user_id: UserId,
    request: LedgerRequest,
) -> Result<LedgerResponse, AppError> {
    let outcome = apply_entry(
        data.wallet_store.as_ref(),
        &user_id,
        LedgerEntry::Debit,
        request.amount,
        request.reference_id.as_deref(),
        data.store_timeout,
    )
    .await?;

    Ok(LedgerResponse {
        new_balance: outcome.balance(),
    })
}

/// Checks a consumed debit before it touches the ledger.
pub fn validate_debit_event(event: &DebitBalanceEvent) -> Result<(), AppError> {
    validate_amount(event.amount)?;
    if event.user_id.trim().is_empty() {
        return Err(AppError::InvalidRequest("UserID is required".to_string()));
    }
    if event.reference.trim().is_empty() {
        return Err(AppError::InvalidRequest("Reference is required".to_string()));
    }
    Ok(())
}

/// Debits the passenger for a finished order. The order id is the reference, so a redelivered
/// event leaves the balance as it is.
pub async fn apply_debit_event(
    wallet_store: &dyn WalletStore,
    event: &DebitBalanceEvent,
    timeout: Duration,
) -> Result<LedgerOutcome, AppError> {
    validate_debit_event(event)?;

    apply_entry(
        wallet_store,
        &UserId(event.user_id.to_owned()),
        LedgerEntry::Debit,
        event.amount,
        Some(&event.reference),
        timeout,
    )
    .await
}
