/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use actix_web::{
    get, post,
    web::{Data, Json, Path},
};

use crate::{
    common::types::*,
    domain::{action::wallet_ledger, types::wallet::*},
    environment::WalletState,
    tools::error::AppError,
};

#[post("/wallets")]
pub async fn create_wallet(
    data: Data<WalletState>,
    param_obj: Json<CreateWalletRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let request_body = param_obj.into_inner();

    Ok(Json(wallet_ledger::create_wallet(&data, request_body).await?))
}

#[get("/internal/wallets/{userId}/balance")]
pub async fn get_balance(
    data: Data<WalletState>,
    path: Path<String>,
) -> Result<Json<BalanceResponse>, AppError> {
    let user_id = UserId(path.into_inner());

    Ok(Json(wallet_ledger::get_balance(&data, user_id).await?))
}

#[post("/wallets/{userId}/credit")]
pub async fn credit_balance(
    data: Data<WalletState>,
    param_obj: Json<LedgerRequest>,
    path: Path<String>,
) -> Result<Json<LedgerResponse>, AppError> {
    let request_body = param_obj.into_inner();
    let user_id = UserId(path.into_inner());

    Ok(Json(
        wallet_ledger::credit_balance(&data, user_id, request_body).await?,
    ))
}

#[post("/wallets/{userId}/debit")]
pub async fn debit_balance(
    data: Data<WalletState>,
    param_obj: Json<LedgerRequest>,
    path: Path<String>,
) -> Result<Json<LedgerResponse>, AppError> {
    let request_body = param_obj.into_inner();
    let user_id = UserId(path.into_inner());

    Ok(Json(
        wallet_ledger::debit_balance(&data, user_id, request_body).await?,
    ))
}
