/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use actix_web::{
    get, post, put,
    web::{Data, Json, Path},
};

use crate::{
    domain::{action::order_ledger, types::order::*},
    environment::OrderState,
    storage::Order,
    tools::error::AppError,
};

#[post("/orders")]
pub async fn create_order(
    data: Data<OrderState>,
    param_obj: Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let request_body = param_obj.into_inner();

    Ok(Json(order_ledger::create_order(&data, request_body).await?))
}

#[get("/orders/{orderId}")]
pub async fn get_order(
    data: Data<OrderState>,
    path: Path<String>,
) -> Result<Json<Order>, AppError> {
    let order_id = path.into_inner();

    Ok(Json(order_ledger::get_order(&data, &order_id).await?))
}

#[put("/orders/{orderId}/status")]
pub async fn update_order_status(
    data: Data<OrderState>,
    param_obj: Json<UpdateOrderStatusRequest>,
    path: Path<String>,
) -> Result<Json<UpdateOrderStatusResponse>, AppError> {
    let request_body = param_obj.into_inner();
    let order_id = path.into_inner();

    Ok(Json(
        order_ledger::update_order_status(&data, &order_id, request_body).await?,
    ))
}
