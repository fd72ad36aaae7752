/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

pub mod dispatch;
pub mod healthcheck;
pub mod order;
pub mod tracker;
pub mod wallet;

use actix_web::web::ServiceConfig;

pub fn tracker_handler(config: &mut ServiceConfig) {
    config
        .service(tracker::update_location)
        .service(tracker::get_nearby_drivers)
        .service(tracker::get_driver_location)
        .service(healthcheck::tracker_health_check);
}

pub fn dispatch_handler(config: &mut ServiceConfig) {
    config
        .service(dispatch::request_ride)
        .service(healthcheck::dispatch_health_check);
}

pub fn order_handler(config: &mut ServiceConfig) {
    config
        .service(order::create_order)
        .service(order::get_order)
        .service(order::update_order_status)
        .service(healthcheck::order_health_check);
}

pub fn wallet_handler(config: &mut ServiceConfig) {
    config
        .service(wallet::create_wallet)
        .service(wallet::get_balance)
        .service(wallet::credit_balance)
        .service(wallet::debit_balance)
        .service(healthcheck::wallet_health_check);
}
