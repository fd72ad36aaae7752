/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::time::Duration;

use actix_web::{web, App, HttpServer};
use ride_hailing_service::{
    domain::api,
    environment::{load_config, DispatchConfig, DispatchState},
    middleware::*,
    supervisor::Supervisor,
    tools::{error::AppError, logger::*, prometheus::prometheus_metrics},
};
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn start_server() -> std::io::Result<()> {
    let app_config: DispatchConfig = load_config("dispatch.dhall");

    let _guard = setup_tracing(app_config.logger_cfg, "dispatch-service");

    let data = web::Data::new(DispatchState::new(&app_config));
    let prometheus = prometheus_metrics();
    let request_timeout = RequestTimeout(Duration::from_millis(
        app_config.server_cfg.request_timeout,
    ));

    let supervisor = Supervisor::new(Duration::from_secs(
        app_config.server_cfg.shutdown_grace_period,
    ));

    info!(tag = "[Server Starting]", port = app_config.server_cfg.port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .app_data(
                web::JsonConfig::default()
                    .error_handler(|err, _| AppError::UnprocessibleRequest(err.to_string()).into()),
            )
            .wrap(request_timeout)
            .wrap(IncomingRequestMetrics)
            .wrap(TracingLogger::<DomainRootSpanBuilder>::new())
            .wrap(prometheus.clone())
            .configure(api::dispatch_handler)
    })
    .workers(app_config.server_cfg.workers)
    .disable_signals()
    .shutdown_timeout(app_config.server_cfg.shutdown_grace_period)
    .bind(("0.0.0.0", app_config.server_cfg.port))?
    .run();

    supervisor.run(server).await
}

fn main() {
    start_server().expect("Failed to start the server");
}
