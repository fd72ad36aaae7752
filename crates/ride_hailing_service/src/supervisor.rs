/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::{future::Future, io, time::Duration};

use actix_web::dev::Server;
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::watch,
    task::JoinHandle,
    time::{timeout, Instant},
};
use tracing::{error, info, warn};

use crate::termination;

/// Fires the shutdown signal observed by every [`Shutdown`] cloned from the same channel.
pub struct ShutdownTrigger(watch::Sender<bool>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Clone)]
pub struct Shutdown(watch::Receiver<bool>);

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been triggered, immediately if it already was.
    pub async fn recv(&mut self) {
        // Err only once the trigger is dropped, which also ends the wait.
        let _ = self.0.wait_for(|triggered| *triggered).await;
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), Shutdown(rx))
}

/// Owns the HTTP server and the background workers of one service, and stops them together.
///
/// On SIGTERM or SIGINT the server stops accepting connections and drains in-flight requests,
/// workers are told to stop after their current message, and anything still running once the
/// grace period is over is aborted.
pub struct Supervisor {
    trigger: ShutdownTrigger,
    shutdown: Shutdown,
    tasks: Vec<(String, JoinHandle<()>)>,
    grace_period: Duration,
}

impl Supervisor {
    pub fn new(grace_period: Duration) -> Self {
        let (trigger, shutdown) = shutdown_channel();
        Self {
            trigger,
            shutdown,
            tasks: Vec::new(),
            grace_period,
        }
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn spawn<F>(&mut self, name: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(tag = "[Worker Started]", worker = %name);
        self.tasks.push((name.to_string(), tokio::spawn(task)));
    }

    pub async fn run(self, server: Server) -> io::Result<()> {
        let handle = server.handle();
        let mut server = tokio::spawn(server);

        let server_result = tokio::select! {
            res = &mut server => Some(res),
            signal = wait_for_termination() => {
                match signal {
                    Ok(name) => info!(tag = "[Graceful Shutting Down]", signal = %name),
                    Err(err) => error!(tag = "[Signal Handler - ERROR]", error = %err),
                }
                None
            }
        };

        let start = Instant::now();
        self.trigger.trigger();

        let server_result = match server_result {
            Some(res) => res,
            None => {
                if timeout(self.grace_period, handle.stop(true)).await.is_err() {
                    warn!(tag = "[Graceful Shutting Down]", "HTTP server did not drain in time, forcing stop");
                    handle.stop(false).await;
                }
                server.await
            }
        };

        for (name, task) in self.tasks {
            let remaining = self.grace_period.saturating_sub(start.elapsed());
            let abort = task.abort_handle();
            match timeout(remaining, task).await {
                Ok(Ok(())) => info!(tag = "[Worker Stopped]", worker = %name),
                Ok(Err(err)) => error!(tag = "[Worker Stopped - ERROR]", worker = %name, error = %err),
                Err(_) => {
                    warn!(tag = "[Worker Aborted]", worker = %name);
                    abort.abort();
                }
            }
        }

        termination!("GRACEFUL", start);

        server_result.map_err(|err| io::Error::new(io::ErrorKind::Other, err))?
    }
}

async fn wait_for_termination() -> io::Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
