/*
 *  shutdown.rs
 *
 *  wxclock - clock and weather, once a second
 *	(c) 2020-26 Stuart Hunter
 *
 *	Termination signals wired to the cadence stop flag
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use log::info;
use tokio::task::JoinHandle;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::pacer::StopFlag;

/// SIGINT, SIGTERM and SIGHUP handlers, registered up front so a failure
/// surfaces before the clock starts rather than leaving it unstoppable.
/// Must be installed from inside a tokio runtime.
#[cfg(unix)]
pub struct ShutdownSignals {
    sigint: Signal,
    sigterm: Signal,
    sighup: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sighup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the first of the three and log which one arrived.
    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.sigint.recv() => {
                info!("SIGINT received. Initiating graceful shutdown.");
            }
            _ = self.sigterm.recv() => {
                info!("SIGTERM received. Initiating graceful shutdown.");
            }
            _ = self.sighup.recv() => {
                info!("SIGHUP received. Initiating graceful shutdown.");
            }
        }
    }
}

#[cfg(not(unix))]
pub struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(self) {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received. Initiating graceful shutdown.");
        }
    }
}

impl ShutdownSignals {
    /// Raise `stop` once a signal arrives.
    pub fn watch(self, stop: StopFlag) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.recv().await;
            stop.stop();
        })
    }
}
