// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process signal handling.
//!
//! SIGTERM and SIGINT cancel the returned [`CancellationToken`], which stops
//! the webhook and the dispatch pool. SIGHUP asks for a configuration reload.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pool::DispatchPool;

/// Installs handlers for SIGTERM and SIGINT.
///
/// Returns a token that is cancelled when either signal arrives.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => info!("received SIGINT, initiating shutdown"),
                _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                _ = token_clone.cancelled() => return,
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = ctrl_c => info!("received Ctrl+C, initiating shutdown"),
                _ = token_clone.cancelled() => return,
            }
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Installs a SIGHUP handler that sends one message per signal.
///
/// Signals arriving while a reload is still queued are coalesced. The handler
/// stops when `shutdown` is cancelled, closing the receiver. Non-unix targets
/// never request a reload.
pub fn install_reload_handler(shutdown: CancellationToken) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = sighup.recv() => {
                        if received.is_none() {
                            break;
                        }
                        info!("received SIGHUP, reloading configuration");
                        if tx.try_send(()).is_err() {
                            debug!("reload already pending");
                        }
                    }
                }
            }
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            shutdown.cancelled().await;
            drop(tx);
        });
    }

    rx
}

/// Stops the pool, waiting at most `timeout` for in-flight dispatches.
pub async fn drain_pool(pool: DispatchPool, timeout: Duration) {
    match tokio::time::timeout(timeout, pool.shutdown()).await {
        Ok(()) => info!("dispatch pool drained"),
        Err(_) => warn!(
            timeout_secs = timeout.as_secs(),
            "timed out draining dispatch pool, abandoning in-flight dispatches"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_live_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn reload_handler_closes_on_shutdown() {
        let shutdown = CancellationToken::new();
        let mut reloads = install_reload_handler(shutdown.clone());
        shutdown.cancel();
        assert_eq!(reloads.recv().await, None);
    }
}
