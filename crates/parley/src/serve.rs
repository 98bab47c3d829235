// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve`: wires configuration, collaborators, the dispatch pool
//! and the webhook server, then runs until SIGINT/SIGTERM.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use parley_agent::shutdown::{drain_pool, install_reload_handler, install_signal_handler};
use parley_agent::{DispatchPipeline, DispatchPool, ReloadCoordinator};
use parley_clients::HttpServiceFactory;
use parley_config::{ConfigError, ParleyConfig};
use parley_core::error::ParleyError;
use parley_history::MemoryStore;

use crate::server::{self, AppState};

/// Queue slots per in-flight dispatch.
const QUEUE_SLOTS_PER_WORKER: usize = 16;

/// How long shutdown waits for in-flight dispatches.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the agent until a shutdown signal arrives.
pub async fn run_serve(
    config: ParleyConfig,
    config_path: Option<PathBuf>,
) -> Result<(), ParleyError> {
    info!(agent = %config.agent.name, "starting parley");

    let shutdown = install_signal_handler();

    let store = Arc::new(MemoryStore::new(config.store.max_entries));
    let coordinator = Arc::new(
        ReloadCoordinator::bootstrap(&config, Arc::new(HttpServiceFactory), store).await?,
    );

    let pipeline = Arc::new(DispatchPipeline::new(
        coordinator.services(),
        coordinator.canned(),
        shutdown.clone(),
    ));
    let max_in_flight = config.dispatch.max_in_flight;
    let pool = DispatchPool::start(
        pipeline,
        max_in_flight,
        max_in_flight.saturating_mul(QUEUE_SLOTS_PER_WORKER),
        shutdown.clone(),
    );
    info!(max_in_flight, "dispatch pool started");

    let reloads = install_reload_handler(shutdown.clone());
    let reload_task = tokio::spawn(run_reload_loop(
        reloads,
        Arc::clone(&coordinator),
        config.clone(),
        config_path,
    ));

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let app = server::router(AppState::new(pool.sender()));
    let served = server::serve(&addr, app, shutdown.clone().cancelled_owned()).await;

    // A bind failure returns before any signal; stop everything else too.
    shutdown.cancel();
    drain_pool(pool, DRAIN_TIMEOUT).await;
    if let Err(e) = reload_task.await {
        error!(error = %e, "reload loop terminated abnormally");
    }

    info!("parley stopped");
    served
}

/// Applies a fresh configuration on every SIGHUP.
///
/// The baseline only advances when every subsystem reloaded, so the next
/// signal retries a rebuild that failed.
async fn run_reload_loop(
    mut reloads: mpsc::Receiver<()>,
    coordinator: Arc<ReloadCoordinator>,
    mut current: ParleyConfig,
    config_path: Option<PathBuf>,
) {
    while reloads.recv().await.is_some() {
        let next = match load(config_path.as_deref()) {
            Ok(next) => next,
            Err(errors) => {
                for e in &errors {
                    warn!(error = %e, "configuration rejected, keeping current settings");
                }
                continue;
            }
        };

        let report = coordinator.apply(&current, &next).await;
        info!(
            reloaded = report.reloaded.len(),
            failed = report.failed.len(),
            restart_required = report.restart_required.len(),
            "configuration reload finished"
        );
        if report.failed.is_empty() {
            current = next;
        }
    }
}

/// Loads and validates configuration from `path`, or from the standard
/// locations when none is given.
pub fn load(path: Option<&Path>) -> Result<ParleyConfig, Vec<ConfigError>> {
    match path {
        Some(path) => parley_config::load_and_validate_path(path),
        None => parley_config::load_and_validate(),
    }
}

