// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded worker pool that runs dispatches detached from the webhook.
//!
//! Events are queued on an mpsc channel. A single loop takes a semaphore
//! permit per event and runs the dispatch on a `JoinSet`, so at most
//! `max_in_flight` dispatches run at once.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use parley_core::error::ParleyError;
use parley_core::types::{DispatchOutcome, InboundEvent};

use crate::pipeline::DispatchPipeline;

/// Handle for submitting events to the pool.
pub struct DispatchPool {
    tx: mpsc::Sender<InboundEvent>,
    worker: JoinHandle<()>,
}

impl DispatchPool {
    /// Starts the dispatch loop.
    ///
    /// `queue_capacity` bounds the events waiting for a permit. The loop stops
    /// taking new events once `shutdown` is cancelled and drains what is
    /// already running.
    pub fn start(
        pipeline: Arc<DispatchPipeline>,
        max_in_flight: usize,
        queue_capacity: usize,
        shutdown: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let worker = tokio::spawn(run_dispatch_loop(
            rx,
            pipeline,
            max_in_flight.max(1),
            shutdown,
        ));
        Self { tx, worker }
    }

    /// Queues an event without waiting.
    pub fn submit(&self, event: InboundEvent) -> Result<(), ParleyError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                ParleyError::Internal("dispatch queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                ParleyError::Internal("dispatch pool is shut down".to_string())
            }
        })
    }

    /// A cloneable sender for producers such as the webhook.
    pub fn sender(&self) -> mpsc::Sender<InboundEvent> {
        self.tx.clone()
    }

    /// Closes the queue and waits for in-flight dispatches to finish.
    pub async fn shutdown(self) {
        let Self { tx, worker } = self;
        drop(tx);
        if let Err(e) = worker.await {
            error!(error = %e, "dispatch loop terminated abnormally");
        }
    }
}

async fn run_dispatch_loop(
    mut rx: mpsc::Receiver<InboundEvent>,
    pipeline: Arc<DispatchPipeline>,
    max_in_flight: usize,
    shutdown: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(max_in_flight));
    let mut workers = JoinSet::new();

    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let pipeline = Arc::clone(&pipeline);
        workers.spawn(async move {
            let _permit = permit;
            pipeline.dispatch(event).await
        });

        while let Some(result) = workers.try_join_next() {
            log_worker_result(result);
        }
    }

    rx.close();
    let abandoned = std::iter::from_fn(|| rx.try_recv().ok()).count();
    if abandoned > 0 {
        warn!(count = abandoned, "dropping queued events at shutdown");
    }

    info!(in_flight = workers.len(), "dispatch loop stopping, draining workers");
    while let Some(result) = workers.join_next().await {
        log_worker_result(result);
    }
    pipeline.wait_background().await;
    debug!("dispatch loop drained");
}

fn log_worker_result(result: Result<DispatchOutcome, JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "dispatch worker panicked");
    }
}
