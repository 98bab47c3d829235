// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-dispatch deadline and cancellation scope.
//!
//! A [`DispatchContext`] is created once per inbound event from the
//! configured budget. Every downstream call runs through [`DispatchContext::run`],
//! so no call outlives the budget and every call stops when the scope is
//! cancelled.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ParleyError;

/// Deadline plus cancellation token shared by every call of one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    budget: Duration,
    deadline: Instant,
    cancel: CancellationToken,
}

impl DispatchContext {
    /// Starts a new root scope that expires `budget` from now.
    pub fn with_budget(budget: Duration) -> Self {
        Self {
            budget,
            deadline: Instant::now() + budget,
            cancel: CancellationToken::new(),
        }
    }

    /// Starts a scope that is also cancelled when `parent` is cancelled.
    pub fn linked(budget: Duration, parent: &CancellationToken) -> Self {
        Self {
            budget,
            deadline: Instant::now() + budget,
            cancel: parent.child_token(),
        }
    }

    /// Derives a child scope with the same deadline.
    ///
    /// Cancelling the child leaves the parent running; cancelling the parent
    /// cancels the child.
    pub fn child(&self) -> Self {
        Self {
            budget: self.budget,
            deadline: self.deadline,
            cancel: self.cancel.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Runs `fut` bounded by the deadline and the cancellation token.
    ///
    /// Cancellation wins over a result that becomes ready at the same time.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ParleyError>
    where
        F: Future<Output = Result<T, ParleyError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ParleyError::Cancelled),
            result = tokio::time::timeout_at(self.deadline, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(ParleyError::Timeout { duration: self.budget }),
            },
        }
    }

    /// Sleeps for `duration` unless the scope ends first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), ParleyError> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
