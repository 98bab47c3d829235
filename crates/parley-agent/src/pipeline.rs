// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch pipeline: one inbound event in, one terminal outcome out.
//!
//! Cheap checks run first (event filter, attachments, length, transfer
//! keywords, canned answers, human-engaged suppression). Anything that gets
//! past them is evaluated on its own task, which acts as the fault boundary:
//! a stage error or a panic becomes an escalation instead of a lost event.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{FixedOffset, Utc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use parley_core::context::DispatchContext;
use parley_core::error::ParleyError;
use parley_core::types::{
    CompletionRequest, ConversationId, ConversationRef, ConversationStatus, DispatchOutcome,
    EscalationReason, InboundEvent, SuppressReason, Turn,
};

use crate::canned::CannedResponses;
use crate::gather::{EvidenceGatherer, Gathered};
use crate::services::Services;

/// Upper bound for each platform side effect after the decision is made.
const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DispatchPipeline {
    services: Arc<ArcSwap<Services>>,
    canned: Arc<CannedResponses>,
    shutdown: CancellationToken,
    background: TaskTracker,
    action_timeout: Duration,
}

impl DispatchPipeline {
    pub fn new(
        services: Arc<ArcSwap<Services>>,
        canned: Arc<CannedResponses>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            services,
            canned,
            shutdown,
            background: TaskTracker::new(),
            action_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Decides on `event`, performs the matching platform action and
    /// schedules the history append.
    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        let services = self.services.load_full();
        let conversation = event.conversation_ref();

        let mut typing = false;
        let outcome = match self.fast_path(&services, &event).await {
            Some(outcome) => outcome,
            None => {
                let ctx = DispatchContext::linked(services.policy.budget, &self.shutdown);
                typing = act(
                    self.action_timeout,
                    conversation,
                    "toggle_typing",
                    services.actuator.toggle_typing(conversation, true),
                )
                .await;
                self.evaluate_contained(&services, ctx, &event).await
            }
        };

        self.finalize_contained(&services, &event, &outcome, typing).await;

        match &outcome {
            DispatchOutcome::Answered(_) => info!(
                conversation_id = %conversation.conversation_id,
                account_id = %conversation.account_id,
                "dispatch answered"
            ),
            DispatchOutcome::Escalated(reason) => info!(
                conversation_id = %conversation.conversation_id,
                account_id = %conversation.account_id,
                reason = reason.code(),
                "dispatch escalated"
            ),
            DispatchOutcome::Suppressed(reason) => debug!(
                conversation_id = %conversation.conversation_id,
                reason = %reason,
                "dispatch suppressed"
            ),
        }
        outcome
    }

    /// Waits for scheduled history appends to finish.
    pub async fn wait_background(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    async fn fast_path(
        &self,
        services: &Arc<Services>,
        event: &InboundEvent,
    ) -> Option<DispatchOutcome> {
        if !event.is_message_created() {
            return Some(DispatchOutcome::Suppressed(
                SuppressReason::NotMessageCreated,
            ));
        }
        if event.is_human_reply() {
            let text = event.text();
            if !text.trim().is_empty() {
                append_later(
                    &self.background,
                    services,
                    event.conversation_ref().conversation_id,
                    vec![Turn::assistant(text)],
                );
            }
            return Some(DispatchOutcome::Suppressed(SuppressReason::HumanReply));
        }
        if !event.is_from_contact() {
            return Some(DispatchOutcome::Suppressed(SuppressReason::NotFromContact));
        }

        if !event.attachments.is_empty() {
            return Some(DispatchOutcome::Escalated(
                EscalationReason::UnsupportedAttachment,
            ));
        }
        let text = event.text();
        if services.policy.is_too_long(text) {
            return Some(DispatchOutcome::Escalated(EscalationReason::MessageTooLong));
        }
        if services.policy.is_transfer_request(text) {
            return Some(DispatchOutcome::Escalated(
                EscalationReason::UserRequestedTransfer,
            ));
        }
        if let Some(answer) = self.canned.lookup(text).await {
            debug!(conversation_id = %event.conversation.id, "canned response matched");
            return Some(DispatchOutcome::Answered(answer));
        }
        if event.conversation.status == ConversationStatus::Open {
            return Some(DispatchOutcome::Suppressed(SuppressReason::HumanEngaged));
        }
        None
    }

    async fn evaluate_contained(
        &self,
        services: &Arc<Services>,
        ctx: DispatchContext,
        event: &InboundEvent,
    ) -> DispatchOutcome {
        let conversation = event.conversation_ref();
        let task = tokio::spawn(evaluate(
            Arc::clone(services),
            ctx.clone(),
            event.text().to_string(),
            conversation,
        ));
        let result = match task.await {
            Ok(result) => result,
            Err(join_err) => Err(ParleyError::Internal(format!(
                "dispatch task failed: {join_err}"
            ))),
        };
        // Nothing bound to this dispatch may outlive it.
        ctx.cancel();

        result.unwrap_or_else(|e| {
            let reason = escalation_for(&e);
            error!(
                conversation_id = %conversation.conversation_id,
                error = %e,
                reason = reason.code(),
                "dispatch failed, escalating"
            );
            DispatchOutcome::Escalated(reason)
        })
    }

    /// Performs the platform side effects for `outcome` on their own task,
    /// so a panicking actuator cannot take the outcome down with it.
    async fn finalize_contained(
        &self,
        services: &Arc<Services>,
        event: &InboundEvent,
        outcome: &DispatchOutcome,
        typing: bool,
    ) {
        let conversation = event.conversation_ref();
        let task = tokio::spawn(finalize(
            Finalizer {
                services: Arc::clone(services),
                background: self.background.clone(),
                action_timeout: self.action_timeout,
            },
            event.clone(),
            outcome.clone(),
            typing,
        ));
        if let Err(e) = task.await {
            error!(
                conversation_id = %conversation.conversation_id,
                error = %e,
                "platform actions failed after the decision"
            );
        }
    }
}

struct Finalizer {
    services: Arc<Services>,
    background: TaskTracker,
    action_timeout: Duration,
}

async fn finalize(
    finalizer: Finalizer,
    event: InboundEvent,
    outcome: DispatchOutcome,
    typing: bool,
) {
    let Finalizer {
        services,
        background,
        action_timeout,
    } = finalizer;
    let conversation = event.conversation_ref();
    if typing {
        act(
            action_timeout,
            conversation,
            "toggle_typing",
            services.actuator.toggle_typing(conversation, false),
        )
        .await;
    }

    match outcome {
        DispatchOutcome::Answered(answer) => {
            act(
                action_timeout,
                conversation,
                "send_message",
                services.actuator.send_message(conversation, &answer),
            )
            .await;
            append_later(
                &background,
                &services,
                conversation.conversation_id,
                vec![Turn::user(event.text()), Turn::assistant(answer)],
            );
        }
        DispatchOutcome::Escalated(reason) => {
            act(
                action_timeout,
                conversation,
                "set_status",
                services
                    .actuator
                    .set_status(conversation, ConversationStatus::Open),
            )
            .await;
            let note = escalation_note(reason, services.clock);
            act(
                action_timeout,
                conversation,
                "create_private_note",
                services.actuator.create_private_note(conversation, &note),
            )
            .await;
            if !event.text().trim().is_empty() {
                append_later(
                    &background,
                    &services,
                    conversation.conversation_id,
                    vec![Turn::user(event.text())],
                );
            }
        }
        DispatchOutcome::Suppressed(_) => {}
    }
}

/// Runs a platform action; failures are logged and reported as `false`.
async fn act(
    limit: Duration,
    conversation: ConversationRef,
    action: &'static str,
    fut: impl Future<Output = Result<(), ParleyError>>,
) -> bool {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(
                conversation_id = %conversation.conversation_id,
                action,
                error = %e,
                "platform action failed"
            );
            false
        }
        Err(_) => {
            warn!(
                conversation_id = %conversation.conversation_id,
                action,
                "platform action timed out"
            );
            false
        }
    }
}

fn append_later(
    background: &TaskTracker,
    services: &Arc<Services>,
    conversation_id: ConversationId,
    turns: Vec<Turn>,
) {
    let history = Arc::clone(&services.history);
    background.spawn(async move {
        match history.append(conversation_id, &turns).await {
            Ok(true) => debug!(%conversation_id, turns = turns.len(), "history appended"),
            Ok(false) => debug!(%conversation_id, "history not cached, append skipped"),
            Err(e) => warn!(%conversation_id, error = %e, "history append failed"),
        }
    });
}

async fn evaluate(
    services: Arc<Services>,
    ctx: DispatchContext,
    content: String,
    conversation: ConversationRef,
) -> Result<DispatchOutcome, ParleyError> {
    let policy = &services.policy;
    let gatherer = EvidenceGatherer::new(
        Arc::clone(&services.search),
        Arc::clone(&services.history),
        policy.top_k,
        policy.high_confidence_threshold,
    );

    let bundle = match gatherer.gather(&ctx, &content, conversation).await? {
        Gathered::EarlyAnswer(answer) => return Ok(DispatchOutcome::Answered(answer)),
        Gathered::Evidence(bundle) => bundle,
    };

    let reference_docs: Vec<String> = bundle
        .hits
        .into_iter()
        .filter(|hit| hit.similarity >= policy.inclusion_threshold)
        .map(|hit| hit.answer)
        .collect();
    debug!(
        conversation_id = %conversation.conversation_id,
        docs = reference_docs.len(),
        turns = bundle.history.len(),
        "requesting completion"
    );

    let request = CompletionRequest {
        system_prompt: policy.system_prompt.clone(),
        user_content: content,
        reference_docs,
        history: bundle.history,
        temperature: policy.temperature,
    };

    match ctx.run(services.completion.complete(request)).await {
        Ok(text) if !text.trim().is_empty() => Ok(DispatchOutcome::Answered(text)),
        Ok(_) | Err(ParleyError::EmptyCompletion) => Ok(DispatchOutcome::Escalated(
            EscalationReason::EmptyModelResponse,
        )),
        Err(e) if e.is_cancelled() || e.is_timeout() => Err(e),
        Err(e) => {
            warn!(
                conversation_id = %conversation.conversation_id,
                error = %e,
                "completion failed"
            );
            Ok(DispatchOutcome::Escalated(EscalationReason::CompletionFailed))
        }
    }
}

fn escalation_for(err: &ParleyError) -> EscalationReason {
    if err.is_timeout() {
        EscalationReason::DeadlineExceeded
    } else if err.is_cancelled() {
        EscalationReason::SystemError
    } else if matches!(err, ParleyError::GatherFailed { .. }) {
        EscalationReason::HistoryUnavailable
    } else {
        EscalationReason::SystemError
    }
}

fn escalation_note(reason: EscalationReason, clock: FixedOffset) -> String {
    let at = Utc::now().with_timezone(&clock);
    format!(
        "Handed over to a human agent at {} ({}: {}).",
        at.format("%Y-%m-%d %H:%M:%S %:z"),
        reason.code(),
        reason
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_wins_over_history_failure() {
        let err = ParleyError::GatherFailed {
            source: Box::new(ParleyError::Timeout {
                duration: Duration::from_secs(60),
            }),
        };
        assert_eq!(escalation_for(&err), EscalationReason::DeadlineExceeded);
    }

    #[test]
    fn gather_failure_maps_to_history_unavailable() {
        let err = ParleyError::GatherFailed {
            source: Box::new(ParleyError::Upstream {
                message: "down".into(),
                source: None,
            }),
        };
        assert_eq!(escalation_for(&err), EscalationReason::HistoryUnavailable);
        assert_eq!(
            escalation_for(&ParleyError::Internal("boom".into())),
            EscalationReason::SystemError
        );
    }

    #[test]
    fn cancelled_gather_is_a_system_error() {
        let err = ParleyError::GatherFailed {
            source: Box::new(ParleyError::Cancelled),
        };
        assert_eq!(escalation_for(&err), EscalationReason::SystemError);
        assert_eq!(
            escalation_for(&ParleyError::Cancelled),
            EscalationReason::SystemError
        );
    }

    #[test]
    fn escalation_note_uses_clock_offset() {
        let clock = FixedOffset::east_opt(8 * 3600).unwrap();
        let note = escalation_note(EscalationReason::UserRequestedTransfer, clock);
        assert!(note.contains("+08:00"));
        assert!(note.contains("user_requested_transfer: user requested transfer"));
    }
}
