// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upstream transcript to model history mapping.

use parley_core::types::{History, MessageDirection, SenderKind, TranscriptMessage, Turn};

/// Builds the model-facing history from a platform transcript.
///
/// Private notes and blank messages are dropped. The most recent message whose
/// content equals `exclude_text` is removed, since the triggering message is
/// sent to the model separately. Incoming contact messages become user turns,
/// outgoing messages become assistant turns, everything else is discarded.
pub fn history_from_transcript(messages: Vec<TranscriptMessage>, exclude_text: &str) -> History {
    let mut kept: Vec<(MessageDirection, Option<SenderKind>, String)> = messages
        .into_iter()
        .filter(|m| !m.private)
        .filter_map(|m| {
            let content = m.content?;
            if content.trim().is_empty() {
                None
            } else {
                Some((m.direction, m.sender, content))
            }
        })
        .collect();

    if !exclude_text.is_empty()
        && let Some(pos) = kept.iter().rposition(|(_, _, c)| c == exclude_text)
    {
        kept.remove(pos);
    }

    kept.into_iter()
        .filter_map(|(direction, sender, content)| match (direction, sender) {
            (MessageDirection::Incoming, Some(SenderKind::Contact)) => Some(Turn::user(content)),
            (MessageDirection::Outgoing, _) => Some(Turn::assistant(content)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .into()
}
