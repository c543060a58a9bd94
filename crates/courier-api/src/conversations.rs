use std::collections::HashMap;

use courier_db::{MessageBody, StoreError};
use courier_types::models::{ConversationSummary, HistoryEntry, SearchHit};

use crate::error::QueryError;
use crate::mailbox::{open_or_placeholder, render};
use crate::state::AppStateInner;

/// Per-sender roll-up of `user`'s inbox, in order of each sender's first message.
pub fn summarize(state: &AppStateInner, user: &str) -> Result<Vec<ConversationSummary>, StoreError> {
    state.store.with_doc(|doc| {
        let mut summaries: Vec<ConversationSummary> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for m in doc.mailbox(user) {
            let slot = *index.entry(m.from.as_str()).or_insert_with(|| {
                summaries.push(ConversationSummary {
                    peer: m.from.clone(),
                    total: 0,
                    unread: 0,
                    last_ts: m.timestamp,
                    last_preview: preview(state, &m.body),
                });
                summaries.len() - 1
            });

            let summary = &mut summaries[slot];
            summary.total += 1;
            if !m.read {
                summary.unread += 1;
            }
            // Strictly newer only: equal timestamps keep the first seen.
            if m.timestamp > summary.last_ts {
                summary.last_ts = m.timestamp;
                summary.last_preview = preview(state, &m.body);
            }
        }

        Ok(summaries)
    })
}

/// Both directions of the `user`/`peer` thread, oldest first.
/// Marks the messages `peer` sent to `user` as read.
pub fn conversation_detail(
    state: &AppStateInner,
    user: &str,
    peer: &str,
) -> Result<Vec<HistoryEntry>, QueryError> {
    if peer.is_empty() {
        return Err(QueryError::MissingPeer);
    }

    state.store.with_doc_mut(|doc| {
        if !doc.has_user(peer) {
            return Err(QueryError::NoSuchPeer);
        }

        let inbound = doc
            .mailbox(user)
            .iter()
            .filter(|m| m.from == peer)
            .map(|m| (peer, user, m));
        let outbound = doc
            .mailbox(peer)
            .iter()
            .filter(|m| m.from == user)
            .map(|m| (user, peer, m));

        let mut history: Vec<HistoryEntry> = inbound
            .chain(outbound)
            .map(|(from, to, m)| HistoryEntry {
                from: from.to_string(),
                to: to.to_string(),
                msg: render(&state.cipher, &m.body),
                timestamp: m.timestamp,
                kind: m.body.kind(),
                filename: m.body.filename().map(str::to_string),
            })
            .collect();
        // Stable: equal timestamps keep inbound-then-outbound storage order.
        history.sort_by_key(|h| h.timestamp);

        for m in doc.mailbox_mut(user).iter_mut().filter(|m| m.from == peer) {
            m.read = true;
        }

        Ok(history)
    })
}

/// Case-insensitive substring search over text messages sent to or by `user`,
/// newest first. File messages never match.
pub fn search(state: &AppStateInner, user: &str, query: &str) -> Result<Vec<SearchHit>, QueryError> {
    if query.trim().is_empty() {
        return Err(QueryError::EmptyQuery);
    }
    let needle = query.to_lowercase();

    state.store.with_doc(|doc| {
        let inbound = doc.mailbox(user).iter().map(|m| (m.from.as_str(), user, m));
        let outbound = doc
            .messages
            .iter()
            .filter(|(owner, _)| owner.as_str() != user)
            .flat_map(|(owner, mailbox)| {
                let owner = owner.as_str();
                mailbox
                    .iter()
                    .filter(move |m| m.from == user)
                    .map(move |m| (user, owner, m))
            });

        let mut hits: Vec<SearchHit> = inbound
            .chain(outbound)
            .filter_map(|(from, to, m)| {
                let MessageBody::Text { msg } = &m.body else {
                    return None;
                };
                let text = state.cipher.open_text(msg).ok()?;
                text.to_lowercase().contains(&needle).then(|| SearchHit {
                    from: from.to_string(),
                    to: to.to_string(),
                    msg: text,
                    timestamp: m.timestamp,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(hits)
    })
}

fn preview(state: &AppStateInner, body: &MessageBody) -> String {
    match body {
        MessageBody::Text { msg } => open_or_placeholder(&state.cipher, msg),
        MessageBody::File { filename, .. } => format!("[file] {}", filename),
    }
}
