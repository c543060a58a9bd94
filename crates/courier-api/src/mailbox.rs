use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use tracing::{info, warn};

use courier_crypto::{MessageCipher, digest::content_digest};
use courier_db::{MessageBody, MessageRecord, StoreError};
use courier_types::models::InboxMessage;

use crate::error::{DeliverError, QueryError};
use crate::state::AppStateInner;

/// Placeholder shown in place of a body that fails to decrypt.
pub const DECRYPT_ERROR: &str = "[decrypt error]";

/// What a sender hands to `deliver`.
#[derive(Debug, Clone, Copy)]
pub enum Outgoing<'a> {
    Text(&'a str),
    /// `content` is base64.
    File { filename: &'a str, content: &'a str },
}

pub fn deliver(
    state: &AppStateInner,
    sender: &str,
    recipient: &str,
    outgoing: Outgoing<'_>,
) -> Result<(), DeliverError> {
    if sender.is_empty() || recipient.is_empty() {
        return Err(DeliverError::MissingFields);
    }

    // Seal before taking the store lock.
    let body = match outgoing {
        Outgoing::Text(text) => {
            if text.is_empty() {
                return Err(DeliverError::MissingFields);
            }
            MessageBody::Text {
                msg: state.cipher.seal(text.as_bytes())?,
            }
        }
        Outgoing::File { filename, content } => {
            if filename.is_empty() || content.is_empty() {
                return Err(DeliverError::MissingFields);
            }
            let bytes = B64.decode(content).map_err(|_| DeliverError::InvalidContent)?;
            MessageBody::File {
                msg: state.cipher.seal(&bytes)?,
                filename: filename.to_string(),
                sha256: content_digest(&bytes),
            }
        }
    };
    let kind = body.kind();

    state.store.with_doc_mut(|doc| {
        if !doc.has_user(recipient) {
            return Err(DeliverError::NoSuchRecipient);
        }
        // Stamped under the lock so timestamps follow commit order.
        let timestamp = state.clock.now();
        doc.mailbox_mut(recipient).push(MessageRecord {
            from: sender.to_string(),
            timestamp,
            read: false,
            body,
        });
        Ok(())
    })?;

    info!("Message delivered: {} -> {} ({:?})", sender, recipient, kind);
    Ok(())
}

/// Every message addressed to `user`, in storage order. Marks them all read.
pub fn fetch_inbox(state: &AppStateInner, user: &str) -> Result<Vec<InboxMessage>, StoreError> {
    state.store.with_doc_mut(|doc| {
        let mailbox = doc.mailbox_mut(user);
        let messages = mailbox
            .iter()
            .map(|m| InboxMessage {
                from: m.from.clone(),
                msg: render(&state.cipher, &m.body),
                timestamp: m.timestamp,
                kind: m.body.kind(),
                read: m.read,
            })
            .collect();
        for m in mailbox.iter_mut() {
            m.read = true;
        }
        Ok(messages)
    })
}

/// Remove the whole thread between `user` and `peer` from both mailboxes.
/// Returns how many records were dropped.
pub fn delete_conversation(state: &AppStateInner, user: &str, peer: &str) -> Result<usize, QueryError> {
    if peer.is_empty() {
        return Err(QueryError::MissingPeer);
    }

    let removed = state.store.with_doc_mut(|doc| {
        Ok::<_, QueryError>(doc.purge_from(user, peer) + doc.purge_from(peer, user))
    })?;

    info!("Conversation cleared between {} and {} ({} messages)", user, peer, removed);
    Ok(removed)
}

/// Listing text for a stored body: plaintext for text, a marker for files.
pub(crate) fn render(cipher: &MessageCipher, body: &MessageBody) -> String {
    match body {
        MessageBody::Text { msg } => open_or_placeholder(cipher, msg),
        MessageBody::File { filename, .. } => format!("[file] {} (stored securely)", filename),
    }
}

pub(crate) fn open_or_placeholder(cipher: &MessageCipher, sealed: &str) -> String {
    match cipher.open_text(sealed) {
        Ok(text) => text,
        Err(e) => {
            warn!("Skipping unreadable message body: {}", e);
            DECRYPT_ERROR.to_string()
        }
    }
}
