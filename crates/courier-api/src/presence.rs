use chrono::Duration;
use tracing::trace;

use courier_db::TypingState;

use crate::error::QueryError;
use crate::state::AppStateInner;

/// A typing flag older than this reads as not typing.
pub const TYPING_TTL: Duration = Duration::seconds(8);

/// Record that `observer` is (or stopped) typing to `peer`. `peer` must be a
/// registered user.
pub fn set_typing(
    state: &AppStateInner,
    observer: &str,
    peer: &str,
    is_typing: bool,
) -> Result<(), QueryError> {
    if peer.is_empty() {
        return Err(QueryError::MissingPeer);
    }
    let since = state.clock.now();

    state.store.with_doc_mut(|doc| {
        if !doc.has_user(peer) {
            return Err(QueryError::NoSuchPeer);
        }
        doc.set_typing_state(peer, observer, TypingState { typing: is_typing, since });
        Ok::<_, QueryError>(())
    })?;

    trace!("{} typing to {}: {}", observer, peer, is_typing);
    Ok(())
}

/// Whether `peer` is currently typing to `observer`.
pub fn get_typing(state: &AppStateInner, observer: &str, peer: &str) -> Result<bool, QueryError> {
    if peer.is_empty() {
        return Err(QueryError::MissingPeer);
    }
    let now = state.clock.now();

    state.store.with_doc(|doc| {
        Ok(doc
            .typing_state(observer, peer)
            .is_some_and(|s| s.typing && now - s.since < TYPING_TTL))
    })
}
