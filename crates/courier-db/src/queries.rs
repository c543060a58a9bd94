use crate::models::{Document, MessageRecord, TypingState, UserRecord};

impl Document {
    // -- Users --

    pub fn user(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    pub fn user_mut(&mut self, username: &str) -> Option<&mut UserRecord> {
        self.users.get_mut(username)
    }

    pub fn has_user(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    /// Insert a new user together with an empty mailbox.
    pub fn insert_user(&mut self, username: &str, record: UserRecord) {
        self.users.insert(username.to_string(), record);
        self.messages.entry(username.to_string()).or_default();
    }

    // -- Mailboxes --

    pub fn mailbox(&self, username: &str) -> &[MessageRecord] {
        self.messages.get(username).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn mailbox_mut(&mut self, username: &str) -> &mut Vec<MessageRecord> {
        self.messages.entry(username.to_string()).or_default()
    }

    /// Drop every message in `owner`'s mailbox sent by `from`. Returns how many went.
    pub fn purge_from(&mut self, owner: &str, from: &str) -> usize {
        match self.messages.get_mut(owner) {
            Some(mailbox) => {
                let before = mailbox.len();
                mailbox.retain(|m| m.from != from);
                before - mailbox.len()
            }
            None => 0,
        }
    }

    // -- Typing --

    pub fn typing_state(&self, observed: &str, peer: &str) -> Option<&TypingState> {
        self.typing.get(observed).and_then(|states| states.get(peer))
    }

    pub fn set_typing_state(&mut self, observed: &str, peer: &str, state: TypingState) {
        self.typing
            .entry(observed.to_string())
            .or_default()
            .insert(peer.to_string(), state);
    }
}
