use std::sync::Arc;

use courier_crypto::MessageCipher;
use courier_db::Store;

use crate::auth::AuthPolicy;
use crate::clock::{Clock, SystemClock};
use crate::session::Sessions;

pub type AppState = Arc<AppStateInner>;

/// Everything a request handler needs: the store, the at-rest cipher,
/// the clock, live sessions and the auth policy.
pub struct AppStateInner {
    pub store: Store,
    pub cipher: MessageCipher,
    pub clock: Arc<dyn Clock>,
    pub sessions: Sessions,
    pub policy: AuthPolicy,
}

impl AppStateInner {
    pub fn new(store: Store, cipher: MessageCipher) -> Self {
        Self {
            store,
            cipher,
            clock: Arc::new(SystemClock),
            sessions: Sessions::default(),
            policy: AuthPolicy::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: AuthPolicy) -> Self {
        self.policy = policy;
        self
    }
}
