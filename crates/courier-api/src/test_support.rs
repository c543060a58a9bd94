use std::sync::Arc;

use argon2::Params;
use chrono::{DateTime, Utc};

use courier_crypto::{MessageCipher, keys::generate_key};
use courier_db::Store;

use crate::auth::AuthPolicy;
use crate::clock::ManualClock;
use crate::state::{AppState, AppStateInner};

/// Fresh state over a scratch store, a stopped clock and cheap password hashing.
pub fn harness() -> (AppState, Arc<ManualClock>) {
    let path = std::env::temp_dir()
        .join(format!("courier_api_{}", uuid::Uuid::new_v4()))
        .join("db.json");
    let store = Store::open(&path).unwrap();

    let start: DateTime<Utc> = "2026-03-01T12:00:00Z".parse().unwrap();
    let clock = Arc::new(ManualClock::new(start));

    let policy = AuthPolicy {
        hash_params: Params::new(8, 1, 1, None).unwrap(),
        ..AuthPolicy::default()
    };

    let state = AppStateInner::new(store, MessageCipher::new(generate_key()))
        .with_clock(clock.clone())
        .with_policy(policy);
    (Arc::new(state), clock)
}

/// Register and log in a user.
pub fn sign_up(state: &AppStateInner, username: &str) {
    crate::auth::register(state, username, "secret1").unwrap();
    crate::auth::login(state, username, "secret1").unwrap();
}
