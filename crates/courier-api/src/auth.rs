use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use courier_db::UserRecord;

use crate::error::{LoginError, RegisterError};
use crate::state::AppStateInner;

/// Failed attempts that trigger a lockout.
pub const MAX_STRIKES: u8 = 3;

#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub min_password_len: usize,
    pub lockout: Duration,
    /// Cost parameters for newly hashed passwords. Verification reads the
    /// parameters embedded in each stored hash.
    pub hash_params: Params,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            min_password_len: 6,
            lockout: Duration::minutes(10),
            hash_params: Params::default(),
        }
    }
}

pub fn register(state: &AppStateInner, username: &str, password: &str) -> Result<(), RegisterError> {
    if username.is_empty() || password.is_empty() {
        return Err(RegisterError::MissingField);
    }
    let min = state.policy.min_password_len;
    if password.chars().count() < min {
        return Err(RegisterError::PasswordTooShort { min });
    }

    // Hash outside the store lock; Argon2 is deliberately slow.
    let password_hash = hash_password(&state.policy.hash_params, password)?;
    let now = state.clock.now();

    state.store.with_doc_mut(|doc| {
        if doc.has_user(username) {
            return Err(RegisterError::UserExists);
        }
        doc.insert_user(username, UserRecord::new(password_hash, now));
        Ok(())
    })?;

    info!("User registered: {}", username);
    Ok(())
}

/// Outcome of one credential check, applied to the record under the lock.
enum Attempt {
    Accepted,
    Strike(u8),
    Locked(DateTime<Utc>),
    StillLocked(DateTime<Utc>),
}

pub fn login(state: &AppStateInner, username: &str, password: &str) -> Result<(), LoginError> {
    let now = state.clock.now();

    let record = state
        .store
        .with_doc(|doc| Ok::<_, LoginError>(doc.user(username).cloned()))?
        .ok_or(LoginError::NoSuchUser)?;

    if let Some(until) = record.locked_until {
        if until > now {
            return Err(LoginError::LockedOut { until });
        }
    }

    let matched = verify_password(&record.password_hash, password)?;
    let lockout = state.policy.lockout;

    let attempt = state.store.with_doc_mut(|doc| {
        let user = doc.user_mut(username).ok_or(LoginError::NoSuchUser)?;

        // An expired lock clears itself and the attempt proceeds.
        if let Some(until) = user.locked_until {
            if until > now {
                return Ok::<_, LoginError>(Attempt::StillLocked(until));
            }
            user.locked_until = None;
            user.strikes = 0;
        }

        if matched {
            user.strikes = 0;
            return Ok(Attempt::Accepted);
        }

        user.strikes = user.strikes.saturating_add(1);
        if user.strikes >= MAX_STRIKES {
            let until = now + lockout;
            user.locked_until = Some(until);
            user.strikes = 0;
            Ok(Attempt::Locked(until))
        } else {
            Ok(Attempt::Strike(user.strikes))
        }
    })?;

    match attempt {
        Attempt::Accepted => {
            state.sessions.open(username, now);
            info!("User logged in: {}", username);
            Ok(())
        }
        Attempt::Strike(strike) => {
            warn!("Failed login for {} (strike {}/{})", username, strike, MAX_STRIKES);
            Err(LoginError::BadCredentials { strike })
        }
        Attempt::Locked(until) => {
            warn!("User locked out: {} until {}", username, until);
            Err(LoginError::LockedAfterThreeStrikes { until })
        }
        Attempt::StillLocked(until) => Err(LoginError::LockedOut { until }),
    }
}

fn hash_password(params: &Params, password: &str) -> Result<String, RegisterError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| RegisterError::Hash)?
        .to_string();
    Ok(hash)
}

fn verify_password(stored: &str, password: &str) -> Result<bool, LoginError> {
    let parsed = PasswordHash::new(stored).map_err(|_| LoginError::CorruptCredential)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::harness;

    #[test]
    fn register_validates_input() {
        let (state, _) = harness();

        assert!(matches!(register(&state, "", "secret1"), Err(RegisterError::MissingField)));
        assert!(matches!(register(&state, "erika", ""), Err(RegisterError::MissingField)));
        assert!(matches!(
            register(&state, "erika", "abc"),
            Err(RegisterError::PasswordTooShort { min: 6 })
        ));

        register(&state, "erika", "secret1").unwrap();
        assert!(matches!(register(&state, "erika", "secret1"), Err(RegisterError::UserExists)));
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let (state, _) = harness();
        register(&state, "erika", "secret1").unwrap();
        register(&state, "Erika", "secret1").unwrap();
        assert!(matches!(login(&state, "ERIKA", "secret1"), Err(LoginError::NoSuchUser)));
    }

    #[test]
    fn password_is_never_stored_in_plain() {
        let (state, _) = harness();
        register(&state, "erika", "secret1").unwrap();

        let raw = std::fs::read_to_string(state.store.path()).unwrap();
        assert!(!raw.contains("secret1"));
        assert!(raw.contains("$argon2id$"));
    }

    #[test]
    fn login_opens_session() {
        let (state, _) = harness();
        register(&state, "erika", "secret1").unwrap();
        assert!(!state.sessions.is_active("erika"));

        login(&state, "erika", "secret1").unwrap();
        assert!(state.sessions.is_active("erika"));
    }

    #[test]
    fn three_strikes_then_locked() {
        let (state, clock) = harness();
        register(&state, "erika", "secret1").unwrap();

        assert!(matches!(login(&state, "erika", "nope"), Err(LoginError::BadCredentials { strike: 1 })));
        assert!(matches!(login(&state, "erika", "nope"), Err(LoginError::BadCredentials { strike: 2 })));
        let err = login(&state, "erika", "nope").unwrap_err();
        assert!(matches!(err, LoginError::LockedAfterThreeStrikes { .. }));
        assert_eq!(err.strike(), Some(3));

        // Even the right password is refused inside the window.
        clock.advance(Duration::minutes(9));
        assert!(matches!(login(&state, "erika", "secret1"), Err(LoginError::LockedOut { .. })));
        assert!(!state.sessions.is_active("erika"));

        clock.advance(Duration::minutes(1));
        login(&state, "erika", "secret1").unwrap();

        let rec = state
            .store
            .with_doc(|doc| Ok::<_, LoginError>(doc.user("erika").cloned()))
            .unwrap()
            .unwrap();
        assert_eq!(rec.strikes, 0);
        assert!(rec.locked_until.is_none());
    }

    #[test]
    fn expired_lock_counts_fresh_strikes() {
        let (state, clock) = harness();
        register(&state, "erika", "secret1").unwrap();
        for _ in 0..3 {
            let _ = login(&state, "erika", "nope");
        }
        clock.advance(Duration::minutes(11));

        assert!(matches!(login(&state, "erika", "nope"), Err(LoginError::BadCredentials { strike: 1 })));
    }

    #[test]
    fn success_resets_strikes() {
        let (state, _) = harness();
        register(&state, "erika", "secret1").unwrap();
        let _ = login(&state, "erika", "wrong");
        let _ = login(&state, "erika", "wrong");
        login(&state, "erika", "secret1").unwrap();

        assert!(matches!(login(&state, "erika", "wrong"), Err(LoginError::BadCredentials { strike: 1 })));
    }

    #[test]
    fn unknown_user() {
        let (state, _) = harness();
        let err = login(&state, "ghost", "whatever").unwrap_err();
        assert!(matches!(err, LoginError::NoSuchUser));
        assert_eq!(err.strike(), None);
    }
}
