pub mod auth;
pub mod clock;
pub mod conversations;
pub mod error;
pub mod mailbox;
pub mod presence;
pub mod session;
pub mod state;

pub use state::{AppState, AppStateInner};

#[cfg(test)]
mod test_support;
