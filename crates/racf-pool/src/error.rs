//! Error types for the session pool.

use thiserror::Error;

use crate::messages::MessageCatalog;

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Failure reported by a session collaborator (factory, login, logout, dispose).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SessionError(pub String);

impl SessionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No slot could be acquired: every slot is bad, or in-use sessions did
    /// not drain within the close-all bound.
    #[error("no session available for {host}")]
    Exhausted { host: String },

    /// A session was returned that this pool did not hand out (or already took back).
    #[error("session {session_id} was not checked out from the pool for {host}")]
    UnknownSession { host: String, session_id: u64 },

    /// A single slot failed to open or log in.
    #[error("slot {slot} ({user}) failed to activate: {source}")]
    Activation {
        slot: usize,
        user: String,
        #[source]
        source: SessionError,
    },

    /// One or more slots failed verification in `test_all_connections`.
    #[error("connection test failed for {host}: {}", .failures.join("; "))]
    TestFailed { host: String, failures: Vec<String> },

    /// The pool was discarded by its registry.
    #[error("pool for {host} has been retired")]
    Retired { host: String },

    /// The pool gate was closed underneath a waiter.
    #[error("pool gate for {host} is closed")]
    GateClosed { host: String },
}

impl PoolError {
    /// Message catalog key for this error kind.
    pub fn message_key(&self) -> &'static str {
        match self {
            PoolError::Exhausted { .. } => "RACF_POOL_EXHAUSTED",
            PoolError::UnknownSession { .. } => "RACF_POOL_UNKNOWN_SESSION",
            PoolError::Activation { .. } => "RACF_POOL_ACTIVATION_FAILED",
            PoolError::TestFailed { .. } => "RACF_POOL_TEST_FAILED",
            PoolError::Retired { .. } => "RACF_POOL_RETIRED",
            PoolError::GateClosed { .. } => "RACF_POOL_GATE_CLOSED",
        }
    }

    /// Positional arguments for the message template.
    pub fn message_args(&self) -> Vec<String> {
        match self {
            PoolError::Exhausted { host }
            | PoolError::Retired { host }
            | PoolError::GateClosed { host } => vec![host.clone()],
            PoolError::UnknownSession { host, session_id } => {
                vec![session_id.to_string(), host.clone()]
            }
            PoolError::Activation { slot, user, source } => {
                vec![slot.to_string(), user.clone(), source.to_string()]
            }
            PoolError::TestFailed { host, failures } => {
                vec![host.clone(), failures.join("\n")]
            }
        }
    }

    /// Whether the pool can recover by trying another slot.
    pub fn is_slot_failure(&self) -> bool {
        matches!(self, PoolError::Activation { .. })
    }
}

/// The single failure kind handed up to connector operations.
///
/// Carries the catalog key and arguments alongside the rendered text so the
/// framework can re-localize if it wants to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConnectorError {
    pub key: String,
    pub args: Vec<String>,
    pub message: String,
}

impl ConnectorError {
    pub fn from_pool_error(error: &PoolError, catalog: &dyn MessageCatalog) -> Self {
        let key = error.message_key();
        let args = error.message_args();
        let message = catalog.get_message(key, &args);
        Self {
            key: key.to_string(),
            args,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::DefaultMessages;

    #[test]
    fn activation_is_the_only_slot_failure() {
        let activation = PoolError::Activation {
            slot: 1,
            user: "IBMUSER".to_string(),
            source: SessionError::new("bad password"),
        };
        assert!(activation.is_slot_failure());
        assert!(!PoolError::Exhausted { host: "mvs1".into() }.is_slot_failure());
    }

    #[test]
    fn test_failed_lists_every_slot() {
        let err = PoolError::TestFailed {
            host: "mvs1".to_string(),
            failures: vec!["slot 0: refused".into(), "slot 2: timeout".into()],
        };
        let text = err.to_string();
        assert!(text.contains("slot 0: refused"));
        assert!(text.contains("slot 2: timeout"));
    }

    #[test]
    fn connector_error_renders_through_catalog() {
        let err = PoolError::UnknownSession {
            host: "mvs1".to_string(),
            session_id: 42,
        };
        let connector = ConnectorError::from_pool_error(&err, &DefaultMessages);
        assert_eq!(connector.key, "RACF_POOL_UNKNOWN_SESSION");
        assert_eq!(connector.args, vec!["42".to_string(), "mvs1".to_string()]);
        assert!(connector.message.contains("42"));
        assert!(connector.message.contains("mvs1"));
    }
}
