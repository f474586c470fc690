//! racf-pool: terminal session pooling for the RACF connector.
//!
//! Keeps a bounded set of logged-in mainframe sessions per host, one slot per
//! configured credential:
//! - **config**: `PoolConfiguration`, credentials, `racf-pool.toml` parsing
//! - **proxy**: per-slot `ConfigurationProxy` handed to the session factory
//! - **session**: `Session` / `SessionFactory` collaborator traits and `PooledSession`
//! - **pool**: `ConnectionPool` holding active, inactive, bad and in-use slots behind one gate
//! - **registry**: `PoolRegistry` keeping one pool per host, replaced on configuration change
//! - **reaper**: background task that logs out idle sessions and retires idle pools
//! - **error** / **messages**: `PoolError`, `ConnectorError`, message catalog

pub mod config;
mod entry;
pub mod error;
pub mod messages;
pub mod pool;
pub mod proxy;
pub mod reaper;
pub mod registry;
pub mod session;

#[cfg(test)]
mod testing;

pub use config::{Credential, PoolConfiguration, PoolKey, RegistrySettings, Secret};
pub use error::{ConnectorError, PoolError, PoolResult, SessionError};
pub use messages::{DefaultMessages, MessageCatalog};
pub use pool::{ConnectionPool, PoolStats};
pub use proxy::ConfigurationProxy;
pub use registry::{PoolRegistry, ReapReport};
pub use session::{PooledSession, Session, SessionFactory};
