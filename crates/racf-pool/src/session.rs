//! Session collaborator traits and the checked-out session wrapper.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SessionError;
use crate::proxy::ConfigurationProxy;

/// One opened interactive connection to a mainframe, bound to one slot.
///
/// The terminal protocol lives behind this trait; the pool only drives the
/// lifecycle.
pub trait Session: Send + fmt::Debug {
    /// Authenticate with the slot's credentials.
    fn login(&mut self) -> Result<(), SessionError>;
    /// End the authenticated session, keeping the transport.
    fn logout(&mut self) -> Result<(), SessionError>;
    /// Tear down the transport. Logs out first if still logged in.
    fn dispose(&mut self) -> Result<(), SessionError>;
    /// The slot view this session was created from.
    fn configuration(&self) -> &ConfigurationProxy;
}

/// Creates sessions for a slot: injected into the registry.
pub trait SessionFactory: Send + Sync {
    fn new_session(&self, config: ConfigurationProxy) -> Result<Box<dyn Session>, SessionError>;
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_session_id() -> u64 {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// A session checked out of a pool.
///
/// Hand it back with [`ConnectionPool::return_session`] or
/// [`ConnectionPool::return_broken_session`].
///
/// [`ConnectionPool::return_session`]: crate::ConnectionPool::return_session
/// [`ConnectionPool::return_broken_session`]: crate::ConnectionPool::return_broken_session
#[derive(Debug)]
pub struct PooledSession {
    id: u64,
    slot: usize,
    session: Box<dyn Session>,
}

impl PooledSession {
    pub(crate) fn new(id: u64, slot: usize, session: Box<dyn Session>) -> Self {
        Self { id, slot, session }
    }

    /// Process-unique id; the pool's in-use map is keyed by it.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn user_name(&self) -> String {
        self.session.configuration().user_name()
    }

    pub(crate) fn into_inner(self) -> Box<dyn Session> {
        self.session
    }
}

impl Deref for PooledSession {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}
