//! Mock sessions shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{Credential, PoolConfiguration};
use crate::error::SessionError;
use crate::proxy::ConfigurationProxy;
use crate::session::{Session, SessionFactory};

#[derive(Debug, Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub disposes: AtomicUsize,
    /// Dispose calls on a session that was already disposed.
    pub double_disposes: AtomicUsize,
}

impl Counters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn disposes(&self) -> usize {
        self.disposes.load(Ordering::SeqCst)
    }

    pub fn double_disposes(&self) -> usize {
        self.double_disposes.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MockSession {
    config: ConfigurationProxy,
    counters: Arc<Counters>,
    fail_login: bool,
    fail_dispose: bool,
    logged_in: bool,
    disposed: bool,
}

impl Session for MockSession {
    fn login(&mut self) -> Result<(), SessionError> {
        if self.fail_login {
            return Err(SessionError::new(format!(
                "logon rejected for {}",
                self.config.user_name()
            )));
        }
        self.counters.logins.fetch_add(1, Ordering::SeqCst);
        self.logged_in = true;
        Ok(())
    }

    fn logout(&mut self) -> Result<(), SessionError> {
        self.counters.logouts.fetch_add(1, Ordering::SeqCst);
        self.logged_in = false;
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), SessionError> {
        self.counters.disposes.fetch_add(1, Ordering::SeqCst);
        if self.disposed {
            self.counters.double_disposes.fetch_add(1, Ordering::SeqCst);
        }
        self.disposed = true;
        self.logged_in = false;
        if self.fail_dispose {
            return Err(SessionError::new("terminal hung"));
        }
        Ok(())
    }

    fn configuration(&self) -> &ConfigurationProxy {
        &self.config
    }
}

#[derive(Debug, Default)]
pub struct MockFactory {
    pub counters: Arc<Counters>,
    failing_users: Mutex<HashSet<String>>,
    fail_dispose: AtomicBool,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_login_for(&self, user: &str) {
        self.failing_users.lock().unwrap().insert(user.to_string());
    }

    pub fn allow_login_for(&self, user: &str) {
        self.failing_users.lock().unwrap().remove(user);
    }

    pub fn fail_dispose(&self, fail: bool) {
        self.fail_dispose.store(fail, Ordering::SeqCst);
    }
}

impl SessionFactory for MockFactory {
    fn new_session(&self, config: ConfigurationProxy) -> Result<Box<dyn Session>, SessionError> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        let fail_login = self.failing_users.lock().unwrap().contains(&config.user_name());
        Ok(Box::new(MockSession {
            config,
            counters: Arc::clone(&self.counters),
            fail_login,
            fail_dispose: self.fail_dispose.load(Ordering::SeqCst),
            logged_in: false,
            disposed: false,
        }))
    }
}

/// Configuration with `slots` credentials named `USER0`, `USER1`, ...
pub fn config_with_slots(host: &str, slots: usize) -> PoolConfiguration {
    let credentials = (0..slots)
        .map(|i| Credential::new(&format!("USER{i}"), &format!("pw{i}")))
        .collect();
    PoolConfiguration::new(host, credentials)
        .with_command_timeout(Duration::from_millis(10))
        .with_idle_reap_threshold(Duration::from_secs(60))
}
