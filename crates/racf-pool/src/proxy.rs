//! Per-slot view over a pool's multi-credential configuration.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::config::{Credential, PoolConfiguration, Secret};

/// Credential table shared by every slot of one pool.
pub type SharedCredentials = Arc<RwLock<Vec<Credential>>>;

/// The single-credential shape a [`SessionFactory`](crate::SessionFactory) sees.
///
/// Host-level fields come from the pool's immutable configuration. User name
/// and password are read from, and written back to, the shared table at
/// `index`, so a password rotated through one session is visible to the
/// next session opened on the same slot.
#[derive(Clone, Debug)]
pub struct ConfigurationProxy {
    index: usize,
    config: Arc<PoolConfiguration>,
    credentials: SharedCredentials,
}

impl ConfigurationProxy {
    pub fn new(index: usize, config: Arc<PoolConfiguration>, credentials: SharedCredentials) -> Self {
        Self {
            index,
            config,
            credentials,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn connect_script(&self) -> Option<&str> {
        self.config.connect_script.as_deref()
    }

    pub fn disconnect_script(&self) -> Option<&str> {
        self.config.disconnect_script.as_deref()
    }

    pub fn connection_class(&self) -> &str {
        &self.config.connection_class
    }

    pub fn command_timeout(&self) -> Duration {
        self.config.command_timeout
    }

    pub fn user_name(&self) -> String {
        self.read(|c| c.user_name.clone())
    }

    pub fn password(&self) -> Secret {
        self.read(|c| c.password.clone())
    }

    pub fn set_user_name(&self, user_name: &str) {
        self.write(|c| c.user_name = user_name.to_string());
    }

    pub fn set_password(&self, password: Secret) {
        self.write(|c| c.password = password);
    }

    fn read<T: Default>(&self, f: impl FnOnce(&Credential) -> T) -> T {
        let table = self.credentials.read().unwrap_or_else(PoisonError::into_inner);
        table.get(self.index).map(f).unwrap_or_default()
    }

    fn write(&self, f: impl FnOnce(&mut Credential)) {
        let mut table = self.credentials.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(credential) = table.get_mut(self.index) {
            f(credential);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> (Arc<PoolConfiguration>, SharedCredentials) {
        let config = PoolConfiguration::new(
            "mvs1",
            vec![Credential::new("IBMUSER", "sys1"), Credential::new("OPER", "oper")],
        )
        .with_scripts(Some("logon".into()), Some("logoff".into()));
        let table = Arc::new(RwLock::new(config.credentials.clone()));
        (Arc::new(config), table)
    }

    #[test]
    fn reads_bound_slot() {
        let (config, table) = shared();
        let proxy = ConfigurationProxy::new(1, config, table);
        assert_eq!(proxy.user_name(), "OPER");
        assert_eq!(proxy.password().expose(), "oper");
        assert_eq!(proxy.host(), "mvs1");
        assert_eq!(proxy.port(), 23);
        assert_eq!(proxy.connect_script(), Some("logon"));
        assert_eq!(proxy.disconnect_script(), Some("logoff"));
    }

    #[test]
    fn writes_land_in_shared_table() {
        let (config, table) = shared();
        let slot0 = ConfigurationProxy::new(0, config.clone(), table.clone());
        let slot0_again = ConfigurationProxy::new(0, config, table.clone());

        slot0.set_password(Secret::new("rotated"));
        assert_eq!(slot0_again.password().expose(), "rotated");
        assert_eq!(table.read().unwrap()[1].password.expose(), "oper");
    }

    #[test]
    fn out_of_range_slot_is_empty() {
        let (config, table) = shared();
        let proxy = ConfigurationProxy::new(9, config, table);
        proxy.set_user_name("X");
        assert_eq!(proxy.user_name(), "");
    }
}
