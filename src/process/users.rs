//! Uid to user name resolution.

use dashmap::DashMap;
use nix::unistd::{Uid, User};
use tracing::debug;

/// Looks up a uid in the passwd database; falls back to the numeric uid.
pub fn lookup_user_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        Ok(None) => uid.to_string(),
        Err(e) => {
            debug!("Failed to resolve uid {}: {}", uid, e);
            uid.to_string()
        }
    }
}

/// Caching resolver shared by the parallel process scan.
#[derive(Debug, Default)]
pub struct UserResolver {
    names: DashMap<u32, String>,
}

impl UserResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a uid, consulting the passwd database once per uid.
    pub fn resolve(&self, uid: u32) -> String {
        if let Some(name) = self.names.get(&uid) {
            return name.clone();
        }
        let name = lookup_user_name(uid);
        self.names.insert(uid, name.clone());
        name
    }

    pub fn cached(&self) -> usize {
        self.names.len()
    }
}
