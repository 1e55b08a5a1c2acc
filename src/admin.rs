use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::info;

use crate::config::Config;

/// Decides whether a user may run admin-gated commands.
pub trait AdminCheck: Send + Sync {
    fn is_admin(&self, user: &str) -> bool;
}

/// Reloadable set of privileged user ids
#[derive(Debug, Default)]
pub struct AdminList {
    users: RwLock<HashSet<String>>,
}

impl AdminList {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: RwLock::new(users.into_iter().map(Into::into).collect()),
        }
    }

    /// Swap the whole admin set, e.g. after the config file changed.
    pub fn replace<I, S>(&self, users: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let users: HashSet<String> = users.into_iter().map(Into::into).collect();
        info!("Admin list reloaded: {} admin(s)", users.len());
        *self.users.write() = users;
    }

    /// Re-read `[bot].admins` from the config file. The current list is
    /// kept when the file cannot be loaded.
    pub fn reload(&self, path: &Path) -> Result<()> {
        let config = Config::load(path)?;
        self.replace(config.bot.admins);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

impl AdminCheck for AdminList {
    fn is_admin(&self, user: &str) -> bool {
        self.users.read().contains(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_admin() {
        let admins = AdminList::new(["100", "200"]);
        assert!(admins.is_admin("100"));
        assert!(!admins.is_admin("300"));
        assert_eq!(admins.len(), 2);
    }

    #[test]
    fn test_replace() {
        let admins = AdminList::new(["100"]);
        admins.replace(["300"]);
        assert!(!admins.is_admin("100"));
        assert!(admins.is_admin("300"));
    }

    #[test]
    fn test_reload_from_config_file() {
        let path = std::env::temp_dir().join(format!("admins-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "[telegram]\nbot_token = \"t\"\nallowed_user_ids = []\n\n[bot]\nadmins = [\"7\", \"8\"]\n",
        )
        .unwrap();

        let admins = AdminList::new(["100"]);
        admins.reload(&path).unwrap();
        assert!(admins.is_admin("7"));
        assert!(!admins.is_admin("100"));
        assert_eq!(admins.len(), 2);

        std::fs::write(&path, "not toml [").unwrap();
        assert!(admins.reload(&path).is_err());
        assert!(admins.is_admin("8"));

        std::fs::remove_file(&path).unwrap();
    }
}
