//! Tier selection and the unified credential API.

use crate::credentials::{keychain, vault::VaultStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which storage mechanisms work in this environment. Detected once at
/// startup; injectable so tests can force a tier.
#[derive(Debug, Clone, Copy)]
pub struct Availability {
    pub keychain: bool,
    pub vault: bool,
}

impl Availability {
    pub fn detect() -> Self {
        Self {
            keychain: keychain::probe(),
            vault: default_vault_path().is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Keychain,
    Vault,
    None,
}

fn default_vault_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("skiff").join("vault.enc"))
}

/// Password storage behind the best available tier. Accounts are plain
/// strings; callers compose them (the site manager uses the site id).
pub struct CredentialBackend {
    tier: Tier,
    vault: Option<VaultStore>,
}

impl CredentialBackend {
    pub fn new() -> Self {
        Self::with_availability(Availability::detect(), default_vault_path())
    }

    pub fn with_availability(avail: Availability, vault_path: Option<PathBuf>) -> Self {
        let tier = if avail.keychain {
            Tier::Keychain
        } else if avail.vault && vault_path.is_some() {
            Tier::Vault
        } else {
            Tier::None
        };
        log::info!("Credential backend tier: {:?}", tier);
        let vault = match tier {
            Tier::Vault => vault_path.map(VaultStore::new),
            _ => None,
        };
        Self { tier, vault }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Whether `store` persists anything. With no tier available,
    /// passwords live only as long as the process.
    pub fn can_store(&self) -> bool {
        self.tier != Tier::None
    }

    /// Persist a password. Empty passwords are not stored; storing one
    /// deletes any previous entry instead.
    pub fn store(&self, account: &str, password: &str) -> Result<(), String> {
        if password.is_empty() {
            return self.delete(account);
        }
        match self.tier {
            Tier::Keychain => keychain::store(account, password),
            Tier::Vault => match &self.vault {
                Some(v) => v.store(account, password),
                None => Ok(()),
            },
            Tier::None => Ok(()),
        }
    }

    /// Look up a password; any failure reads as "no password" so a
    /// broken backend degrades to prompting rather than erroring.
    pub fn retrieve(&self, account: &str) -> String {
        match self.tier {
            Tier::Keychain => match keychain::retrieve(account) {
                Ok(Some(password)) => password,
                Ok(None) => String::new(),
                Err(e) => {
                    log::warn!("{}", e);
                    String::new()
                }
            },
            Tier::Vault => self
                .vault
                .as_ref()
                .and_then(|v| v.retrieve(account))
                .unwrap_or_default(),
            Tier::None => String::new(),
        }
    }

    pub fn delete(&self, account: &str) -> Result<(), String> {
        match self.tier {
            Tier::Keychain => keychain::delete(account),
            Tier::Vault => match &self.vault {
                Some(v) => v.delete(account),
                None => Ok(()),
            },
            Tier::None => Ok(()),
        }
    }
}

impl Default for CredentialBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault_backend(dir: &tempfile::TempDir) -> CredentialBackend {
        CredentialBackend::with_availability(
            Availability {
                keychain: false,
                vault: true,
            },
            Some(dir.path().join("vault.enc")),
        )
    }

    #[test]
    fn falls_back_to_vault_when_keychain_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = vault_backend(&dir);
        assert_eq!(backend.tier(), Tier::Vault);
        assert!(backend.can_store());

        backend.store("host:user", "pw").unwrap();
        assert_eq!(backend.retrieve("host:user"), "pw");
    }

    #[test]
    fn none_tier_is_a_quiet_no_op() {
        let backend = CredentialBackend::with_availability(
            Availability {
                keychain: false,
                vault: false,
            },
            None,
        );
        assert_eq!(backend.tier(), Tier::None);
        assert!(!backend.can_store());

        backend.store("host:user", "pw").unwrap();
        assert_eq!(backend.retrieve("host:user"), "");
        backend.delete("host:user").unwrap();
    }

    #[test]
    fn storing_empty_password_deletes_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let backend = vault_backend(&dir);

        backend.store("host:user", "pw").unwrap();
        backend.store("host:user", "").unwrap();
        assert_eq!(backend.retrieve("host:user"), "");
    }
}
