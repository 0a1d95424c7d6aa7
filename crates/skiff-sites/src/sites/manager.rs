//! Saved connection profiles.
//!
//! Profiles persist as a JSON array. The password field is never
//! serialised; it is stored under the credential backend keyed by the
//! site id and rejoined on load. Legacy files that still carry
//! plaintext passwords are migrated into the backend the first time
//! they are loaded.

use serde::{Deserialize, Serialize};
use skiff_core::{ConnectionInfo, Protocol};
use skiff_credentials::CredentialBackend;
use std::path::PathBuf;
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_protocol() -> String {
    "sftp".to_string()
}

fn default_initial_dir() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub host: String,
    /// 0 means the protocol default.
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    /// Held in memory only; persisted through the credential backend.
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub key_path: String,
    #[serde(default = "default_initial_dir")]
    pub initial_dir: String,
    #[serde(default)]
    pub notes: String,
}

impl Site {
    /// Credential-backend key. The site id is the stable unique
    /// identifier; host/username pairs can repeat across profiles.
    fn account(&self) -> &str {
        &self.id
    }

    /// Build the client parameters for this profile.
    pub fn to_connection_info(&self) -> Result<ConnectionInfo, String> {
        let protocol = Protocol::parse(&self.protocol)
            .ok_or_else(|| format!("Unknown protocol '{}'", self.protocol))?;
        Ok(ConnectionInfo {
            protocol,
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            key_path: self.key_path.clone(),
            ..ConnectionInfo::default()
        })
    }
}

fn default_sites_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skiff")
        .join("sites.json")
}

pub struct SiteManager {
    path: PathBuf,
    backend: CredentialBackend,
    sites: Vec<Site>,
}

impl SiteManager {
    pub fn new(backend: CredentialBackend) -> Self {
        Self::with_path(default_sites_path(), backend)
    }

    pub fn with_path(path: PathBuf, backend: CredentialBackend) -> Self {
        Self {
            path,
            backend,
            sites: Vec::new(),
        }
    }

    /// Load profiles and rejoin passwords. A missing file is an empty
    /// list; an unreadable file is logged and treated as empty so the
    /// application still starts.
    pub fn load(&mut self) -> Result<(), String> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => {
                self.sites = Vec::new();
                return Ok(());
            }
        };
        self.sites = match serde_json::from_str::<Vec<Site>>(&raw) {
            Ok(sites) => sites,
            Err(e) => {
                log::warn!("Site file {} is unreadable ({}); starting empty", self.path.display(), e);
                Vec::new()
            }
        };

        let mut migrated = false;
        for site in &mut self.sites {
            let stored = self.backend.retrieve(site.account());
            if !stored.is_empty() {
                site.password = stored;
            } else if !site.password.is_empty() {
                // Plaintext password from a legacy file: move it into
                // the backend and let the next save strip it.
                if let Err(e) = self.backend.store(site.account(), &site.password) {
                    log::warn!("Password migration for '{}' failed: {}", site.name, e);
                } else {
                    migrated = true;
                }
            }
        }
        if migrated {
            self.save()?;
            log::info!("Migrated plaintext passwords out of {}", self.path.display());
        }
        Ok(())
    }

    /// Persist profiles (without passwords) and push passwords to the
    /// credential backend.
    pub fn save(&self) -> Result<(), String> {
        for site in &self.sites {
            if let Err(e) = self.backend.store(site.account(), &site.password) {
                log::warn!("Could not store password for '{}': {}", site.name, e);
            }
        }
        let json = serde_json::to_string_pretty(&self.sites)
            .map_err(|e| format!("Site serialisation failed: {}", e))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Could not create {}: {}", parent.display(), e))?;
        }
        std::fs::write(&self.path, json)
            .map_err(|e| format!("Could not write {}: {}", self.path.display(), e))
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn get(&self, id: &str) -> Option<&Site> {
        self.sites.iter().find(|s| s.id == id)
    }

    /// Case-insensitive profile lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Option<&Site> {
        self.sites
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Add a profile and persist. Returns the (possibly generated) id.
    pub fn add(&mut self, mut site: Site) -> Result<String, String> {
        if site.id.is_empty() {
            site.id = new_id();
        }
        let id = site.id.clone();
        self.sites.push(site);
        self.save()?;
        Ok(id)
    }

    /// Replace an existing profile in place.
    pub fn update(&mut self, site: Site) -> Result<(), String> {
        let slot = self
            .sites
            .iter_mut()
            .find(|s| s.id == site.id)
            .ok_or_else(|| format!("No site with id '{}'", site.id))?;
        *slot = site;
        self.save()
    }

    /// Remove a profile and its stored password.
    pub fn remove(&mut self, id: &str) -> Result<(), String> {
        let idx = self
            .sites
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| format!("No site with id '{}'", id))?;
        let site = self.sites.remove(idx);
        if let Err(e) = self.backend.delete(site.account()) {
            log::warn!("Could not delete password for '{}': {}", site.name, e);
        }
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_credentials::{Availability, Tier};

    fn vault_backend(dir: &tempfile::TempDir) -> CredentialBackend {
        CredentialBackend::with_availability(
            Availability {
                keychain: false,
                vault: true,
            },
            Some(dir.path().join("vault.enc")),
        )
    }

    fn site(name: &str, host: &str, password: &str) -> Site {
        Site {
            id: String::new(),
            name: name.to_string(),
            protocol: "sftp".to_string(),
            host: host.to_string(),
            port: 0,
            username: "alex".to_string(),
            password: password.to_string(),
            key_path: String::new(),
            initial_dir: "/".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn passwords_never_reach_the_site_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.json");
        let mut manager = SiteManager::with_path(path.clone(), vault_backend(&dir));

        manager.add(site("Work", "sftp.example.com", "hunter2")).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("hunter2"));
        assert!(!raw.contains("password"));
    }

    #[test]
    fn reload_rejoins_passwords_from_the_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.json");

        let mut manager = SiteManager::with_path(path.clone(), vault_backend(&dir));
        let id = manager.add(site("Work", "sftp.example.com", "hunter2")).unwrap();

        let mut reloaded = SiteManager::with_path(path, vault_backend(&dir));
        reloaded.load().unwrap();
        assert_eq!(reloaded.get(&id).unwrap().password, "hunter2");
    }

    #[test]
    fn legacy_plaintext_passwords_are_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.json");
        std::fs::write(
            &path,
            r#"[{"name":"Old","host":"ftp.example.com","username":"alex","password":"legacy-pw","protocol":"ftp"}]"#,
        )
        .unwrap();

        let mut manager = SiteManager::with_path(path.clone(), vault_backend(&dir));
        manager.load().unwrap();
        assert_eq!(manager.sites()[0].password, "legacy-pw");

        // The migration rewrote the file without the plaintext.
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("legacy-pw"));

        // And a fresh load still sees the password, now from the vault.
        let mut again = SiteManager::with_path(path, vault_backend(&dir));
        again.load().unwrap();
        assert_eq!(again.sites()[0].password, "legacy-pw");
    }

    #[test]
    fn missing_and_corrupt_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager =
            SiteManager::with_path(dir.path().join("nope.json"), vault_backend(&dir));
        manager.load().unwrap();
        assert!(manager.sites().is_empty());

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let mut manager = SiteManager::with_path(path, vault_backend(&dir));
        manager.load().unwrap();
        assert!(manager.sites().is_empty());
    }

    #[test]
    fn same_host_and_user_keep_distinct_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.json");

        let mut manager = SiteManager::with_path(path.clone(), vault_backend(&dir));
        let id_a = manager
            .add(site("Prod", "sftp.example.com", "pw-prod"))
            .unwrap();
        let id_b = manager
            .add(site("Prod (admin)", "sftp.example.com", "pw-admin"))
            .unwrap();

        let mut reloaded = SiteManager::with_path(path, vault_backend(&dir));
        reloaded.load().unwrap();
        assert_eq!(reloaded.get(&id_a).unwrap().password, "pw-prod");
        assert_eq!(reloaded.get(&id_b).unwrap().password, "pw-admin");

        // Removing one profile must not drop the other's credential.
        reloaded.remove(&id_a).unwrap();
        let backend = vault_backend(&dir);
        assert_eq!(backend.retrieve(&id_b), "pw-admin");
        assert_eq!(backend.retrieve(&id_a), "");
    }

    #[test]
    fn find_by_name_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager =
            SiteManager::with_path(dir.path().join("sites.json"), vault_backend(&dir));
        manager.add(site("Prod Server", "prod.example.com", "")).unwrap();

        assert!(manager.find_by_name("prod server").is_some());
        assert!(manager.find_by_name("PROD SERVER").is_some());
        assert!(manager.find_by_name("staging").is_none());
    }

    #[test]
    fn update_and_remove_manage_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let backend = vault_backend(&dir);
        assert_eq!(backend.tier(), Tier::Vault);
        let mut manager = SiteManager::with_path(dir.path().join("sites.json"), backend);

        let id = manager.add(site("Work", "sftp.example.com", "pw1")).unwrap();

        let mut changed = manager.get(&id).unwrap().clone();
        changed.password = "pw2".to_string();
        manager.update(changed).unwrap();
        assert_eq!(manager.get(&id).unwrap().password, "pw2");

        manager.remove(&id).unwrap();
        assert!(manager.get(&id).is_none());
        assert!(manager.remove(&id).is_err());
    }

    #[test]
    fn unknown_protocol_is_rejected_at_connect_time() {
        let mut s = site("Bad", "example.com", "");
        s.protocol = "gopher".to_string();
        assert!(s.to_connection_info().is_err());

        let s = site("Good", "example.com", "");
        let info = s.to_connection_info().unwrap();
        assert_eq!(info.protocol, Protocol::Sftp);
        assert_eq!(info.effective_port(), 22);
    }
}
