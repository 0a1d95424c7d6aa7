//! Encrypted vault file — the fallback when no keychain works.
//!
//! Format: `[nonce (12 bytes)][AES-256-GCM ciphertext+tag]` over a
//! JSON map of account → password. The key is derived from the local
//! host and user name, so the file is useless copied to another
//! machine; this is obfuscation against casual file access, not
//! protection from an attacker who owns the account.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

const NONCE_LEN: usize = 12;

pub struct VaultStore {
    path: PathBuf,
    key: [u8; 32],
    /// Serialises the load-mutate-save cycle; without it two threads
    /// sharing the backend can interleave and drop each other's entry.
    lock: Mutex<()>,
}

impl VaultStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            key: derive_key(),
            lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    fn with_key(path: PathBuf, key: [u8; 32]) -> Self {
        Self {
            path,
            key,
            lock: Mutex::new(()),
        }
    }

    /// Decrypt the vault into a map. A missing file is an empty vault;
    /// an unreadable or tampered file is logged and treated as empty
    /// rather than wedging every credential operation.
    fn load(&self) -> HashMap<String, String> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(_) => return HashMap::new(),
        };
        if raw.len() <= NONCE_LEN {
            log::warn!("Vault file {} is truncated; starting empty", self.path.display());
            return HashMap::new();
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let cipher = match Aes256Gcm::new_from_slice(&self.key) {
            Ok(c) => c,
            Err(_) => return HashMap::new(),
        };
        let plaintext = match cipher.decrypt(Nonce::from_slice(nonce), ciphertext) {
            Ok(p) => p,
            Err(_) => {
                log::warn!(
                    "Vault file {} could not be decrypted; starting empty",
                    self.path.display()
                );
                return HashMap::new();
            }
        };
        serde_json::from_slice(&plaintext).unwrap_or_else(|e| {
            log::warn!("Vault contents are not valid JSON ({}); starting empty", e);
            HashMap::new()
        })
    }

    fn save(&self, map: &HashMap<String, String>) -> Result<(), String> {
        let plaintext =
            serde_json::to_vec(map).map_err(|e| format!("Vault serialisation failed: {}", e))?;

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| format!("Vault cipher init failed: {}", e))?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| format!("Vault encryption failed: {}", e))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Could not create {}: {}", parent.display(), e))?;
        }
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        std::fs::write(&self.path, out)
            .map_err(|e| format!("Could not write {}: {}", self.path.display(), e))
    }

    pub fn store(&self, account: &str, password: &str) -> Result<(), String> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.load();
        map.insert(account.to_string(), password.to_string());
        self.save(&map)
    }

    pub fn retrieve(&self, account: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.load().get(account).cloned()
    }

    pub fn delete(&self, account: &str) -> Result<(), String> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.load();
        if map.remove(account).is_some() {
            self.save(&map)?;
        }
        Ok(())
    }
}

/// SHA-256 of an app/host/user tag. Ties the vault to this machine and
/// account without asking the user for a master password.
fn derive_key() -> [u8; 32] {
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
    let seed = format!("skiff:{}:{}", hostname, whoami::username());
    let digest = Sha256::digest(seed.as_bytes());
    digest.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault(dir: &tempfile::TempDir) -> VaultStore {
        VaultStore::with_key(dir.path().join("vault.enc"), [7u8; 32])
    }

    #[test]
    fn round_trips_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let vault = test_vault(&dir);

        vault.store("ftp.example.com:alex", "hunter2").unwrap();
        vault.store("sftp.example.com:sam", "secret").unwrap();

        assert_eq!(
            vault.retrieve("ftp.example.com:alex").as_deref(),
            Some("hunter2")
        );
        assert_eq!(vault.retrieve("sftp.example.com:sam").as_deref(), Some("secret"));
        assert!(vault.retrieve("unknown:who").is_none());
    }

    #[test]
    fn stored_file_is_not_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let vault = test_vault(&dir);
        vault.store("host:user", "hunter2").unwrap();

        let raw = std::fs::read(dir.path().join("vault.enc")).unwrap();
        let haystack = String::from_utf8_lossy(&raw);
        assert!(!haystack.contains("hunter2"));
    }

    #[test]
    fn corrupt_vault_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.enc");
        std::fs::write(&path, b"garbage that is long enough to have a nonce").unwrap();

        let vault = VaultStore::with_key(path, [7u8; 32]);
        assert!(vault.retrieve("host:user").is_none());

        // And it recovers: the next store rewrites a valid vault.
        vault.store("host:user", "pw").unwrap();
        assert_eq!(vault.retrieve("host:user").as_deref(), Some("pw"));
    }

    #[test]
    fn wrong_key_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.enc");
        VaultStore::with_key(path.clone(), [1u8; 32])
            .store("host:user", "pw")
            .unwrap();

        let other = VaultStore::with_key(path, [2u8; 32]);
        assert!(other.retrieve("host:user").is_none());
    }

    #[test]
    fn delete_removes_only_the_account() {
        let dir = tempfile::tempdir().unwrap();
        let vault = test_vault(&dir);
        vault.store("a:x", "1").unwrap();
        vault.store("b:y", "2").unwrap();

        vault.delete("a:x").unwrap();
        assert!(vault.retrieve("a:x").is_none());
        assert_eq!(vault.retrieve("b:y").as_deref(), Some("2"));

        // Deleting a missing account is not an error.
        vault.delete("a:x").unwrap();
    }

    #[test]
    fn concurrent_stores_all_survive() {
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(test_vault(&dir));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let vault = Arc::clone(&vault);
                std::thread::spawn(move || {
                    vault
                        .store(&format!("account-{}", i), &format!("pw-{}", i))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..8 {
            assert_eq!(
                vault.retrieve(&format!("account-{}", i)).as_deref(),
                Some(format!("pw-{}", i).as_str())
            );
        }
    }
}
