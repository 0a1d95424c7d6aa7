//! OS keychain access through the `keyring` crate.

use keyring::Entry;

const SERVICE: &str = "skiff";

/// Whether the keychain actually works here, determined by a set/delete
/// round trip. Headless sessions and locked keyrings fail the probe and
/// fall through to the vault tier.
pub fn probe() -> bool {
    let entry = match Entry::new(SERVICE, "availability-probe") {
        Ok(e) => e,
        Err(_) => return false,
    };
    match entry.set_password("probe") {
        Ok(()) => {
            let _ = entry.delete_credential();
            true
        }
        Err(e) => {
            log::debug!("Keychain probe failed: {}", e);
            false
        }
    }
}

pub fn store(account: &str, password: &str) -> Result<(), String> {
    Entry::new(SERVICE, account)
        .and_then(|e| e.set_password(password))
        .map_err(|e| format!("Keychain store for '{}' failed: {}", account, e))
}

/// `Ok(None)` when no credential exists for the account.
pub fn retrieve(account: &str) -> Result<Option<String>, String> {
    let entry =
        Entry::new(SERVICE, account).map_err(|e| format!("Keychain access failed: {}", e))?;
    match entry.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(format!("Keychain lookup for '{}' failed: {}", account, e)),
    }
}

pub fn delete(account: &str) -> Result<(), String> {
    let entry =
        Entry::new(SERVICE, account).map_err(|e| format!("Keychain access failed: {}", e))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(format!("Keychain delete for '{}' failed: {}", account, e)),
    }
}
