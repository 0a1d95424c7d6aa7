//! Layered SSH authentication.

use skiff_core::{ClientError, ClientResult, ConnectionInfo};
use ssh2::Session;
use std::path::{Path, PathBuf};

/// Authenticate the session, returning the method that succeeded.
///
/// When `key_path` is set it is the only method tried; a missing key
/// file is an immediate error. Otherwise the ladder runs: agent keys,
/// the default `~/.ssh` identities, then password and
/// keyboard-interactive when a password is available. The error names
/// every method attempted so a failed login is diagnosable.
pub fn authenticate(session: &mut Session, info: &ConnectionInfo) -> ClientResult<String> {
    let username = &info.username;
    if username.is_empty() {
        return Err(ClientError::connection_failed("No username configured"));
    }

    if !info.key_path.is_empty() {
        let path = expand_tilde(&info.key_path);
        if !path.exists() {
            return Err(ClientError::connection_failed(format!(
                "Private key file not found: {}",
                path.display()
            )));
        }
        let passphrase = if info.password.is_empty() {
            None
        } else {
            Some(info.password.as_str())
        };
        session
            .userauth_pubkey_file(username, None, &path, passphrase)
            .map_err(|e| ClientError::connection_failed(format!("Public-key auth failed: {}", e)))?;
        if session.authenticated() {
            return Ok("publickey".to_string());
        }
        return Err(ClientError::connection_failed(
            "Public-key auth did not authenticate the session",
        ));
    }

    let mut attempted: Vec<&str> = Vec::new();

    // 1. Agent identities
    attempted.push("agent");
    if let Ok(mut agent) = session.agent() {
        if agent.connect().is_ok() {
            let _ = agent.list_identities();
            for identity in agent.identities().unwrap_or_default() {
                if agent.userauth(username, &identity).is_ok() && session.authenticated() {
                    return Ok("agent".to_string());
                }
            }
        }
    }

    // 2. Default key files
    if let Some(ssh_dir) = dirs::home_dir().map(|h| h.join(".ssh")) {
        for name in &["id_ed25519", "id_rsa", "id_ecdsa"] {
            let path = ssh_dir.join(name);
            if path.exists() {
                attempted.push(name);
                if session
                    .userauth_pubkey_file(username, None, &path, None)
                    .is_ok()
                    && session.authenticated()
                {
                    return Ok(format!("publickey ({})", name));
                }
            }
        }
    }

    // 3. Password, then keyboard-interactive with the same secret
    if !info.password.is_empty() {
        attempted.push("password");
        if session.userauth_password(username, &info.password).is_ok()
            && session.authenticated()
        {
            return Ok("password".to_string());
        }

        attempted.push("keyboard-interactive");
        struct PasswordResponder {
            password: String,
        }

        impl ssh2::KeyboardInteractivePrompt for PasswordResponder {
            fn prompt(
                &mut self,
                _username: &str,
                _instructions: &str,
                prompts: &[ssh2::Prompt<'_>],
            ) -> Vec<String> {
                prompts.iter().map(|_| self.password.clone()).collect()
            }
        }

        let mut responder = PasswordResponder {
            password: info.password.clone(),
        };
        if session
            .userauth_keyboard_interactive(username, &mut responder)
            .is_ok()
            && session.authenticated()
        {
            return Ok("keyboard-interactive".to_string());
        }
    }

    Err(ClientError::connection_failed(format!(
        "Authentication failed for {} (tried: {})",
        username,
        attempted.join(", ")
    )))
}

/// Expand a leading `~/` against the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    Path::new(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expansion() {
        let expanded = expand_tilde("~/keys/server");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("keys/server"));
        }
        assert_eq!(expand_tilde("/abs/key"), PathBuf::from("/abs/key"));
    }
}
