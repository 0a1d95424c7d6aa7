//! Known-hosts verification.

use skiff_core::{ClientError, ClientResult, HostKeyPolicy};
use ssh2::{CheckResult, KnownHostFileKind, Session};
use std::path::PathBuf;

fn known_hosts_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ssh").join("known_hosts"))
}

/// Verify the server host key against `~/.ssh/known_hosts` according
/// to the configured policy. A mismatching key always fails regardless
/// of policy; an unknown key is accepted (and recorded) under
/// `auto_add` and rejected under `strict`.
pub fn verify(
    session: &Session,
    host: &str,
    port: u16,
    policy: HostKeyPolicy,
) -> ClientResult<()> {
    let (key, key_type) = session
        .host_key()
        .ok_or_else(|| ClientError::connection_failed("Server presented no host key"))?;

    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| ClientError::connection_failed(format!("Known-hosts init failed: {}", e)))?;

    let file = known_hosts_path();
    if let Some(ref path) = file {
        if path.exists() {
            if let Err(e) = known_hosts.read_file(path, KnownHostFileKind::OpenSSH) {
                log::warn!("Could not read {}: {}", path.display(), e);
            }
        }
    }

    match known_hosts.check_port(host, port, key) {
        CheckResult::Match => {
            log::debug!("Host key for {} verified against known_hosts", host);
            Ok(())
        }
        CheckResult::Mismatch => Err(ClientError::connection_failed(format!(
            "Host key for {} does not match the recorded key; refusing to connect",
            host
        ))),
        CheckResult::NotFound | CheckResult::Failure => match policy {
            HostKeyPolicy::AutoAdd => {
                if let Err(e) = known_hosts.add(host, key, "", key_type.into()) {
                    log::warn!("Could not record host key for {}: {}", host, e);
                } else if let Some(ref path) = file {
                    // Recording the key is best effort; a read-only
                    // known_hosts must not block the connection.
                    if let Err(e) = known_hosts.write_file(path, KnownHostFileKind::OpenSSH) {
                        log::warn!("Could not write {}: {}", path.display(), e);
                    }
                }
                log::info!("Accepted new host key for {}", host);
                Ok(())
            }
            HostKeyPolicy::Strict => Err(ClientError::connection_failed(format!(
                "Host key for {} is not in known_hosts and the policy is strict",
                host
            ))),
            HostKeyPolicy::Prompt => Err(ClientError::connection_failed(
                "Interactive host key confirmation is not supported yet",
            )),
        },
    }
}
