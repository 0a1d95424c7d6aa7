//! Connection parameters and remote directory entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Protocol ────────────────────────────────────────────────────────

/// Supported transfer protocols. SCP and WebDAV are declared for the
/// site store but have no client implementation yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ftp,
    Ftps,
    Sftp,
    Scp,
    Webdav,
}

impl Protocol {
    /// Default TCP port for the protocol.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ftp => 21,
            Protocol::Ftps => 990,
            Protocol::Sftp | Protocol::Scp => 22,
            Protocol::Webdav => 443,
        }
    }

    /// Parse the lowercase wire/profile name ("ftp", "sftp", …).
    pub fn parse(s: &str) -> Option<Protocol> {
        match s.to_ascii_lowercase().as_str() {
            "ftp" => Some(Protocol::Ftp),
            "ftps" => Some(Protocol::Ftps),
            "sftp" => Some(Protocol::Sftp),
            "scp" => Some(Protocol::Scp),
            "webdav" => Some(Protocol::Webdav),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Ftp => "ftp",
            Protocol::Ftps => "ftps",
            Protocol::Sftp => "sftp",
            Protocol::Scp => "scp",
            Protocol::Webdav => "webdav",
        }
    }
}

// ─── Host-key policy ─────────────────────────────────────────────────

/// SSH host-key verification behaviour (SFTP only).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Accept and remember unknown host keys.
    AutoAdd,
    /// Reject unknown host keys outright.
    Strict,
    /// Interactive confirmation — declared but not implemented;
    /// connecting with this policy fails fast.
    Prompt,
}

impl Default for HostKeyPolicy {
    fn default() -> Self {
        Self::AutoAdd
    }
}

// ─── Connection parameters ───────────────────────────────────────────

/// Parameters for a single connection attempt. Immutable once a client
/// has been constructed from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub protocol: Protocol,
    pub host: String,
    /// 0 means "use the protocol default".
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Path to a private key file (SFTP). When set, agent and default
    /// key discovery are disabled and this key is used exclusively.
    #[serde(default)]
    pub key_path: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Passive-mode data channels (FTP/FTPS only).
    #[serde(default = "default_true")]
    pub passive_mode: bool,
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
}

fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            protocol: Protocol::Sftp,
            host: String::new(),
            port: 0,
            username: String::new(),
            password: String::new(),
            key_path: String::new(),
            timeout_secs: default_timeout(),
            passive_mode: true,
            host_key_policy: HostKeyPolicy::default(),
        }
    }
}

impl ConnectionInfo {
    /// The port to actually dial: the explicit port when non-zero,
    /// otherwise the protocol default.
    pub fn effective_port(&self) -> u16 {
        if self.port > 0 {
            self.port
        } else {
            self.protocol.default_port()
        }
    }
}

// ─── Remote directory entry ──────────────────────────────────────────

/// A file or directory on the remote server, as returned by listing
/// and stat operations. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub name: String,
    /// Absolute remote path.
    pub path: String,
    /// Size in bytes; 0 for directories.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permissions: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub group: String,
}

impl RemoteFile {
    /// Human-readable size: `<DIR>` for directories, otherwise B/KB/MB/GB
    /// with one decimal and base-1024 thresholds.
    pub fn display_size(&self) -> String {
        if self.is_dir {
            return "<DIR>".to_string();
        }
        const KB: u64 = 1024;
        const MB: u64 = 1024 * 1024;
        const GB: u64 = 1024 * 1024 * 1024;
        if self.size < KB {
            format!("{} B", self.size)
        } else if self.size < MB {
            format!("{:.1} KB", self.size as f64 / KB as f64)
        } else if self.size < GB {
            format!("{:.1} MB", self.size as f64 / MB as f64)
        } else {
            format!("{:.1} GB", self.size as f64 / GB as f64)
        }
    }

    /// Human-readable modification time, empty when unknown.
    pub fn display_modified(&self) -> String {
        match self.modified {
            Some(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file_of(size: u64) -> RemoteFile {
        RemoteFile {
            name: "f".into(),
            path: "/f".into(),
            size,
            is_dir: false,
            modified: None,
            permissions: String::new(),
            owner: String::new(),
            group: String::new(),
        }
    }

    #[test]
    fn display_size_thresholds() {
        assert_eq!(file_of(0).display_size(), "0 B");
        assert_eq!(file_of(1023).display_size(), "1023 B");
        assert_eq!(file_of(1024).display_size(), "1.0 KB");
        assert_eq!(file_of(1536).display_size(), "1.5 KB");
        assert_eq!(file_of(1024 * 1024).display_size(), "1.0 MB");
        assert_eq!(file_of(1024 * 1024 * 1024).display_size(), "1.0 GB");
    }

    #[test]
    fn display_size_directory() {
        let mut d = file_of(4096);
        d.is_dir = true;
        assert_eq!(d.display_size(), "<DIR>");
    }

    #[test]
    fn display_modified_format() {
        let mut f = file_of(1);
        f.modified = Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap());
        assert_eq!(f.display_modified(), "2025-01-01 12:00");
        f.modified = None;
        assert_eq!(f.display_modified(), "");
    }

    #[test]
    fn effective_port_defaults() {
        for (proto, port) in [
            (Protocol::Ftp, 21),
            (Protocol::Ftps, 990),
            (Protocol::Sftp, 22),
            (Protocol::Scp, 22),
            (Protocol::Webdav, 443),
        ] {
            let info = ConnectionInfo {
                protocol: proto,
                ..ConnectionInfo::default()
            };
            assert_eq!(info.effective_port(), port);
        }
    }

    #[test]
    fn effective_port_explicit_wins() {
        let info = ConnectionInfo {
            protocol: Protocol::Ftp,
            port: 2121,
            ..ConnectionInfo::default()
        };
        assert_eq!(info.effective_port(), 2121);
    }

    #[test]
    fn protocol_parse_round_trip() {
        for p in [
            Protocol::Ftp,
            Protocol::Ftps,
            Protocol::Sftp,
            Protocol::Scp,
            Protocol::Webdav,
        ] {
            assert_eq!(Protocol::parse(p.as_str()), Some(p));
        }
        assert_eq!(Protocol::parse("gopher"), None);
    }
}
