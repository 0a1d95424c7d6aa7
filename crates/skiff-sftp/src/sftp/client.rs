//! The stateful SFTP client.

use crate::sftp::{auth, hostkey};
use async_trait::async_trait;
use chrono::DateTime;
use skiff_core::{
    path, ClientError, ClientResult, ConnectionInfo, HostKeyPolicy, ProgressFn, RemoteFile,
    TransferClient,
};
use ssh2::{FileStat, Session};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

const CHUNK: usize = 32768;

/// SFTP client over a libssh2 session.
pub struct SftpClient {
    info: ConnectionInfo,
    session: Option<Session>,
    sftp: Option<ssh2::Sftp>,
    // Held so the socket outlives the session that borrowed it.
    _tcp: Option<TcpStream>,
    connected: bool,
    cwd: String,
}

impl SftpClient {
    pub fn new(info: ConnectionInfo) -> Self {
        Self {
            info,
            session: None,
            sftp: None,
            _tcp: None,
            connected: false,
            cwd: "/".to_string(),
        }
    }

    fn sftp_ref(&self) -> ClientResult<&ssh2::Sftp> {
        self.sftp.as_ref().ok_or_else(ClientError::not_connected)
    }

    fn resolve(&self, p: &str) -> String {
        if path::is_absolute(p) {
            p.to_string()
        } else {
            path::join(&self.cwd, p)
        }
    }

    fn establish(&mut self) -> ClientResult<()> {
        if self.info.host.is_empty() {
            return Err(ClientError::connection_failed("No host configured"));
        }
        // Fail before any network I/O: this policy needs a UI prompt
        // the engine cannot provide.
        if self.info.host_key_policy == HostKeyPolicy::Prompt {
            return Err(ClientError::connection_failed(
                "Interactive host key confirmation is not supported yet",
            ));
        }

        let port = self.info.effective_port();
        let addr = (self.info.host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| {
                ClientError::connection_failed(format!(
                    "Could not resolve {}: {}",
                    self.info.host, e
                ))
            })?
            .next()
            .ok_or_else(|| {
                ClientError::connection_failed(format!("No addresses for {}", self.info.host))
            })?;

        log::debug!("Connecting SSH transport to {}", addr);
        let tcp = TcpStream::connect_timeout(&addr, Duration::from_secs(self.info.timeout_secs))
            .map_err(|e| {
                ClientError::connection_failed(format!("TCP connection to {} failed: {}", addr, e))
            })?;
        tcp.set_nonblocking(false)
            .map_err(|e| ClientError::connection_failed(format!("Socket setup failed: {}", e)))?;

        let mut session = Session::new()
            .map_err(|e| ClientError::connection_failed(format!("SSH session init failed: {}", e)))?;
        session.set_tcp_stream(
            tcp.try_clone()
                .map_err(|e| ClientError::connection_failed(e.to_string()))?,
        );
        session.set_timeout((self.info.timeout_secs * 1000) as u32);
        session
            .handshake()
            .map_err(|e| ClientError::connection_failed(format!("SSH handshake failed: {}", e)))?;

        hostkey::verify(&session, &self.info.host, port, self.info.host_key_policy)?;

        let method = auth::authenticate(&mut session, &self.info)?;
        log::info!(
            "SFTP authenticated to {}:{} via {}",
            self.info.host,
            port,
            method
        );

        let sftp = session
            .sftp()
            .map_err(|e| ClientError::connection_failed(format!("SFTP subsystem failed: {}", e)))?;

        self.cwd = sftp
            .realpath(Path::new("."))
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| "/".to_string());

        self.session = Some(session);
        self.sftp = Some(sftp);
        self._tcp = Some(tcp);
        Ok(())
    }

    /// Map a raw stat to a listing entry, resolving symlinks so a link
    /// to a directory navigates like a directory. A dangling link is
    /// shown as a plain file.
    fn entry_from_stat(&self, entry_path: &Path, name: String, stat: &FileStat) -> RemoteFile {
        let mode = stat.perm.unwrap_or(0);
        let mut is_dir = is_dir_mode(mode);
        let mut size = stat.size.unwrap_or(0);

        if is_symlink_mode(mode) {
            if let Ok(sftp) = self.sftp_ref() {
                match sftp.stat(entry_path) {
                    Ok(target) => {
                        is_dir = is_dir_mode(target.perm.unwrap_or(0));
                        size = target.size.unwrap_or(0);
                    }
                    Err(_) => {
                        is_dir = false;
                    }
                }
            }
        }

        RemoteFile {
            name,
            path: entry_path.to_string_lossy().to_string(),
            size: if is_dir { 0 } else { size },
            is_dir,
            modified: stat
                .mtime
                .and_then(|t| DateTime::from_timestamp(t as i64, 0)),
            permissions: format_permissions(mode),
            owner: stat.uid.map(|u| u.to_string()).unwrap_or_default(),
            group: stat.gid.map(|g| g.to_string()).unwrap_or_default(),
        }
    }
}

pub(crate) fn is_dir_mode(mode: u32) -> bool {
    mode & 0o170000 == 0o040000
}

pub(crate) fn is_symlink_mode(mode: u32) -> bool {
    mode & 0o170000 == 0o120000
}

/// `drwxr-xr-x`-style permission string from POSIX mode bits.
pub(crate) fn format_permissions(mode: u32) -> String {
    let mut s = String::with_capacity(10);

    s.push(match mode & 0o170000 {
        0o040000 => 'd',
        0o120000 => 'l',
        0o010000 => 'p',
        0o140000 => 's',
        0o060000 => 'b',
        0o020000 => 'c',
        _ => '-',
    });

    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    s
}

#[async_trait]
impl TransferClient for SftpClient {
    fn connected(&self) -> bool {
        self.connected
    }

    fn cwd(&self) -> &str {
        &self.cwd
    }

    async fn connect(&mut self) -> ClientResult<()> {
        match self.establish() {
            Ok(()) => {
                self.connected = true;
                Ok(())
            }
            Err(e) => {
                self.session = None;
                self.sftp = None;
                self._tcp = None;
                self.connected = false;
                Err(e.into_connection_failed("SFTP connection failed"))
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.as_ref() {
            let _ = session.disconnect(None, "closing", None);
        }
        self.sftp = None;
        self.session = None;
        self._tcp = None;
        self.connected = false;
        log::debug!("SFTP session closed");
    }

    async fn list_dir(&mut self, p: &str) -> ClientResult<Vec<RemoteFile>> {
        let target = if p == "." {
            self.cwd.clone()
        } else {
            self.resolve(p)
        };
        let sftp = self.sftp_ref()?;
        let raw = sftp
            .readdir(Path::new(&target))
            .map_err(|e| ClientError::remote(format!("readdir '{}' failed: {}", target, e)))?;

        let entries = raw
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if name.is_empty() || name == "." || name == ".." {
                    return None;
                }
                Some(self.entry_from_stat(&entry_path, name, &stat))
            })
            .collect();
        Ok(entries)
    }

    async fn chdir(&mut self, p: &str) -> ClientResult<String> {
        let target = self.resolve(p);
        let sftp = self.sftp_ref()?;
        let resolved = sftp
            .realpath(Path::new(&target))
            .map_err(|e| ClientError::remote(format!("realpath '{}' failed: {}", target, e)))?;
        let stat = sftp
            .stat(&resolved)
            .map_err(|e| ClientError::remote(format!("stat '{}' failed: {}", resolved.display(), e)))?;
        if !is_dir_mode(stat.perm.unwrap_or(0)) {
            return Err(ClientError::remote(format!(
                "Not a directory: {}",
                resolved.display()
            )));
        }
        self.cwd = resolved.to_string_lossy().to_string();
        Ok(self.cwd.clone())
    }

    async fn download(
        &mut self,
        remote_path: &str,
        sink: &mut (dyn Write + Send),
        progress: &mut ProgressFn<'_>,
    ) -> ClientResult<u64> {
        let remote = self.resolve(remote_path);
        let sftp = self.sftp_ref()?;

        let total = sftp
            .stat(Path::new(&remote))
            .ok()
            .and_then(|s| s.size)
            .unwrap_or(0);

        let mut file = sftp
            .open(Path::new(&remote))
            .map_err(|e| ClientError::remote(format!("open '{}' failed: {}", remote, e)))?;

        let mut transferred: u64 = 0;
        let mut buf = [0u8; CHUNK];
        loop {
            let n = file
                .read(&mut buf)
                .map_err(|e| ClientError::remote(format!("read '{}' failed: {}", remote, e)))?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])
                .map_err(|e| ClientError::io(format!("Writing local file failed: {}", e)))?;
            transferred += n as u64;
            if !progress(transferred, total) {
                return Err(ClientError::interrupted());
            }
        }
        log::debug!("Downloaded {} ({} bytes)", remote, transferred);
        Ok(transferred)
    }

    async fn upload(
        &mut self,
        source: &mut (dyn Read + Send),
        size: u64,
        remote_path: &str,
        progress: &mut ProgressFn<'_>,
    ) -> ClientResult<u64> {
        let remote = self.resolve(remote_path);
        let sftp = self.sftp_ref()?;

        let mut file = sftp
            .create(Path::new(&remote))
            .map_err(|e| ClientError::remote(format!("create '{}' failed: {}", remote, e)))?;

        let mut transferred: u64 = 0;
        let mut buf = [0u8; CHUNK];
        loop {
            let n = source
                .read(&mut buf)
                .map_err(|e| ClientError::io(format!("Reading local file failed: {}", e)))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])
                .map_err(|e| ClientError::remote(format!("write '{}' failed: {}", remote, e)))?;
            transferred += n as u64;
            if !progress(transferred, size) {
                return Err(ClientError::interrupted());
            }
        }
        log::debug!("Uploaded {} ({} bytes)", remote, transferred);
        Ok(transferred)
    }

    async fn delete(&mut self, p: &str) -> ClientResult<()> {
        let target = self.resolve(p);
        self.sftp_ref()?
            .unlink(Path::new(&target))
            .map_err(|e| ClientError::remote(format!("unlink '{}' failed: {}", target, e)))
    }

    async fn rmdir(&mut self, p: &str) -> ClientResult<()> {
        let target = self.resolve(p);
        self.sftp_ref()?
            .rmdir(Path::new(&target))
            .map_err(|e| ClientError::remote(format!("rmdir '{}' failed: {}", target, e)))
    }

    async fn mkdir(&mut self, p: &str) -> ClientResult<()> {
        let target = self.resolve(p);
        self.sftp_ref()?
            .mkdir(Path::new(&target), 0o755)
            .map_err(|e| ClientError::remote(format!("mkdir '{}' failed: {}", target, e)))
    }

    async fn rename(&mut self, old_path: &str, new_path: &str) -> ClientResult<()> {
        let old = self.resolve(old_path);
        let new = self.resolve(new_path);
        self.sftp_ref()?
            .rename(Path::new(&old), Path::new(&new), None)
            .map_err(|e| ClientError::remote(format!("rename '{}' → '{}' failed: {}", old, new, e)))
    }

    async fn stat(&mut self, p: &str) -> ClientResult<RemoteFile> {
        let target = self.resolve(p);
        let sftp = self.sftp_ref()?;
        let stat = sftp
            .stat(Path::new(&target))
            .map_err(|e| ClientError::remote(format!("stat '{}' failed: {}", target, e)))?;
        let name = path::file_name(&target).to_string();
        Ok(self.entry_from_stat(Path::new(&target), name, &stat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_strings() {
        assert_eq!(format_permissions(0o040755), "drwxr-xr-x");
        assert_eq!(format_permissions(0o100644), "-rw-r--r--");
        assert_eq!(format_permissions(0o120777), "lrwxrwxrwx");
    }

    #[test]
    fn mode_classification() {
        assert!(is_dir_mode(0o040755));
        assert!(!is_dir_mode(0o100644));
        assert!(is_symlink_mode(0o120777));
    }

    #[test]
    fn starts_unconnected_at_root() {
        let c = SftpClient::new(ConnectionInfo::default());
        assert!(!c.connected());
        assert_eq!(c.cwd(), "/");
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut c = SftpClient::new(ConnectionInfo::default());
        c.disconnect().await;
        c.disconnect().await;
        assert!(!c.connected());
    }

    #[tokio::test]
    async fn prompt_policy_fails_before_io() {
        let mut info = ConnectionInfo::default();
        info.host = "example.invalid".to_string();
        info.host_key_policy = HostKeyPolicy::Prompt;
        let mut c = SftpClient::new(info);
        let err = c.connect().await.unwrap_err();
        assert!(err.message.contains("not supported yet"));
    }
}
