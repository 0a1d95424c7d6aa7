//! The stateful FTP client.

use crate::ftp::codec::FtpCodec;
use crate::ftp::{connection, data, parser, tls};
use async_trait::async_trait;
use skiff_core::{path, ClientError, ClientResult, ConnectionInfo, ProgressFn, RemoteFile, TransferClient};
use std::io::{Read, Write};

const CHUNK: usize = 8192;

/// Whether the control and data channels run over TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Security {
    Plain,
    ExplicitTls,
}

/// FTP client over an async control channel with PASV/PORT data
/// channels and MLSD listings.
pub struct FtpClient {
    info: ConnectionInfo,
    security: Security,
    codec: Option<FtpCodec>,
    connected: bool,
    cwd: String,
}

impl FtpClient {
    pub fn new(info: ConnectionInfo) -> Self {
        Self::with_security(info, Security::Plain)
    }

    pub(crate) fn with_security(info: ConnectionInfo, security: Security) -> Self {
        Self {
            info,
            security,
            codec: None,
            connected: false,
            cwd: "/".to_string(),
        }
    }

    fn secured(&self) -> bool {
        self.security == Security::ExplicitTls
    }

    fn codec_mut(&mut self) -> ClientResult<&mut FtpCodec> {
        self.codec.as_mut().ok_or_else(ClientError::not_connected)
    }

    fn resolve(&self, p: &str) -> String {
        if path::is_absolute(p) {
            p.to_string()
        } else {
            path::join(&self.cwd, p)
        }
    }

    /// Login, TLS negotiation, binary mode, initial PWD.
    async fn establish(&mut self) -> ClientResult<()> {
        if self.info.host.is_empty() {
            return Err(ClientError::connection_failed("No host configured"));
        }

        let (mut codec, _banner) =
            connection::connect(&self.info.host, self.info.effective_port(), self.info.timeout_secs)
                .await?;

        if self.secured() {
            let reply = codec.execute("AUTH TLS").await?;
            if !reply.is_success() {
                return Err(ClientError::connection_failed(format!(
                    "Server refused AUTH TLS: {}",
                    reply.text()
                )));
            }
            codec = tls::upgrade(codec, &self.info.host).await?;
        }

        let user = if self.info.username.is_empty() {
            "anonymous"
        } else {
            &self.info.username
        };
        let reply = codec.execute(&format!("USER {}", user)).await?;
        if reply.is_intermediate() {
            let reply = codec
                .execute(&format!("PASS {}", self.info.password))
                .await?;
            if !reply.is_success() {
                return Err(reply.into_error());
            }
        } else if !reply.is_success() {
            return Err(reply.into_error());
        }
        log::info!("Logged in to {} as {}", self.info.host, user);

        // Data-channel protection is negotiated after login; some
        // servers reject PBSZ/PROT from unauthenticated sessions.
        if self.secured() {
            codec.expect_ok("PBSZ 0").await?;
            codec.expect_ok("PROT P").await?;
        }

        codec.expect_ok("TYPE I").await?;

        self.cwd = match codec.execute("PWD").await {
            Ok(reply) if reply.is_success() => {
                parse_pwd_path(&reply.text()).unwrap_or_else(|| "/".to_string())
            }
            _ => "/".to_string(),
        };

        self.codec = Some(codec);
        Ok(())
    }

    /// Best-effort SIZE query; 0 when the server cannot answer.
    async fn size_of(&mut self, remote: &str) -> u64 {
        let codec = match self.codec_mut() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        match codec.execute(&format!("SIZE {}", remote)).await {
            Ok(reply) if reply.is_success() => reply
                .text()
                .split_whitespace()
                .nth(1)
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0),
            _ => 0,
        }
    }

    async fn open_data(&mut self) -> ClientResult<data::DataStream> {
        let passive = self.info.passive_mode;
        let secured = self.secured();
        let host = self.info.host.clone();
        let timeout = self.info.timeout_secs;
        let codec = self.codec_mut()?;
        data::open_data_channel(codec, passive, secured, &host, timeout).await
    }
}

/// Extract the quoted path from a `257 "/some/dir" ...` reply.
fn parse_pwd_path(text: &str) -> Option<String> {
    let start = text.find('"')?;
    let rest = &text[start + 1..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

#[async_trait]
impl TransferClient for FtpClient {
    fn connected(&self) -> bool {
        self.connected
    }

    fn cwd(&self) -> &str {
        &self.cwd
    }

    async fn connect(&mut self) -> ClientResult<()> {
        let label = if self.secured() {
            "FTPS connection failed"
        } else {
            "FTP connection failed"
        };
        match self.establish().await {
            Ok(()) => {
                self.connected = true;
                Ok(())
            }
            Err(e) => {
                self.codec = None;
                self.connected = false;
                Err(e.into_connection_failed(label))
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(codec) = self.codec.as_mut() {
            // Best effort; the server may have dropped us already.
            let _ = codec.execute("QUIT").await;
        }
        self.codec = None;
        self.connected = false;
        log::debug!("FTP session closed");
    }

    async fn list_dir(&mut self, p: &str) -> ClientResult<Vec<RemoteFile>> {
        let (cmd, base) = if p == "." {
            ("MLSD".to_string(), self.cwd.clone())
        } else {
            let resolved = self.resolve(p);
            (format!("MLSD {}", resolved), resolved)
        };

        let mut ds = self.open_data().await?;
        let codec = self.codec_mut()?;
        let reply = codec.execute(&cmd).await?;
        if !reply.is_preliminary() && !reply.is_success() {
            return Err(reply.into_error());
        }

        let mut body = Vec::new();
        let mut buf = [0u8; CHUNK];
        loop {
            let n = ds.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&buf[..n]);
        }
        drop(ds);

        let completion = self.codec_mut()?.read_reply().await?;
        if !completion.is_success() {
            return Err(completion.into_error());
        }

        let text = String::from_utf8_lossy(&body);
        Ok(parser::parse_mlsd_listing(&text, &base))
    }

    async fn chdir(&mut self, p: &str) -> ClientResult<String> {
        let target = self.resolve(p);
        let codec = self.codec_mut()?;
        codec.expect_ok(&format!("CWD {}", target)).await?;
        let reply = codec.expect_ok("PWD").await?;
        self.cwd = parse_pwd_path(&reply.text()).unwrap_or(target);
        Ok(self.cwd.clone())
    }

    async fn download(
        &mut self,
        remote_path: &str,
        sink: &mut (dyn Write + Send),
        progress: &mut ProgressFn<'_>,
    ) -> ClientResult<u64> {
        let remote = self.resolve(remote_path);
        let total = self.size_of(&remote).await;

        let mut ds = self.open_data().await?;
        let reply = self.codec_mut()?.execute(&format!("RETR {}", remote)).await?;
        if !reply.is_preliminary() && !reply.is_success() {
            return Err(reply.into_error());
        }

        let mut transferred: u64 = 0;
        let mut buf = [0u8; CHUNK];
        loop {
            let n = ds.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])
                .map_err(|e| ClientError::io(format!("Writing local file failed: {}", e)))?;
            transferred += n as u64;
            if !progress(transferred, total) {
                drop(ds);
                // Flush the aborted-transfer reply so the control
                // channel stays usable.
                let _ = self.codec_mut()?.read_reply().await;
                return Err(ClientError::interrupted());
            }
        }
        drop(ds);

        let completion = self.codec_mut()?.read_reply().await?;
        if !completion.is_success() {
            return Err(completion.into_error());
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

        let mut ds = self.open_data().await?;
        let reply = self.codec_mut()?.execute(&format!("STOR {}", remote)).await?;
        if !reply.is_preliminary() && !reply.is_success() {
            return Err(reply.into_error());
        }

        let mut transferred: u64 = 0;
        let mut buf = [0u8; CHUNK];
        loop {
            let n = source
                .read(&mut buf)
                .map_err(|e| ClientError::io(format!("Reading local file failed: {}", e)))?;
            if n == 0 {
                break;
            }
            ds.write_all(&buf[..n]).await?;
            transferred += n as u64;
            if !progress(transferred, size) {
                drop(ds);
                let _ = self.codec_mut()?.read_reply().await;
                return Err(ClientError::interrupted());
            }
        }
        ds.shutdown().await?;
        drop(ds);

        let completion = self.codec_mut()?.read_reply().await?;
        if !completion.is_success() {
            return Err(completion.into_error());
        }
        log::debug!("Uploaded {} ({} bytes)", remote, transferred);
        Ok(transferred)
    }

    async fn delete(&mut self, p: &str) -> ClientResult<()> {
        let target = self.resolve(p);
        self.codec_mut()?
            .expect_ok(&format!("DELE {}", target))
            .await?;
        Ok(())
    }

    async fn rmdir(&mut self, p: &str) -> ClientResult<()> {
        let target = self.resolve(p);
        self.codec_mut()?
            .expect_ok(&format!("RMD {}", target))
            .await?;
        Ok(())
    }

    async fn mkdir(&mut self, p: &str) -> ClientResult<()> {
        let target = self.resolve(p);
        self.codec_mut()?
            .expect_ok(&format!("MKD {}", target))
            .await?;
        Ok(())
    }

    async fn rename(&mut self, old_path: &str, new_path: &str) -> ClientResult<()> {
        let old = self.resolve(old_path);
        let new = self.resolve(new_path);
        let codec = self.codec_mut()?;
        let reply = codec.execute(&format!("RNFR {}", old)).await?;
        if !reply.is_intermediate() && !reply.is_success() {
            return Err(reply.into_error());
        }
        codec.expect_ok(&format!("RNTO {}", new)).await?;
        Ok(())
    }

    async fn stat(&mut self, p: &str) -> ClientResult<RemoteFile> {
        let target = self.resolve(p);
        let size = self.size_of(&target).await;

        let modified = match self.codec_mut()?.execute(&format!("MDTM {}", target)).await {
            Ok(reply) if reply.is_success() => reply
                .text()
                .split_whitespace()
                .nth(1)
                .and_then(parser::parse_mdtm_timestamp),
            _ => None,
        };

        Ok(RemoteFile {
            name: path::file_name(&target).to_string(),
            path: target,
            size,
            is_dir: false,
            modified,
            permissions: String::new(),
            owner: String::new(),
            group: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pwd_reply_parsing() {
        assert_eq!(
            parse_pwd_path(r#"257 "/home/alex" is the current directory"#).unwrap(),
            "/home/alex"
        );
        assert!(parse_pwd_path("257 no quotes here").is_none());
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let mut c = FtpClient::new(ConnectionInfo::default());
        c.cwd = "/srv".to_string();
        assert_eq!(c.resolve("data.bin"), "/srv/data.bin");
        assert_eq!(c.resolve("/abs/data.bin"), "/abs/data.bin");
    }

    #[test]
    fn starts_unconnected() {
        let c = FtpClient::new(ConnectionInfo::default());
        assert!(!c.connected());
        assert_eq!(c.cwd(), "/");
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut c = FtpClient::new(ConnectionInfo::default());
        c.disconnect().await;
        c.disconnect().await;
        assert!(!c.connected());
    }
}
