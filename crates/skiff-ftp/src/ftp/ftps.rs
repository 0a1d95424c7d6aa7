//! Explicit FTPS — the FTP client running in TLS mode.

use crate::ftp::client::{FtpClient, Security};
use async_trait::async_trait;
use skiff_core::{ClientResult, ConnectionInfo, ProgressFn, RemoteFile, TransferClient};
use std::io::{Read, Write};

/// FTPS client: identical command set to [`FtpClient`], with the
/// control channel upgraded via `AUTH TLS` and data channels protected
/// with `PROT P`.
pub struct FtpsClient {
    inner: FtpClient,
}

impl FtpsClient {
    pub fn new(info: ConnectionInfo) -> Self {
        Self {
            inner: FtpClient::with_security(info, Security::ExplicitTls),
        }
    }
}

#[async_trait]
impl TransferClient for FtpsClient {
    fn connected(&self) -> bool {
        self.inner.connected()
    }

    fn cwd(&self) -> &str {
        self.inner.cwd()
    }

    async fn connect(&mut self) -> ClientResult<()> {
        self.inner.connect().await
    }

    async fn disconnect(&mut self) {
        self.inner.disconnect().await
    }

    async fn list_dir(&mut self, path: &str) -> ClientResult<Vec<RemoteFile>> {
        self.inner.list_dir(path).await
    }

    async fn chdir(&mut self, path: &str) -> ClientResult<String> {
        self.inner.chdir(path).await
    }

    async fn download(
        &mut self,
        remote_path: &str,
        sink: &mut (dyn Write + Send),
        progress: &mut ProgressFn<'_>,
    ) -> ClientResult<u64> {
        self.inner.download(remote_path, sink, progress).await
    }

    async fn upload(
        &mut self,
        source: &mut (dyn Read + Send),
        size: u64,
        remote_path: &str,
        progress: &mut ProgressFn<'_>,
    ) -> ClientResult<u64> {
        self.inner.upload(source, size, remote_path, progress).await
    }

    async fn delete(&mut self, path: &str) -> ClientResult<()> {
        self.inner.delete(path).await
    }

    async fn rmdir(&mut self, path: &str) -> ClientResult<()> {
        self.inner.rmdir(path).await
    }

    async fn mkdir(&mut self, path: &str) -> ClientResult<()> {
        self.inner.mkdir(path).await
    }

    async fn rename(&mut self, old_path: &str, new_path: &str) -> ClientResult<()> {
        self.inner.rename(old_path, new_path).await
    }

    async fn stat(&mut self, path: &str) -> ClientResult<RemoteFile> {
        self.inner.stat(path).await
    }
}
