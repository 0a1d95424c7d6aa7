//! The protocol-agnostic client capability set.

use crate::error::ClientResult;
use crate::path;
use crate::types::RemoteFile;
use async_trait::async_trait;
use std::io::{Read, Write};

/// Progress callback invoked after every transferred chunk with
/// `(bytes_so_far, total_bytes)`. Returning `false` asks the client to
/// abort the transfer; the client then fails with an `Interrupted`
/// error instead of unwinding through the callback.
pub type ProgressFn<'a> = dyn FnMut(u64, u64) -> bool + Send + 'a;

/// Capability set every protocol implementation provides.
///
/// Lifecycle: constructed unconnected → `connect()` → operations →
/// `disconnect()`. A client is single-connection: reconnecting means
/// discarding the instance and creating a new one. Instances are not
/// safe for concurrent use; give each transfer job its own client.
#[async_trait]
pub trait TransferClient: Send {
    /// Whether a session is currently established.
    fn connected(&self) -> bool;

    /// Current working directory — POSIX-style absolute path, `/`
    /// until a session reports its start directory.
    fn cwd(&self) -> &str;

    /// Establish the session. Any failure (network, auth, negotiation,
    /// host-key rejection) surfaces as a `ConnectionFailed` with a
    /// human-readable cause, and leaves `connected() == false`.
    async fn connect(&mut self) -> ClientResult<()>;

    /// Tear down the session, swallowing teardown errors. Idempotent
    /// and safe to call when never connected.
    async fn disconnect(&mut self);

    /// List entries of `path` (`"."` = current directory), excluding
    /// the `.` and `..` pseudo-entries.
    async fn list_dir(&mut self, path: &str) -> ClientResult<Vec<RemoteFile>>;

    /// Change the working directory; returns the new absolute path.
    async fn chdir(&mut self, path: &str) -> ClientResult<String>;

    /// Stream a remote file into `sink`, reporting progress after each
    /// chunk. Returns the number of bytes written.
    async fn download(
        &mut self,
        remote_path: &str,
        sink: &mut (dyn Write + Send),
        progress: &mut ProgressFn<'_>,
    ) -> ClientResult<u64>;

    /// Stream `size` bytes from `source` to a remote file, reporting
    /// progress after each chunk. Returns the number of bytes sent.
    async fn upload(
        &mut self,
        source: &mut (dyn Read + Send),
        size: u64,
        remote_path: &str,
        progress: &mut ProgressFn<'_>,
    ) -> ClientResult<u64>;

    async fn delete(&mut self, path: &str) -> ClientResult<()>;

    async fn rmdir(&mut self, path: &str) -> ClientResult<()>;

    async fn mkdir(&mut self, path: &str) -> ClientResult<()>;

    async fn rename(&mut self, old_path: &str, new_path: &str) -> ClientResult<()>;

    /// Describe a single remote path.
    async fn stat(&mut self, path: &str) -> ClientResult<RemoteFile>;

    /// Convenience: change into the parent of the current directory.
    async fn parent_dir(&mut self) -> ClientResult<String> {
        let parent = path::parent_of(self.cwd());
        self.chdir(&parent).await
    }
}
