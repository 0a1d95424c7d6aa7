//! Per-job task bodies.
//!
//! Every worker owns its protocol client for the lifetime of the job:
//! connect on first use, transfer, disconnect. Cancellation is
//! cooperative — the flag is checked between files and inside every
//! progress callback, and surfaces as an `Interrupted` error that the
//! manager records as `Cancelled`.

use crate::transfer::manager::ManagerInner;
use skiff_core::{path as remote_path, ClientError, ClientResult, TransferClient};
use std::fs::File;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(crate) async fn run_download(
    inner: Arc<ManagerInner>,
    id: u64,
    mut client: Box<dyn TransferClient + Send>,
    cancel: Arc<AtomicBool>,
) {
    let result = download_job(&inner, id, client.as_mut(), &cancel).await;
    client.disconnect().await;
    inner.finish(id, result);
}

pub(crate) async fn run_upload(
    inner: Arc<ManagerInner>,
    id: u64,
    mut client: Box<dyn TransferClient + Send>,
    cancel: Arc<AtomicBool>,
) {
    let result = upload_job(&inner, id, client.as_mut(), &cancel).await;
    client.disconnect().await;
    inner.finish(id, result);
}

pub(crate) async fn run_download_dir(
    inner: Arc<ManagerInner>,
    id: u64,
    mut client: Box<dyn TransferClient + Send>,
    cancel: Arc<AtomicBool>,
) {
    let result = download_dir_job(&inner, id, client.as_mut(), &cancel).await;
    client.disconnect().await;
    inner.finish(id, result);
}

pub(crate) async fn run_upload_dir(
    inner: Arc<ManagerInner>,
    id: u64,
    mut client: Box<dyn TransferClient + Send>,
    cancel: Arc<AtomicBool>,
) {
    let result = upload_dir_job(&inner, id, client.as_mut(), &cancel).await;
    client.disconnect().await;
    inner.finish(id, result);
}

fn check_cancel(cancel: &AtomicBool) -> ClientResult<()> {
    if cancel.load(Ordering::SeqCst) {
        Err(ClientError::interrupted())
    } else {
        Ok(())
    }
}

async fn ensure_connected(client: &mut (dyn TransferClient + Send)) -> ClientResult<()> {
    if !client.connected() {
        client.connect().await?;
    }
    Ok(())
}

fn job_paths(inner: &Arc<ManagerInner>, id: u64) -> ClientResult<(String, PathBuf)> {
    inner
        .snapshot_of(id)
        .map(|item| (item.remote_path, PathBuf::from(item.local_path)))
        .ok_or_else(|| ClientError::remote("Job record disappeared before the worker started"))
}

async fn download_job(
    inner: &Arc<ManagerInner>,
    id: u64,
    client: &mut (dyn TransferClient + Send),
    cancel: &Arc<AtomicBool>,
) -> ClientResult<u64> {
    check_cancel(cancel)?;
    ensure_connected(client).await?;
    let (remote, local) = job_paths(inner, id)?;

    let total = client.stat(&remote).await.map(|f| f.size).unwrap_or(0);
    inner.begin(id, total);

    if let Some(parent) = local.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut sink = File::create(&local)?;

    let inner2 = inner.clone();
    let cancel2 = cancel.clone();
    let mut progress = move |done: u64, _total: u64| {
        inner2.set_transferred(id, done);
        !cancel2.load(Ordering::SeqCst)
    };
    client.download(&remote, &mut sink, &mut progress).await
}

async fn upload_job(
    inner: &Arc<ManagerInner>,
    id: u64,
    client: &mut (dyn TransferClient + Send),
    cancel: &Arc<AtomicBool>,
) -> ClientResult<u64> {
    check_cancel(cancel)?;
    ensure_connected(client).await?;
    let (remote, local) = job_paths(inner, id)?;

    let total = std::fs::metadata(&local)?.len();
    inner.begin(id, total);

    let mut source = File::open(&local)?;

    let inner2 = inner.clone();
    let cancel2 = cancel.clone();
    let mut progress = move |done: u64, _total: u64| {
        inner2.set_transferred(id, done);
        !cancel2.load(Ordering::SeqCst)
    };
    client.upload(&mut source, total, &remote, &mut progress).await
}

// ── Recursive transfers ──────────────────────────────────────────────

async fn download_dir_job(
    inner: &Arc<ManagerInner>,
    id: u64,
    client: &mut (dyn TransferClient + Send),
    cancel: &Arc<AtomicBool>,
) -> ClientResult<u64> {
    check_cancel(cancel)?;
    ensure_connected(client).await?;
    let (remote_root, local_root) = job_paths(inner, id)?;

    // Walk the remote tree first so progress runs against the true
    // total instead of jumping per file.
    let mut files: Vec<(String, PathBuf, u64)> = Vec::new();
    let mut dirs: Vec<PathBuf> = vec![local_root.clone()];
    collect_remote_tree(client, remote_root, local_root, &mut files, &mut dirs).await?;

    let total: u64 = files.iter().map(|(_, _, size)| *size).sum();
    inner.begin(id, total);

    for dir in &dirs {
        std::fs::create_dir_all(dir)?;
    }

    let mut base: u64 = 0;
    for (remote, local, size) in files {
        check_cancel(cancel)?;

        let mut sink = File::create(&local)?;
        let inner2 = inner.clone();
        let cancel2 = cancel.clone();
        let mut progress = move |done: u64, _total: u64| {
            inner2.set_transferred(id, base + done);
            !cancel2.load(Ordering::SeqCst)
        };
        client.download(&remote, &mut sink, &mut progress).await?;

        base += size;
        inner.set_transferred(id, base);
    }
    Ok(base)
}

fn collect_remote_tree<'a>(
    client: &'a mut (dyn TransferClient + Send),
    remote_dir: String,
    local_dir: PathBuf,
    files: &'a mut Vec<(String, PathBuf, u64)>,
    dirs: &'a mut Vec<PathBuf>,
) -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + 'a>> {
    Box::pin(async move {
        let entries = client.list_dir(&remote_dir).await?;
        for entry in entries {
            let local = local_dir.join(&entry.name);
            if entry.is_dir {
                dirs.push(local.clone());
                collect_remote_tree(client, entry.path, local, files, dirs).await?;
            } else {
                files.push((entry.path, local, entry.size));
            }
        }
        Ok(())
    })
}

async fn upload_dir_job(
    inner: &Arc<ManagerInner>,
    id: u64,
    client: &mut (dyn TransferClient + Send),
    cancel: &Arc<AtomicBool>,
) -> ClientResult<u64> {
    check_cancel(cancel)?;
    ensure_connected(client).await?;
    let (remote_root, local_root) = job_paths(inner, id)?;

    let mut files: Vec<(PathBuf, String, u64)> = Vec::new();
    let mut dirs: Vec<String> = Vec::new();
    collect_local_tree(&local_root, &remote_root, &mut files, &mut dirs)?;

    let total: u64 = files.iter().map(|(_, _, size)| *size).sum();
    inner.begin(id, total);

    // Parents sort before children, so creating in order never hits a
    // missing intermediate. Existing directories are not an error.
    dirs.sort();
    if client.mkdir(&remote_root).await.is_err() {
        log::debug!("Remote directory {} already present", remote_root);
    }
    for dir in &dirs {
        check_cancel(cancel)?;
        if client.mkdir(dir).await.is_err() {
            log::debug!("Remote directory {} already present", dir);
        }
    }

    let mut base: u64 = 0;
    for (local, remote, size) in files {
        check_cancel(cancel)?;

        let mut source = File::open(&local)?;
        let inner2 = inner.clone();
        let cancel2 = cancel.clone();
        let mut progress = move |done: u64, _total: u64| {
            inner2.set_transferred(id, base + done);
            !cancel2.load(Ordering::SeqCst)
        };
        client.upload(&mut source, size, &remote, &mut progress).await?;

        base += size;
        inner.set_transferred(id, base);
    }
    Ok(base)
}

fn collect_local_tree(
    local_dir: &Path,
    remote_dir: &str,
    files: &mut Vec<(PathBuf, String, u64)>,
    dirs: &mut Vec<String>,
) -> ClientResult<()> {
    for entry in std::fs::read_dir(local_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let remote = remote_path::join(remote_dir, &name);
        let meta = entry.metadata()?;
        if meta.is_dir() {
            dirs.push(remote.clone());
            collect_local_tree(&entry.path(), &remote, files, dirs)?;
        } else if meta.is_file() {
            files.push((entry.path(), remote, meta.len()));
        }
    }
    Ok(())
}
