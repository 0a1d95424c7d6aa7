//! The job table: enqueue, snapshot, observe, cancel.

use crate::transfer::types::{TransferDirection, TransferItem, TransferStatus};
use crate::transfer::worker;
use skiff_core::{ClientResult, ErrorKind, TransferClient};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Observer invoked with a snapshot after every job state change.
/// Called from worker tasks; keep it cheap and non-blocking.
pub type ObserverFn = dyn Fn(&TransferItem) + Send + Sync;

pub(crate) struct JobSlot {
    pub item: TransferItem,
    pub cancel: Arc<AtomicBool>,
}

pub(crate) struct ManagerInner {
    pub jobs: Mutex<Vec<JobSlot>>,
    pub next_id: AtomicU64,
    pub observer: Mutex<Option<Box<ObserverFn>>>,
}

impl ManagerInner {
    pub(crate) fn snapshot_of(&self, id: u64) -> Option<TransferItem> {
        let jobs = self.jobs.lock().ok()?;
        jobs.iter().find(|s| s.item.id == id).map(|s| s.item.clone())
    }

    fn notify(&self, item: &TransferItem) {
        if let Ok(observer) = self.observer.lock() {
            if let Some(f) = observer.as_ref() {
                f(item);
            }
        }
    }

    /// Mutate a job under the lock, then notify the observer with the
    /// resulting snapshot (outside the lock).
    pub(crate) fn update<F: FnOnce(&mut TransferItem)>(&self, id: u64, f: F) {
        let snapshot = {
            let mut jobs = match self.jobs.lock() {
                Ok(j) => j,
                Err(_) => return,
            };
            match jobs.iter_mut().find(|s| s.item.id == id) {
                Some(slot) => {
                    f(&mut slot.item);
                    slot.item.clone()
                }
                None => return,
            }
        };
        self.notify(&snapshot);
    }

    /// Mark a job in progress with its now-known total. No-op when the
    /// job was already cancelled.
    pub(crate) fn begin(&self, id: u64, total: u64) {
        self.update(id, |item| {
            if !item.status.is_terminal() {
                item.total_bytes = total;
                item.status = TransferStatus::InProgress;
            }
        });
    }

    pub(crate) fn set_transferred(&self, id: u64, bytes: u64) {
        self.update(id, |item| {
            if item.status == TransferStatus::InProgress {
                item.transferred_bytes = bytes;
            }
        });
    }

    /// Record the job outcome. Terminal states (a cancel that already
    /// landed) are never overwritten.
    pub(crate) fn finish(&self, id: u64, result: ClientResult<u64>) {
        self.update(id, |item| {
            if item.status.is_terminal() {
                return;
            }
            match &result {
                Ok(bytes) => {
                    item.transferred_bytes = *bytes;
                    item.status = TransferStatus::Completed;
                }
                Err(e) if e.kind == ErrorKind::Interrupted => {
                    item.status = TransferStatus::Cancelled;
                }
                Err(e) => {
                    item.status = TransferStatus::Failed;
                    item.error = Some(e.to_string());
                }
            }
        });
        match self.snapshot_of(id) {
            Some(item) if item.status == TransferStatus::Failed => {
                log::warn!("Transfer {} failed: {}", id, item.error.unwrap_or_default())
            }
            Some(item) => log::info!("Transfer {} finished: {:?}", id, item.status),
            None => {}
        }
    }
}

/// Handle to the transfer engine. Cheap to clone; all clones share the
/// same job table.
#[derive(Clone)]
pub struct TransferManager {
    inner: Arc<ManagerInner>,
}

impl TransferManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                jobs: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                observer: Mutex::new(None),
            }),
        }
    }

    /// Install the state-change observer, replacing any previous one.
    pub fn set_observer(&self, f: impl Fn(&TransferItem) + Send + Sync + 'static) {
        if let Ok(mut observer) = self.inner.observer.lock() {
            *observer = Some(Box::new(f));
        }
    }

    /// Snapshot of every job, oldest first.
    pub fn jobs(&self) -> Vec<TransferItem> {
        self.inner
            .jobs
            .lock()
            .map(|jobs| jobs.iter().map(|s| s.item.clone()).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, id: u64) -> Option<TransferItem> {
        self.inner.snapshot_of(id)
    }

    /// Request cancellation. Returns whether a cancellable job existed:
    /// unknown ids and already-finished jobs are a logged no-op. The
    /// status flips to `Cancelled` immediately; a running worker stops
    /// at its next progress checkpoint.
    pub fn cancel(&self, id: u64) -> bool {
        let snapshot = {
            let mut jobs = match self.inner.jobs.lock() {
                Ok(j) => j,
                Err(_) => return false,
            };
            match jobs.iter_mut().find(|s| s.item.id == id) {
                Some(slot) if !slot.item.status.is_terminal() => {
                    slot.cancel.store(true, Ordering::SeqCst);
                    slot.item.status = TransferStatus::Cancelled;
                    Some(slot.item.clone())
                }
                _ => None,
            }
        };
        match snapshot {
            Some(item) => {
                log::info!("Transfer {} cancelled", id);
                self.inner.notify(&item);
                true
            }
            None => {
                log::debug!("Cancel ignored for transfer {}", id);
                false
            }
        }
    }

    /// Drop completed, failed and cancelled jobs from the table.
    pub fn clear_finished(&self) {
        if let Ok(mut jobs) = self.inner.jobs.lock() {
            jobs.retain(|s| !s.item.status.is_terminal());
        }
    }

    fn register(
        &self,
        direction: TransferDirection,
        remote_path: &str,
        local_path: &Path,
    ) -> (u64, Arc<AtomicBool>) {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = Arc::new(AtomicBool::new(false));
        let item = TransferItem {
            id,
            direction,
            remote_path: remote_path.to_string(),
            local_path: local_path.to_string_lossy().to_string(),
            total_bytes: 0,
            transferred_bytes: 0,
            status: TransferStatus::Queued,
            error: None,
        };
        if let Ok(mut jobs) = self.inner.jobs.lock() {
            jobs.push(JobSlot {
                item: item.clone(),
                cancel: cancel.clone(),
            });
        }
        self.inner.notify(&item);
        (id, cancel)
    }

    /// Queue a single-file download. The client is consumed by the
    /// job; it is connected on first use if needed and disconnected
    /// when the job ends.
    pub fn enqueue_download(
        &self,
        client: Box<dyn TransferClient + Send>,
        remote_path: &str,
        local_path: &Path,
    ) -> u64 {
        let (id, cancel) = self.register(TransferDirection::Download, remote_path, local_path);
        tokio::spawn(worker::run_download(self.inner.clone(), id, client, cancel));
        id
    }

    /// Queue a single-file upload.
    pub fn enqueue_upload(
        &self,
        client: Box<dyn TransferClient + Send>,
        local_path: &Path,
        remote_path: &str,
    ) -> u64 {
        let (id, cancel) = self.register(TransferDirection::Upload, remote_path, local_path);
        tokio::spawn(worker::run_upload(self.inner.clone(), id, client, cancel));
        id
    }

    /// Queue a recursive directory download. The tree is walked first
    /// so progress is reported against the true total.
    pub fn enqueue_download_dir(
        &self,
        client: Box<dyn TransferClient + Send>,
        remote_dir: &str,
        local_dir: &Path,
    ) -> u64 {
        let (id, cancel) = self.register(TransferDirection::Download, remote_dir, local_dir);
        tokio::spawn(worker::run_download_dir(
            self.inner.clone(),
            id,
            client,
            cancel,
        ));
        id
    }

    /// Queue a recursive directory upload. Remote directories are
    /// created parents-first before any file moves.
    pub fn enqueue_upload_dir(
        &self,
        client: Box<dyn TransferClient + Send>,
        local_dir: &Path,
        remote_dir: &str,
    ) -> u64 {
        let (id, cancel) = self.register(TransferDirection::Upload, remote_dir, local_dir);
        tokio::spawn(worker::run_upload_dir(
            self.inner.clone(),
            id,
            client,
            cancel,
        ));
        id
    }
}

impl Default for TransferManager {
    fn default() -> Self {
        Self::new()
    }
}
