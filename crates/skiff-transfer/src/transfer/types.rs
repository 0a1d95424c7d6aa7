//! Transfer job records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Download,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TransferStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled
        )
    }
}

/// One queued or running transfer, as exposed to observers. Snapshots
/// are value copies; mutating one has no effect on the live job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub id: u64,
    pub direction: TransferDirection,
    pub remote_path: String,
    pub local_path: String,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub status: TransferStatus,
    pub error: Option<String>,
}

impl TransferItem {
    /// Whole-number completion percentage, clamped to 0–100. An
    /// unknown total reads as 0 rather than dividing by zero.
    pub fn progress_percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }
        let pct = self.transferred_bytes.saturating_mul(100) / self.total_bytes;
        pct.min(100) as u8
    }

    /// Short status label for list views: the percentage while the
    /// transfer runs, the status word otherwise.
    pub fn display_status(&self) -> String {
        match self.status {
            TransferStatus::Queued => "queued".to_string(),
            TransferStatus::InProgress => format!("{}%", self.progress_percent()),
            TransferStatus::Completed => "completed".to_string(),
            TransferStatus::Failed => "failed".to_string(),
            TransferStatus::Cancelled => "cancelled".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(transferred: u64, total: u64, status: TransferStatus) -> TransferItem {
        TransferItem {
            id: 1,
            direction: TransferDirection::Download,
            remote_path: "/data.bin".into(),
            local_path: "/tmp/data.bin".into(),
            total_bytes: total,
            transferred_bytes: transferred,
            status,
            error: None,
        }
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(item(0, 0, TransferStatus::Queued).progress_percent(), 0);
        assert_eq!(item(50, 200, TransferStatus::InProgress).progress_percent(), 25);
        assert_eq!(item(300, 200, TransferStatus::InProgress).progress_percent(), 100);
    }

    #[test]
    fn zero_total_never_divides() {
        assert_eq!(item(999, 0, TransferStatus::InProgress).progress_percent(), 0);
    }

    #[test]
    fn display_status_shows_percent_only_in_flight() {
        assert_eq!(item(50, 100, TransferStatus::InProgress).display_status(), "50%");
        assert_eq!(item(50, 100, TransferStatus::Queued).display_status(), "queued");
        assert_eq!(item(100, 100, TransferStatus::Completed).display_status(), "completed");
    }

    #[test]
    fn terminal_statuses() {
        assert!(TransferStatus::Completed.is_terminal());
        assert!(TransferStatus::Failed.is_terminal());
        assert!(TransferStatus::Cancelled.is_terminal());
        assert!(!TransferStatus::Queued.is_terminal());
        assert!(!TransferStatus::InProgress.is_terminal());
    }
}
