//! Per-run progress accounting.
//!
//! [`ProgressTracker`] is the engine's private accumulator. Callers only ever
//! see [`MigrationProgress`] values produced by [`ProgressTracker::snapshot`],
//! which are owned copies and never change after emission.

use serde::{Deserialize, Serialize};

/// Number of batches needed for `total` records.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    total.div_ceil(batch_size)
}

/// Outcome state of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Processing,
    Success,
    Error,
    Skipped,
}

impl RecordStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecordStatus::Success | RecordStatus::Error | RecordStatus::Skipped
        )
    }

    /// Allowed moves: pending → processing → success | error | skipped.
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        match self {
            RecordStatus::Pending => next == RecordStatus::Processing,
            RecordStatus::Processing => next.is_terminal(),
            _ => false,
        }
    }
}

/// Status line for one approved record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub display_name: String,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Immutable view of a run at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationProgress {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub records: Vec<MigrationRecord>,
    pub is_in_progress: bool,
    /// 1-based; 0 until the first batch starts.
    pub current_batch: usize,
    pub total_batches: usize,
}

impl MigrationProgress {
    /// Records that ended in error.
    pub fn failures(&self) -> impl Iterator<Item = &MigrationRecord> {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Error)
    }
}

/// Mutable accumulator behind the progress snapshots.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    total_batches: usize,
    current_batch: usize,
    successful: usize,
    failed: usize,
    skipped: usize,
    in_progress: bool,
    records: Vec<MigrationRecord>,
}

impl ProgressTracker {
    pub fn new(total: usize, batch_size: usize) -> Self {
        Self {
            total,
            total_batches: batch_count(total, batch_size),
            current_batch: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            in_progress: true,
            records: Vec::with_capacity(total),
        }
    }

    pub fn start_batch(&mut self, batch: usize) {
        self.current_batch = batch;
    }

    /// Append a record in the processing state; returns its slot.
    pub fn begin(&mut self, source_id: String, display_name: String) -> usize {
        self.records.push(MigrationRecord {
            source_id,
            target_id: None,
            display_name,
            status: RecordStatus::Pending,
            error: None,
        });
        let slot = self.records.len() - 1;
        self.transition(slot, RecordStatus::Processing);
        slot
    }

    pub fn succeed(&mut self, slot: usize, target_id: Option<String>) {
        if self.transition(slot, RecordStatus::Success) {
            self.records[slot].target_id = target_id;
            self.successful += 1;
        }
    }

    pub fn fail(&mut self, slot: usize, message: String) {
        if self.transition(slot, RecordStatus::Error) {
            self.records[slot].error = Some(message);
            self.failed += 1;
        }
    }

    pub fn skip(&mut self, slot: usize) {
        if self.transition(slot, RecordStatus::Skipped) {
            self.skipped += 1;
        }
    }

    pub fn finish(&mut self) {
        self.in_progress = false;
    }

    fn transition(&mut self, slot: usize, next: RecordStatus) -> bool {
        match self.records.get_mut(slot) {
            Some(record) if record.status.can_transition_to(next) => {
                record.status = next;
                true
            }
            _ => false,
        }
    }

    /// Project the current state into an owned snapshot.
    pub fn snapshot(&self) -> MigrationProgress {
        MigrationProgress {
            total: self.total,
            processed: self.successful + self.failed + self.skipped,
            successful: self.successful,
            failed: self.failed,
            skipped: self.skipped,
            records: self.records.clone(),
            is_in_progress: self.in_progress,
            current_batch: self.current_batch,
            total_batches: self.total_batches,
        }
    }
}
