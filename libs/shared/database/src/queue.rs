// libs/shared/database/src/queue.rs
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use shared_models::{QueueEntry, QueueEntryStatus};

use crate::error::StoreError;

/// Unit of queue contention: one doctor's walk-in queue for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueKey {
    pub org_id: Uuid,
    pub doctor_id: Uuid,
    pub day: NaiveDate,
}

impl QueueKey {
    pub fn new(org_id: Uuid, doctor_id: Uuid, day: NaiveDate) -> Self {
        Self { org_id, doctor_id, day }
    }
}

/// An entry whose position moved during compaction.
#[derive(Debug, Clone)]
pub struct PositionChange {
    pub entry: QueueEntry,
    pub old_position: u32,
}

/// One doctor's queue for one day. All mutation happens under the per-key
/// mutex held by [`crate::MemoryDatabase`], so methods here are plain and
/// synchronous.
///
/// Entries are kept for the whole day, terminal ones included; only active
/// entries (waiting/called/in_service) carry positions. Positions are dense,
/// starting at 1, with all emergency entries ahead of urgent, ahead of
/// normal, FIFO by join time within a band.
#[derive(Debug, Default)]
pub struct DoctorQueue {
    entries: Vec<QueueEntry>,
    next_ticket: u32,
}

impl DoctorQueue {
    pub fn new() -> Self {
        Self { entries: Vec::new(), next_ticket: 0 }
    }

    pub fn entry(&self, entry_id: Uuid) -> Option<QueueEntry> {
        self.entries.iter().find(|e| e.id == entry_id).cloned()
    }

    /// Active entries in position order.
    pub fn active(&self) -> Vec<QueueEntry> {
        let mut active: Vec<QueueEntry> =
            self.entries.iter().filter(|e| e.is_active()).cloned().collect();
        active.sort_by_key(|e| e.position);
        active
    }

    pub fn active_entry_for_patient(&self, patient_id: Uuid) -> Option<QueueEntry> {
        self.entries
            .iter()
            .find(|e| e.patient_id == patient_id && e.is_active())
            .cloned()
    }

    /// Insert a new waiting entry at the tail of its priority band.
    ///
    /// `avg_service_minutes` seeds the wait estimate from the entry's initial
    /// position; callers recompute live estimates when reading the queue.
    pub fn join(
        &mut self,
        mut entry: QueueEntry,
        avg_service_minutes: i64,
    ) -> Result<QueueEntry, StoreError> {
        if self.active_entry_for_patient(entry.patient_id).is_some() {
            return Err(StoreError::Conflict(format!(
                "patient {} already has an active queue entry",
                entry.patient_id
            )));
        }

        self.next_ticket += 1;
        entry.queue_number = self.next_ticket;
        entry.status = QueueEntryStatus::Waiting;
        entry.position = 0;
        self.entries.push(entry.clone());
        self.resequence();

        // Re-read: resequence assigned the real position.
        let mut stored = self
            .entry(entry.id)
            .ok_or_else(|| StoreError::NotFound(entry.id.to_string()))?;
        let ahead = i64::from(stored.position.saturating_sub(1));
        stored.estimated_wait_minutes = ahead * avg_service_minutes;
        self.update(&stored);
        Ok(stored)
    }

    /// Claim the lowest-position waiting entry. Single winner per entry: the
    /// status flips to `called` inside this call, so a concurrent caller
    /// either gets the next waiting entry or nothing.
    pub fn call_next(&mut self, now: DateTime<Utc>) -> Option<QueueEntry> {
        let next_id = self
            .entries
            .iter()
            .filter(|e| e.status == QueueEntryStatus::Waiting)
            .min_by_key(|e| e.position)?
            .id;
        self.apply_status(next_id, QueueEntryStatus::Called, now).ok()
    }

    /// Validated status change; `Conflict` when the transition is not in the
    /// table, so stale callers can tell "already handled" from "succeeded".
    pub fn apply_status(
        &mut self,
        entry_id: Uuid,
        next: QueueEntryStatus,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry, StoreError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| StoreError::NotFound(format!("queue entry {}", entry_id)))?;

        if !entry.status.can_transition_to(&next) {
            return Err(StoreError::Conflict(format!(
                "queue entry cannot move from {} to {}",
                entry.status, next
            )));
        }

        entry.status = next;
        if next == QueueEntryStatus::Called {
            entry.called_at = Some(now);
        }
        Ok(entry.clone())
    }

    /// Recompute dense positions over the active set. Returns the entries
    /// whose position changed, with their previous position, so the caller
    /// can notify patients who moved up.
    pub fn resequence(&mut self) -> Vec<PositionChange> {
        let mut order: Vec<(u8, DateTime<Utc>, u32, Uuid)> = self
            .entries
            .iter()
            .filter(|e| e.is_active())
            .map(|e| (e.priority.band(), e.joined_at, e.queue_number, e.id))
            .collect();
        order.sort();

        let mut changes = Vec::new();
        for (index, (_, _, _, id)) in order.iter().enumerate() {
            let new_position = (index + 1) as u32;
            let entry = self
                .entries
                .iter_mut()
                .find(|e| e.id == *id)
                .expect("active entry present during resequence");
            if entry.position != new_position {
                let old_position = entry.position;
                entry.position = new_position;
                changes.push(PositionChange { entry: entry.clone(), old_position });
            }
        }

        // Terminal entries keep no position.
        for entry in self.entries.iter_mut().filter(|e| e.status.is_terminal()) {
            entry.position = 0;
        }
        changes
    }

    fn update(&mut self, updated: &QueueEntry) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == updated.id) {
            *entry = updated.clone();
        }
    }
}
