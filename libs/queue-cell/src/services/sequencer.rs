// libs/queue-cell/src/services/sequencer.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::services::AppointmentStatusMachine;
use notification_cell::{dispatch, NotificationSink, QueueNotification};
use shared_config::AppConfig;
use shared_database::{MemoryDatabase, PositionChange, QueueKey, StoreError};
use shared_models::{AppointmentStatus, QueueEntry, QueueEntryStatus};

use crate::models::{JoinQueueRequest, MyQueueStatus, QueueError};

/// Assigns and maintains per-doctor, per-day queue positions, estimates wait
/// time, and drives queue entry status changes. All mutation for one doctor's
/// day happens under that queue's mutex, so position assignment and
/// compaction serialize without a global lock.
pub struct QueueSequencer {
    db: Arc<MemoryDatabase>,
    machine: Arc<AppointmentStatusMachine>,
    sink: Arc<dyn NotificationSink>,
    config: AppConfig,
}

impl QueueSequencer {
    pub fn new(
        db: Arc<MemoryDatabase>,
        machine: Arc<AppointmentStatusMachine>,
        sink: Arc<dyn NotificationSink>,
        config: AppConfig,
    ) -> Self {
        Self { db, machine, sink, config }
    }

    /// Add a walk-in patient to a doctor's queue for today.
    pub async fn join(&self, request: JoinQueueRequest) -> Result<QueueEntry, QueueError> {
        let now = Utc::now();
        let key = QueueKey::new(request.org_id, request.doctor_id, now.date_naive());
        let avg = self.average_service_minutes(request.org_id, request.doctor_id).await;

        let entry = QueueEntry {
            id: Uuid::new_v4(),
            org_id: request.org_id,
            doctor_id: request.doctor_id,
            patient_id: request.patient_id,
            appointment_id: request.appointment_id,
            service_id: request.service_id,
            priority: request.priority,
            position: 0,
            queue_number: 0,
            status: QueueEntryStatus::Waiting,
            joined_at: now,
            called_at: None,
            estimated_wait_minutes: 0,
        };

        let queue = self.db.doctor_queue(key).await;
        let stored = {
            let mut queue = queue.lock().await;
            queue.join(entry, avg).map_err(|e| match e {
                StoreError::Conflict(_) => QueueError::DuplicateEntry,
                StoreError::NotFound(msg) => QueueError::DatabaseError(msg),
            })?
        };
        self.db.index_queue_entry(stored.id, key).await;

        info!(
            "Patient {} joined queue of doctor {} as number {} (position {}, {})",
            stored.patient_id, stored.doctor_id, stored.queue_number, stored.position,
            stored.priority
        );
        Ok(stored)
    }

    /// Call in the next waiting patient. Exactly one caller wins each entry:
    /// the waiting-to-called flip happens under the queue mutex, so a
    /// concurrent call either claims a later entry or gets `NotFound`.
    pub async fn call_next(&self, org_id: Uuid, doctor_id: Uuid) -> Result<QueueEntry, QueueError> {
        let now = Utc::now();
        let key = QueueKey::new(org_id, doctor_id, now.date_naive());

        let queue = self.db.doctor_queue(key).await;
        let called = {
            let mut queue = queue.lock().await;
            queue
                .call_next(now)
                .ok_or_else(|| QueueError::NotFound("no waiting patients".to_string()))?
        };

        // The call stands even if the linked appointment was already handled
        // elsewhere; a failed transition is logged, not propagated.
        if let Some(appointment_id) = called.appointment_id {
            if let Err(e) = self.machine.transition(appointment_id, AppointmentStatus::InProgress).await
            {
                warn!(
                    "Appointment {} not moved to in_progress for called entry {}: {}",
                    appointment_id, called.id, e
                );
            }
        }

        dispatch(
            self.sink.clone(),
            QueueNotification::Called {
                org_id,
                doctor_id,
                patient_id: called.patient_id,
                queue_number: called.queue_number,
            },
        );

        info!("Called queue number {} for doctor {}", called.queue_number, doctor_id);
        Ok(called)
    }

    /// Mark a called patient as in service.
    pub async fn start_service(&self, entry_id: Uuid) -> Result<QueueEntry, QueueError> {
        let key = self.key_for(entry_id).await?;
        let queue = self.db.doctor_queue(key).await;
        let mut queue = queue.lock().await;
        queue
            .apply_status(entry_id, QueueEntryStatus::InService, Utc::now())
            .map_err(map_queue_store)
    }

    /// Finish a visit: terminal status, duration sample, compaction, and
    /// "approaching" notifications for patients who moved up.
    pub async fn complete(&self, entry_id: Uuid) -> Result<QueueEntry, QueueError> {
        let now = Utc::now();
        let key = self.key_for(entry_id).await?;
        let queue = self.db.doctor_queue(key).await;

        let (completed, changes) = {
            let mut queue = queue.lock().await;
            let completed = queue
                .apply_status(entry_id, QueueEntryStatus::Completed, now)
                .map_err(map_queue_store)?;
            let changes = queue.resequence();
            (completed, changes)
        };

        if let Some(called_at) = completed.called_at {
            let minutes = (now - called_at).num_minutes().max(1);
            self.db
                .record_service_duration(
                    completed.org_id,
                    completed.doctor_id,
                    minutes,
                    self.config.service_average_window,
                )
                .await;
            debug!("Recorded {}min service for doctor {}", minutes, completed.doctor_id);
        }

        dispatch(
            self.sink.clone(),
            QueueNotification::Completed {
                org_id: completed.org_id,
                doctor_id: completed.doctor_id,
                patient_id: completed.patient_id,
                queue_number: completed.queue_number,
            },
        );
        self.notify_approaching(changes);

        Ok(completed)
    }

    /// Remove a no-show or deferred patient from the active set.
    pub async fn skip(&self, entry_id: Uuid) -> Result<QueueEntry, QueueError> {
        let now = Utc::now();
        let key = self.key_for(entry_id).await?;
        let queue = self.db.doctor_queue(key).await;

        let (skipped, changes) = {
            let mut queue = queue.lock().await;
            let skipped = queue
                .apply_status(entry_id, QueueEntryStatus::Skipped, now)
                .map_err(map_queue_store)?;
            let changes = queue.resequence();
            (skipped, changes)
        };

        info!("Skipped queue number {} for doctor {}", skipped.queue_number, skipped.doctor_id);
        self.notify_approaching(changes);
        Ok(skipped)
    }

    /// Active entries for a doctor today, in position order, with wait
    /// estimates recomputed against the current rolling average.
    pub async fn current_queue(&self, org_id: Uuid, doctor_id: Uuid) -> Vec<QueueEntry> {
        let key = QueueKey::new(org_id, doctor_id, Utc::now().date_naive());
        let avg = self.average_service_minutes(org_id, doctor_id).await;

        let queue = self.db.doctor_queue(key).await;
        let mut active = { queue.lock().await.active() };
        for entry in active.iter_mut() {
            entry.estimated_wait_minutes = i64::from(entry.position.saturating_sub(1)) * avg;
        }
        active
    }

    /// The patient's own active entry today, across the org's doctors.
    pub async fn my_queue(&self, org_id: Uuid, patient_id: Uuid) -> Result<MyQueueStatus, QueueError> {
        let now = Utc::now();
        for key in self.db.queue_keys_for_day(org_id, now.date_naive()).await {
            let queue = self.db.doctor_queue(key).await;
            let found = { queue.lock().await.active_entry_for_patient(patient_id) };
            if let Some(mut entry) = found {
                let avg = self.average_service_minutes(org_id, entry.doctor_id).await;
                let estimated = i64::from(entry.position.saturating_sub(1)) * avg;
                entry.estimated_wait_minutes = estimated;
                return Ok(MyQueueStatus {
                    doctor: entry.doctor_id,
                    estimated_time: estimated,
                    wait_time: (now - entry.joined_at).num_minutes().max(0),
                    queue: entry,
                });
            }
        }
        Err(QueueError::NotFound("no active queue entry today".to_string()))
    }

    /// Rolling average over the doctor's recent completions, floored, with a
    /// configured default when there is no history yet.
    async fn average_service_minutes(&self, org_id: Uuid, doctor_id: Uuid) -> i64 {
        self.db
            .average_service_minutes(org_id, doctor_id)
            .await
            .map(|m| m.max(self.config.min_service_minutes))
            .unwrap_or(self.config.default_service_minutes)
    }

    async fn key_for(&self, entry_id: Uuid) -> Result<QueueKey, QueueError> {
        self.db
            .queue_key_for_entry(entry_id)
            .await
            .ok_or_else(|| QueueError::NotFound(format!("queue entry {}", entry_id)))
    }

    fn notify_approaching(&self, changes: Vec<PositionChange>) {
        for change in changes {
            let entry = change.entry;
            let moved_up = entry.position < change.old_position;
            if !moved_up || entry.position > self.config.approaching_threshold {
                continue;
            }
            if entry.status != QueueEntryStatus::Waiting {
                continue;
            }
            dispatch(
                self.sink.clone(),
                QueueNotification::Approaching {
                    org_id: entry.org_id,
                    doctor_id: entry.doctor_id,
                    patient_id: entry.patient_id,
                    queue_number: entry.queue_number,
                    position: entry.position,
                },
            );
        }
    }
}

fn map_queue_store(e: StoreError) -> QueueError {
    match e {
        StoreError::NotFound(msg) => QueueError::NotFound(msg),
        StoreError::Conflict(msg) => QueueError::InvalidTransition(msg),
    }
}
