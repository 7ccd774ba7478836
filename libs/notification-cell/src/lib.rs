// libs/notification-cell/src/lib.rs
//
// Delivery transport (SMS, Telegram, push) is an external concern; this cell
// only defines the sink seam the queue engine talks to, plus a tracing-backed
// sink for local runs and a recording sink for tests.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Events the queue engine emits toward patients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueNotification {
    /// The patient has been called in to the doctor.
    Called {
        org_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
        queue_number: u32,
    },
    /// The patient's turn is near after the queue moved.
    Approaching {
        org_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
        queue_number: u32,
        position: u32,
    },
    /// The patient's visit is done.
    Completed {
        org_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
        queue_number: u32,
    },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: QueueNotification) -> Result<()>;
}

/// Logs every notification; the default sink when no transport is wired.
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, notification: QueueNotification) -> Result<()> {
        info!("Queue notification: {:?}", notification);
        Ok(())
    }
}

/// Test double that records everything it receives.
#[derive(Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<QueueNotification>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<QueueNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, notification: QueueNotification) -> Result<()> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}

/// Test double that refuses every delivery, for exercising a broken
/// transport.
pub struct FailingNotificationSink;

#[async_trait]
impl NotificationSink for FailingNotificationSink {
    async fn notify(&self, notification: QueueNotification) -> Result<()> {
        anyhow::bail!("transport refused {:?}", notification)
    }
}

/// Fire-and-forget dispatch. Queue and commission mutations never block on or
/// fail because of a notification, so failures end as warn logs.
pub fn dispatch(sink: Arc<dyn NotificationSink>, notification: QueueNotification) {
    tokio::spawn(async move {
        if let Err(e) = sink.notify(notification).await {
            warn!("Notification delivery failed: {}", e);
        }
    });
}
