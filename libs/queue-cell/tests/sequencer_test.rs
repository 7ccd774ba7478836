use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use uuid::Uuid;

use appointment_cell::services::AppointmentStatusMachine;
use notification_cell::{FailingNotificationSink, QueueNotification, RecordingNotificationSink};
use queue_cell::models::{JoinQueueRequest, QueueError};
use queue_cell::services::QueueSequencer;
use shared_config::AppConfig;
use shared_database::MemoryDatabase;
use shared_models::{
    Appointment, AppointmentStatus, QueueEntryStatus, QueuePriority,
};

struct TestStack {
    db: Arc<MemoryDatabase>,
    sequencer: Arc<QueueSequencer>,
    sink: Arc<RecordingNotificationSink>,
}

fn setup() -> TestStack {
    let db = Arc::new(MemoryDatabase::new());
    let sink = Arc::new(RecordingNotificationSink::new());
    let machine = Arc::new(AppointmentStatusMachine::new(db.clone()));
    let sequencer = Arc::new(QueueSequencer::new(
        db.clone(),
        machine,
        sink.clone(),
        AppConfig::default(),
    ));
    TestStack { db, sequencer, sink }
}

fn join_request(org_id: Uuid, doctor_id: Uuid, priority: QueuePriority) -> JoinQueueRequest {
    JoinQueueRequest {
        org_id,
        doctor_id,
        patient_id: Uuid::new_v4(),
        service_id: Uuid::new_v4(),
        priority,
        appointment_id: None,
    }
}

async fn settle_notifications() {
    // Notification dispatch is fire-and-forget on spawned tasks.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn join_assigns_position_and_default_estimate() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    let first = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();
    let second = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();

    assert_eq!(first.position, 1);
    assert_eq!(first.estimated_wait_minutes, 0);
    assert_eq!(second.position, 2);
    // No service history yet: one patient ahead at the default estimate.
    assert_eq!(second.estimated_wait_minutes, 15);
}

#[tokio::test]
async fn duplicate_join_same_day_is_rejected() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let mut request = join_request(org_id, doctor_id, QueuePriority::Normal);

    stack.sequencer.join(request.clone()).await.unwrap();
    request.priority = QueuePriority::Urgent;
    let err = stack.sequencer.join(request).await.unwrap_err();
    assert_matches!(err, QueueError::DuplicateEntry);
}

#[tokio::test]
async fn priority_bands_order_the_queue() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();
    stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();
    let emergency = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Emergency))
        .await
        .unwrap();
    let urgent = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Urgent))
        .await
        .unwrap();

    let queue = stack.sequencer.current_queue(org_id, doctor_id).await;
    assert_eq!(queue.len(), 4);
    assert_eq!(queue[0].id, emergency.id);
    assert_eq!(queue[1].id, urgent.id);
    let positions: Vec<u32> = queue.iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn call_next_claims_lowest_position_and_notifies() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    let first = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();
    stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();

    let called = stack.sequencer.call_next(org_id, doctor_id).await.unwrap();
    assert_eq!(called.id, first.id);
    assert_eq!(called.status, QueueEntryStatus::Called);

    settle_notifications().await;
    let sent = stack.sink.sent().await;
    assert!(sent.iter().any(|n| matches!(
        n,
        QueueNotification::Called { patient_id, .. } if *patient_id == first.patient_id
    )));
}

#[tokio::test]
async fn call_next_on_empty_queue_is_not_found() {
    let stack = setup();
    let err = stack
        .sequencer
        .call_next(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::NotFound(_));
}

#[tokio::test]
async fn call_next_moves_linked_appointment_in_progress() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    let appointment = Appointment {
        id: Uuid::new_v4(),
        org_id,
        patient_id: Uuid::new_v4(),
        doctor_id,
        service_id: Uuid::new_v4(),
        scheduled_at: Utc::now(),
        price: 80_000,
        status: AppointmentStatus::Scheduled,
        is_paid: false,
        notes: None,
    };
    stack.db.insert_appointment(appointment.clone()).await.unwrap();

    let mut request = join_request(org_id, doctor_id, QueuePriority::Normal);
    request.patient_id = appointment.patient_id;
    request.appointment_id = Some(appointment.id);
    stack.sequencer.join(request).await.unwrap();

    stack.sequencer.call_next(org_id, doctor_id).await.unwrap();

    let stored = stack.db.appointment(appointment.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::InProgress);
}

#[tokio::test]
async fn concurrent_call_next_has_one_winner_per_entry() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    for _ in 0..3 {
        stack
            .sequencer
            .join(join_request(org_id, doctor_id, QueuePriority::Normal))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..6 {
        let sequencer = stack.sequencer.clone();
        handles.push(tokio::spawn(async move {
            sequencer.call_next(org_id, doctor_id).await
        }));
    }

    let results = futures::future::join_all(handles).await;
    let mut called_ids = Vec::new();
    let mut not_found = 0;
    for result in results {
        match result.unwrap() {
            Ok(entry) => called_ids.push(entry.id),
            Err(QueueError::NotFound(_)) => not_found += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    called_ids.sort();
    called_ids.dedup();
    assert_eq!(called_ids.len(), 3, "each entry called exactly once");
    assert_eq!(not_found, 3);
}

#[tokio::test]
async fn complete_compacts_positions_and_notifies_approaching() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    let mut entries = Vec::new();
    for _ in 0..5 {
        entries.push(
            stack
                .sequencer
                .join(join_request(org_id, doctor_id, QueuePriority::Normal))
                .await
                .unwrap(),
        );
    }

    let called = stack.sequencer.call_next(org_id, doctor_id).await.unwrap();
    let completed = stack.sequencer.complete(called.id).await.unwrap();
    assert_eq!(completed.status, QueueEntryStatus::Completed);

    let queue = stack.sequencer.current_queue(org_id, doctor_id).await;
    let positions: Vec<u32> = queue.iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![1, 2, 3, 4]);

    settle_notifications().await;
    let sent = stack.sink.sent().await;
    assert!(sent.iter().any(|n| matches!(
        n,
        QueueNotification::Completed { patient_id, .. } if *patient_id == called.patient_id
    )));
    // Positions 1-3 moved up within the threshold.
    let approaching = sent
        .iter()
        .filter(|n| matches!(n, QueueNotification::Approaching { .. }))
        .count();
    assert_eq!(approaching, 3);
}

#[tokio::test]
async fn terminal_entries_reject_further_mutation() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    let entry = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();
    stack.sequencer.call_next(org_id, doctor_id).await.unwrap();
    stack.sequencer.complete(entry.id).await.unwrap();

    let err = stack.sequencer.complete(entry.id).await.unwrap_err();
    assert_matches!(err, QueueError::InvalidTransition(_));
    let err = stack.sequencer.skip(entry.id).await.unwrap_err();
    assert_matches!(err, QueueError::InvalidTransition(_));
}

#[tokio::test]
async fn skip_removes_waiting_entry_from_active_set() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    let first = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();
    let second = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();

    stack.sequencer.skip(first.id).await.unwrap();

    let queue = stack.sequencer.current_queue(org_id, doctor_id).await;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, second.id);
    assert_eq!(queue[0].position, 1);
}

#[tokio::test]
async fn start_service_requires_called_status() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    let entry = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();

    let err = stack.sequencer.start_service(entry.id).await.unwrap_err();
    assert_matches!(err, QueueError::InvalidTransition(_));

    stack.sequencer.call_next(org_id, doctor_id).await.unwrap();
    let started = stack.sequencer.start_service(entry.id).await.unwrap();
    assert_eq!(started.status, QueueEntryStatus::InService);
    stack.sequencer.complete(entry.id).await.unwrap();
}

#[tokio::test]
async fn wait_estimate_uses_rolling_average_with_floor() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    // One completed service; the near-zero duration clamps to the 5 minute
    // floor instead of the 15 minute default.
    let entry = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();
    stack.sequencer.call_next(org_id, doctor_id).await.unwrap();
    stack.sequencer.complete(entry.id).await.unwrap();

    stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();
    let second = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();
    assert_eq!(second.estimated_wait_minutes, 5);
}

#[tokio::test]
async fn my_queue_reports_place_and_estimate() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();
    let mine = stack
        .sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();

    let status = stack.sequencer.my_queue(org_id, mine.patient_id).await.unwrap();
    assert_eq!(status.queue.id, mine.id);
    assert_eq!(status.doctor, doctor_id);
    assert_eq!(status.estimated_time, 15);
    assert!(status.wait_time >= 0);

    let err = stack.sequencer.my_queue(org_id, Uuid::new_v4()).await.unwrap_err();
    assert_matches!(err, QueueError::NotFound(_));
}

#[tokio::test]
async fn failing_sink_never_surfaces_to_queue_callers() {
    let db = Arc::new(MemoryDatabase::new());
    let machine = Arc::new(AppointmentStatusMachine::new(db.clone()));
    let sequencer = Arc::new(QueueSequencer::new(
        db,
        machine,
        Arc::new(FailingNotificationSink),
        AppConfig::default(),
    ));
    let org_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    let first = sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();
    let second = sequencer
        .join(join_request(org_id, doctor_id, QueuePriority::Normal))
        .await
        .unwrap();

    let called = sequencer.call_next(org_id, doctor_id).await.unwrap();
    assert_eq!(called.id, first.id);
    assert_eq!(called.status, QueueEntryStatus::Called);

    let completed = sequencer.complete(first.id).await.unwrap();
    assert_eq!(completed.status, QueueEntryStatus::Completed);
    settle_notifications().await;

    // Delivery failures end as logs; the queue state is untouched by them.
    let queue = sequencer.current_queue(org_id, doctor_id).await;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, second.id);
    assert_eq!(queue[0].position, 1);
}

#[tokio::test]
async fn queues_are_isolated_per_doctor() {
    let stack = setup();
    let org_id = Uuid::new_v4();
    let doctor_a = Uuid::new_v4();
    let doctor_b = Uuid::new_v4();

    stack
        .sequencer
        .join(join_request(org_id, doctor_a, QueuePriority::Normal))
        .await
        .unwrap();
    let b_entry = stack
        .sequencer
        .join(join_request(org_id, doctor_b, QueuePriority::Normal))
        .await
        .unwrap();

    assert_eq!(b_entry.position, 1);
    assert_eq!(stack.sequencer.current_queue(org_id, doctor_a).await.len(), 1);
    assert_eq!(stack.sequencer.current_queue(org_id, doctor_b).await.len(), 1);
}
