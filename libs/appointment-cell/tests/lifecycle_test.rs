use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Utc;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, CreateAppointmentRequest};
use appointment_cell::services::AppointmentStatusMachine;
use shared_database::MemoryDatabase;
use shared_models::{Appointment, AppointmentStatus};

fn setup() -> (Arc<MemoryDatabase>, AppointmentStatusMachine) {
    let db = Arc::new(MemoryDatabase::new());
    let machine = AppointmentStatusMachine::new(db.clone());
    (db, machine)
}

async fn seed(db: &MemoryDatabase, status: AppointmentStatus) -> Appointment {
    let appointment = Appointment {
        id: Uuid::new_v4(),
        org_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        service_id: Uuid::new_v4(),
        scheduled_at: Utc::now(),
        price: 50_000,
        status,
        is_paid: false,
        notes: None,
    };
    db.insert_appointment(appointment.clone()).await.unwrap()
}

const ALL: [AppointmentStatus; 4] = [
    AppointmentStatus::Scheduled,
    AppointmentStatus::InProgress,
    AppointmentStatus::Completed,
    AppointmentStatus::Cancelled,
];

#[test]
fn transition_table_matches_the_lifecycle() {
    use AppointmentStatus::*;

    for from in ALL {
        for to in ALL {
            let allowed = matches!(
                (from, to),
                (Scheduled, InProgress)
                    | (Scheduled, Cancelled)
                    | (InProgress, Completed)
                    | (InProgress, Cancelled)
            );
            let result = AppointmentStatusMachine::validate_transition(&from, &to);
            assert_eq!(
                result.is_ok(),
                allowed,
                "transition {} -> {} should be {}",
                from,
                to,
                if allowed { "allowed" } else { "rejected" }
            );
        }
    }
}

#[tokio::test]
async fn transition_applies_and_persists() {
    let (db, machine) = setup();
    let appointment = seed(&db, AppointmentStatus::Scheduled).await;

    let updated = machine
        .transition(appointment.id, AppointmentStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(updated.status, AppointmentStatus::InProgress);

    let stored = db.appointment(appointment.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::InProgress);
}

#[tokio::test]
async fn completed_appointment_cannot_be_reopened_or_cancelled() {
    let (db, machine) = setup();
    let appointment = seed(&db, AppointmentStatus::Completed).await;

    let err = machine
        .transition(appointment.id, AppointmentStatus::Scheduled)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::InvalidTransition { .. });

    let err = machine
        .transition(appointment.id, AppointmentStatus::Cancelled)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::InvalidTransition { .. });

    // State unchanged after the rejections.
    let stored = db.appointment(appointment.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn cancellation_is_allowed_until_completion() {
    let (db, machine) = setup();

    let scheduled = seed(&db, AppointmentStatus::Scheduled).await;
    let cancelled = machine
        .transition(scheduled.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    let in_progress = seed(&db, AppointmentStatus::InProgress).await;
    let cancelled = machine
        .transition(in_progress.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn missing_appointment_is_not_found() {
    let (_db, machine) = setup();
    let err = machine
        .transition(Uuid::new_v4(), AppointmentStatus::InProgress)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::NotFound);
}

#[tokio::test]
async fn created_appointments_start_scheduled() {
    let (db, machine) = setup();
    let created = machine
        .create(CreateAppointmentRequest {
            org_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            scheduled_at: Utc::now(),
            price: 120_000,
            notes: Some("walk-in follow-up".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(created.status, AppointmentStatus::Scheduled);
    assert!(!created.is_paid);
    let stored = db.appointment(created.id).await.unwrap();
    assert_eq!(stored.price, 120_000);
}
