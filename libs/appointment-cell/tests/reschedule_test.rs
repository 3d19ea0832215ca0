mod common;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDateTime};

use appointment_cell::models::*;
use schedule_cell::models::SessionType;
use shared_utils::test_utils::TestUser;

use common::{monday, Event, Harness};

fn monday_at(hour: u32, minute: u32) -> NaiveDateTime {
    monday().and_hms_opt(hour, minute, 0).unwrap()
}

#[tokio::test]
async fn cancellation_needs_two_hours_notice() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("14:00", "14:30").await;

    harness.clock.set(monday_at(12, 1));
    let late = harness.ctx.changes().cancel_appointment(appointment.id, harness.patient.uuid()).await;
    assert_matches!(late, Err(AppointmentError::TooLate(msg)) if msg.contains("less than 2 hours away"));

    harness.clock.set(monday_at(11, 59));
    let cancelled = harness.ctx.changes()
        .cancel_appointment(appointment.id, harness.patient.uuid())
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    let events = harness.notifier.wait_for(2).await;
    assert!(events.contains(&Event::Cancelled(appointment.id)));
}

#[tokio::test]
async fn patient_reschedule_needs_two_hours_notice() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("14:00", "14:30").await;
    let request = harness.reschedule_to(monday(), "16:00", "16:30");

    harness.clock.set(monday_at(12, 30));
    let late = harness.ctx.changes()
        .reschedule_appointment(appointment.id, &harness.patient.to_user(), request.clone())
        .await;
    assert_matches!(late, Err(AppointmentError::TooLate(_)));

    harness.clock.set(monday_at(11, 59));
    let moved = harness.ctx.changes()
        .reschedule_appointment(appointment.id, &harness.patient.to_user(), request)
        .await
        .unwrap();
    assert_eq!(moved.start_time, "16:00");
}

#[tokio::test]
async fn only_the_owner_can_cancel() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("09:00", "10:00").await;
    let stranger = TestUser::patient("stranger@example.com");

    let result = harness.ctx.changes().cancel_appointment(appointment.id, stranger.uuid()).await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn cancelled_appointments_stay_cancelled() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("09:00", "10:00").await;
    let changes = harness.ctx.changes();

    changes.cancel_appointment(appointment.id, harness.patient.uuid()).await.unwrap();

    assert_matches!(
        changes.cancel_appointment(appointment.id, harness.patient.uuid()).await,
        Err(AppointmentError::Validation(msg)) if msg.contains("cancelled")
    );
    assert_matches!(
        changes.reschedule_appointment(
            appointment.id,
            &harness.patient.to_user(),
            harness.reschedule_to(monday(), "11:00", "12:00"),
        ).await,
        Err(AppointmentError::Validation(_))
    );
}

#[tokio::test]
async fn rescheduling_onto_its_own_slot_is_not_a_conflict() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("09:00", "10:00").await;

    let same = harness.ctx.changes()
        .reschedule_appointment(
            appointment.id,
            &harness.patient.to_user(),
            harness.reschedule_to(monday(), "09:00", "10:00"),
        )
        .await
        .unwrap();

    assert_eq!(same.id, appointment.id);
    assert!(same.rescheduled_at.is_some());
    assert_eq!(same.reschedule_reason.as_deref(), Some("Clashes with work"));
}

#[tokio::test]
async fn rescheduling_into_a_taken_slot_conflicts() {
    let harness = Harness::new();
    let mine = harness.book_as_patient("09:00", "10:00").await;

    let other = TestUser::patient("other@example.com");
    harness.ctx.booking()
        .book_appointment(other.uuid(), harness.booking_request("10:00", "11:00"))
        .await
        .unwrap();

    let result = harness.ctx.changes()
        .reschedule_appointment(mine.id, &harness.patient.to_user(), harness.reschedule_to(monday(), "10:00", "11:00"))
        .await;
    assert_matches!(result, Err(AppointmentError::Conflict));
}

#[tokio::test]
async fn rescheduling_frees_the_old_slot() {
    let harness = Harness::new();
    harness.publish_monday(vec![
        schedule_cell::models::ScheduleSlot::new("09:00", "10:00", SessionType::MorningConsultations),
        schedule_cell::models::ScheduleSlot::new("10:00", "11:00", SessionType::MorningConsultations),
    ]).await;
    let appointment = harness.book_as_patient("09:00", "10:00").await;

    let moved = harness.ctx.changes()
        .reschedule_appointment(appointment.id, &harness.patient.to_user(), harness.reschedule_to(monday(), "10:00", "11:00"))
        .await
        .unwrap();

    let day = harness.ctx.resolver().get_available_slots(harness.doctor.uuid(), monday()).await.unwrap();
    let day = day.day().unwrap();
    assert!(day.find_slot("09:00", "10:00").unwrap().is_available);
    assert!(!day.find_slot("10:00", "11:00").unwrap().is_available);

    let events = harness.notifier.wait_for(2).await;
    assert!(events.contains(&Event::Rescheduled(moved.id)));
}

#[tokio::test]
async fn patient_reschedule_resets_status_and_rederives_session() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("09:00", "10:00").await;
    harness.ctx.changes().confirm_appointment(appointment.id, &harness.doctor.to_user()).await.unwrap();

    let moved = harness.ctx.changes()
        .reschedule_appointment(appointment.id, &harness.patient.to_user(), harness.reschedule_to(monday(), "18:00", "18:30"))
        .await
        .unwrap();

    assert_eq!(moved.status, AppointmentStatus::Scheduled);
    assert_eq!(moved.session_type, SessionType::EveningConsultations);
}

#[tokio::test]
async fn doctor_reschedule_keeps_status_and_uses_clinic_hours() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("09:00", "10:00").await;
    let doctor = harness.doctor.to_user();
    harness.ctx.changes().confirm_appointment(appointment.id, &doctor).await.unwrap();

    let moved = harness.ctx.changes()
        .reschedule_appointment(appointment.id, &doctor, harness.reschedule_to(monday(), "15:30", "16:00"))
        .await
        .unwrap();

    assert_eq!(moved.status, AppointmentStatus::Confirmed);
    assert_eq!(moved.session_type, SessionType::ExtendedAfternoon);

    let mut explicit = harness.reschedule_to(monday(), "20:30", "21:00");
    explicit.session_type = Some(SessionType::Surgery);
    let moved = harness.ctx.changes()
        .reschedule_appointment(appointment.id, &doctor, explicit)
        .await
        .unwrap();
    assert_eq!(moved.session_type, SessionType::Surgery);
}

#[tokio::test]
async fn doctors_can_move_appointments_inside_the_patient_window() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("14:00", "14:30").await;

    harness.clock.set(monday_at(13, 30));
    let moved = harness.ctx.changes()
        .reschedule_appointment(appointment.id, &harness.doctor.to_user(), harness.reschedule_to(monday(), "16:00", "16:30"))
        .await
        .unwrap();
    assert_eq!(moved.start_time, "16:00");
}

#[tokio::test]
async fn doctors_cannot_edit_today_after_five_pm() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("18:00", "18:30").await;

    harness.clock.set(monday_at(17, 0));
    let result = harness.ctx.changes()
        .reschedule_appointment(appointment.id, &harness.doctor.to_user(), harness.reschedule_to(monday() + Duration::days(1), "09:00", "09:30"))
        .await;
    assert_matches!(result, Err(AppointmentError::TooLate(msg)) if msg.contains("after 5 PM"));
}

#[tokio::test]
async fn doctors_cannot_edit_past_days() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("09:00", "09:30").await;

    harness.clock.set(monday_at(9, 0) + Duration::days(1));
    let result = harness.ctx.changes()
        .reschedule_appointment(appointment.id, &harness.doctor.to_user(), harness.reschedule_to(monday() + Duration::days(2), "09:00", "09:30"))
        .await;
    assert_matches!(result, Err(AppointmentError::TooLate(_)));
}

#[tokio::test]
async fn unrelated_actors_see_not_found() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("09:00", "10:00").await;
    let request = harness.reschedule_to(monday(), "11:00", "12:00");

    for actor in [
        TestUser::doctor("other-doc@example.com"),
        TestUser::patient("other-patient@example.com"),
        TestUser::new("pharmacy@example.com", shared_models::auth::Role::Pharmacist),
    ] {
        let result = harness.ctx.changes()
            .reschedule_appointment(appointment.id, &actor.to_user(), request.clone())
            .await;
        assert_matches!(result, Err(AppointmentError::NotFound));
    }
}

#[tokio::test]
async fn confirm_then_complete() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("09:00", "10:00").await;
    let changes = harness.ctx.changes();

    assert_matches!(
        changes.confirm_appointment(appointment.id, &harness.patient.to_user()).await,
        Err(AppointmentError::NotFound)
    );

    let confirmed = changes.confirm_appointment(appointment.id, &harness.doctor.to_user()).await.unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let completed = changes.complete_appointment(appointment.id, &harness.doctor.to_user()).await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    assert_matches!(
        changes.confirm_appointment(appointment.id, &harness.doctor.to_user()).await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn completing_requires_confirmation_first() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("09:00", "10:00").await;
    let changes = harness.ctx.changes();

    assert_matches!(
        changes.complete_appointment(appointment.id, &harness.doctor.to_user()).await,
        Err(AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Scheduled,
            to: AppointmentStatus::Completed,
        })
    );

    let stored = harness.ctx.booking()
        .get_appointment(appointment.id, &harness.doctor.to_user())
        .await
        .unwrap();
    assert_eq!(stored.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn cancelled_appointments_cannot_be_confirmed_or_completed() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("09:00", "10:00").await;
    let changes = harness.ctx.changes();

    changes.cancel_appointment(appointment.id, harness.patient.uuid()).await.unwrap();

    assert_matches!(
        changes.confirm_appointment(appointment.id, &harness.doctor.to_user()).await,
        Err(AppointmentError::InvalidStatusTransition { from: AppointmentStatus::Cancelled, .. })
    );
    assert_matches!(
        changes.complete_appointment(appointment.id, &harness.doctor.to_user()).await,
        Err(AppointmentError::InvalidStatusTransition { from: AppointmentStatus::Cancelled, .. })
    );
}

#[tokio::test]
async fn subject_ids_match_regardless_of_case() {
    let harness = Harness::new();
    let appointment = harness.book_as_patient("09:00", "10:00").await;

    let mut doctor = harness.doctor.to_user();
    doctor.id = doctor.id.to_uppercase();
    let mut patient = harness.patient.to_user();
    patient.id = patient.id.to_uppercase();

    let seen = harness.ctx.booking().get_appointment(appointment.id, &patient).await.unwrap();
    assert_eq!(seen.id, appointment.id);

    let moved = harness.ctx.changes()
        .reschedule_appointment(appointment.id, &patient, harness.reschedule_to(monday(), "11:00", "12:00"))
        .await
        .unwrap();
    assert_eq!(moved.start_time, "11:00");

    let confirmed = harness.ctx.changes().confirm_appointment(appointment.id, &doctor).await.unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn notice_window_follows_configured_rules() {
    let mut harness = Harness::new();
    harness.ctx = harness.ctx.with_rules(AppointmentValidationRules {
        min_change_notice_minutes: 30,
        ..AppointmentValidationRules::default()
    });

    let early = harness.book_as_patient("14:00", "14:30").await;
    let late = harness.book_as_patient("15:00", "15:30").await;
    let changes = harness.ctx.changes();

    harness.clock.set(monday_at(13, 30));
    let cancelled = changes.cancel_appointment(early.id, harness.patient.uuid()).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    harness.clock.set(monday_at(14, 31));
    assert_matches!(
        changes.cancel_appointment(late.id, harness.patient.uuid()).await,
        Err(AppointmentError::TooLate(_))
    );
}
