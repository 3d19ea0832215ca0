use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use schedule_cell::models::{SessionType, Weekday};
use schedule_cell::services::{ScheduleStore, SupabaseScheduleStore};
use shared_database::StoreError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

#[tokio::test]
async fn active_schedules_are_read_newest_first() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default().with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();
    let newest = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/weekly_schedules"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("status", "eq.active"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::weekly_schedule_row(
                newest, doctor_id, "2026-03-02", "2026-03-08",
                json!([{ "start_time": "09:00", "end_time": "12:00", "session_type": "Morning Consultations" }]),
                "2026-02-20T10:00:00Z",
            ),
            MockSupabaseResponses::weekly_schedule_row(
                Uuid::new_v4(), doctor_id, "2026-03-02", "2026-03-08",
                json!([{ "start_time": "11:00", "end_time": "11:00", "session_type": "DayOff" }]),
                "2026-02-10T10:00:00Z",
            ),
        ])))
        .mount(&mock_server)
        .await;

    let store = SupabaseScheduleStore::new(&config);
    let active = store.find_active_for_doctor(doctor_id).await.unwrap();

    assert_eq!(active.len(), 2);
    assert_eq!(active[0].id, newest);
    assert_eq!(active[0].slots_for(Weekday::Monday)[0].session_type, SessionType::MorningConsultations);
    assert!(active[0].slots_for(Weekday::Monday)[0].is_available);
    assert_eq!(active[1].slots_for(Weekday::Monday)[0].session_type, SessionType::DayOff);
}

#[tokio::test]
async fn server_errors_surface_as_backend_failures() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default().with_supabase_url(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/weekly_schedules"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("connection pool exhausted", "XX000"),
        ))
        .mount(&mock_server)
        .await;

    let store = SupabaseScheduleStore::new(&config);
    assert_matches!(store.get(Uuid::new_v4()).await, Err(StoreError::Backend(_)));
}
