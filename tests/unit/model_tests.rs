use chrono::{Duration, Utc};
use serde_json::{json, Value};

use field_dispatch::models::assignment::{Assignment, AssignmentStatus, Transition};
use field_dispatch::models::client::{Client, ClientStatus, NewClient, Priority};
use field_dispatch::models::import::{ImportLog, ImportRow};
use field_dispatch::models::user::{User, UserRole};
use field_dispatch::AppError;

fn new_client() -> NewClient {
    NewClient {
        name: "Asha".into(),
        phone: "555-0101".into(),
        email: Some(String::new()),
        address: "12 Park Rd".into(),
        latitude: 12.97,
        longitude: 77.59,
        priority: Priority::High,
        notes: None,
    }
}

fn full_row() -> ImportRow {
    ImportRow {
        name: Some(json!("Ravi")),
        phone: Some(json!("555-0102")),
        address: Some(json!("4 Lake St")),
        latitude: Some(json!(12.9)),
        longitude: Some(json!(77.6)),
        email: Some(json!("  ")),
        priority: Some(json!(4)),
    }
}

// ── Priority ─────────────────────────────────────────────

#[test]
fn priority_levels_and_labels() {
    assert_eq!(Priority::default(), Priority::Medium);
    assert_eq!(Priority::from_level(4), Some(Priority::Urgent));
    assert_eq!(Priority::from_level(0), None);
    assert_eq!(Priority::from_level(5), None);
    assert_eq!(Priority::Low.level(), 1);
    assert_eq!(Priority::Urgent.label(), "Urgent");
    assert!(Priority::Urgent > Priority::Low);
}

#[test]
fn priority_serializes_as_level() {
    assert_eq!(serde_json::to_value(Priority::High).unwrap(), json!(3));
    let parsed: Priority = serde_json::from_value(json!(1)).unwrap();
    assert_eq!(parsed, Priority::Low);
    assert!(serde_json::from_value::<Priority>(json!(9)).is_err());
}

#[test]
fn new_client_defaults_priority_to_medium() {
    let fields: NewClient = serde_json::from_value(json!({
        "name": "A", "phone": "1", "address": "B", "latitude": 1.0, "longitude": 2.0
    }))
    .unwrap();
    assert_eq!(fields.priority, Priority::Medium);
    assert_eq!(fields.email, None);
}

// ── Client ───────────────────────────────────────────────

#[test]
fn client_starts_pending_and_drops_empty_email() {
    let client = Client::new(new_client());
    assert_eq!(client.status, ClientStatus::Pending);
    assert_eq!(client.email, None);
    assert_eq!(client.created_at, client.updated_at);
}

#[test]
fn client_distance_to_unknown_position_is_infinite() {
    let client = Client::new(new_client());
    assert!(client.distance_from(None, Some(1.0)).is_infinite());
    assert!(client.distance_from(Some(12.97), Some(77.59)) < 1e-9);
}

#[test]
fn status_names_round_trip() {
    for status in [
        ClientStatus::Pending,
        ClientStatus::Assigned,
        ClientStatus::InProgress,
        ClientStatus::Completed,
        ClientStatus::Cancelled,
    ] {
        assert_eq!(ClientStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(ClientStatus::parse("lost"), None);
    assert_eq!(AssignmentStatus::parse("in_progress"), Some(AssignmentStatus::InProgress));
    assert_eq!(AssignmentStatus::parse("IN_PROGRESS"), None);
}

// ── User ─────────────────────────────────────────────────

#[test]
fn new_user_has_no_position() {
    let user = User::new("field-1".into(), UserRole::Agent);
    assert!(user.is_agent());
    assert!(user.is_active_agent);
    assert_eq!(user.current_latitude, None);
    assert_eq!(user.current_longitude, None);
    assert!(!User::new("boss".into(), UserRole::Manager).is_agent());
}

#[test]
fn partial_position_is_unreachable() {
    let client = Client::new(new_client());
    let mut user = User::new("field-1".into(), UserRole::Agent);
    user.current_latitude = Some(12.97);
    assert!(client
        .distance_from(user.current_latitude, user.current_longitude)
        .is_infinite());
    user.current_longitude = Some(77.59);
    assert!(client.distance_from(user.current_latitude, user.current_longitude) < 1e-9);
}

// ── Assignment lifecycle ─────────────────────────────────

#[test]
fn transition_targets() {
    assert_eq!(
        Transition::for_agent(AssignmentStatus::Accepted).unwrap(),
        Transition::Accept
    );
    assert_eq!(
        Transition::for_agent(AssignmentStatus::Completed).unwrap(),
        Transition::Complete
    );
    assert!(matches!(
        Transition::for_agent(AssignmentStatus::Assigned),
        Err(AppError::InvalidTransition(_))
    ));
    assert!(matches!(
        Transition::for_agent(AssignmentStatus::Cancelled),
        Err(AppError::InvalidTransition(_))
    ));
    assert_eq!(Transition::Accept.client_status(), None);
    assert_eq!(
        Transition::Start.client_status(),
        Some(ClientStatus::InProgress)
    );
    assert_eq!(
        Transition::Complete.client_status(),
        Some(ClientStatus::Completed)
    );
    assert_eq!(Transition::Cancel.client_status(), Some(ClientStatus::Pending));
}

#[test]
fn full_lifecycle_fills_timestamps_in_order() {
    let mut a = Assignment::new("agent".into(), "client".into());
    let t0 = a.assigned_at;
    assert_eq!(a.status, AssignmentStatus::Assigned);
    assert!(a.accepted_at.is_none() && a.started_at.is_none() && a.completed_at.is_none());

    a.apply(Transition::Accept, t0 + Duration::minutes(1)).unwrap();
    assert!(a.accepted_at.is_some() && a.started_at.is_none());

    a.apply(Transition::Start, t0 + Duration::minutes(2)).unwrap();
    assert!(a.started_at.is_some() && a.completed_at.is_none());

    a.apply(Transition::Complete, t0 + Duration::minutes(47))
        .unwrap();
    assert_eq!(a.status, AssignmentStatus::Completed);
    assert_eq!(a.duration(), Some(Duration::minutes(45)));
}

#[test]
fn skipping_accept_is_invalid() {
    let mut a = Assignment::new("agent".into(), "client".into());
    let err = a.apply(Transition::Start, Utc::now()).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    assert_eq!(a.status, AssignmentStatus::Assigned);
    assert!(a.started_at.is_none());
}

#[test]
fn completing_before_start_is_invalid() {
    let mut a = Assignment::new("agent".into(), "client".into());
    a.apply(Transition::Accept, Utc::now()).unwrap();
    assert!(matches!(
        a.apply(Transition::Complete, Utc::now()),
        Err(AppError::InvalidTransition(_))
    ));
}

#[test]
fn repeating_a_transition_is_invalid() {
    let mut a = Assignment::new("agent".into(), "client".into());
    a.apply(Transition::Accept, Utc::now()).unwrap();
    assert!(matches!(
        a.apply(Transition::Accept, Utc::now()),
        Err(AppError::InvalidTransition(_))
    ));
}

#[test]
fn cancel_is_allowed_from_every_active_status() {
    let steps = [
        vec![],
        vec![Transition::Accept],
        vec![Transition::Accept, Transition::Start],
    ];
    for prefix in steps {
        let mut a = Assignment::new("agent".into(), "client".into());
        for step in prefix {
            a.apply(step, Utc::now()).unwrap();
        }
        assert!(a.status.is_active());
        a.apply(Transition::Cancel, Utc::now()).unwrap();
        assert_eq!(a.status, AssignmentStatus::Cancelled);
        assert!(a.cancelled_at.is_some());
    }
}

#[test]
fn terminal_assignments_reject_everything() {
    let mut done = Assignment::new("agent".into(), "client".into());
    for step in [Transition::Accept, Transition::Start, Transition::Complete] {
        done.apply(step, Utc::now()).unwrap();
    }
    let mut cancelled = Assignment::new("agent".into(), "client".into());
    cancelled.apply(Transition::Cancel, Utc::now()).unwrap();

    for mut a in [done, cancelled] {
        for step in [
            Transition::Accept,
            Transition::Start,
            Transition::Complete,
            Transition::Cancel,
        ] {
            assert!(matches!(
                a.apply(step, Utc::now()),
                Err(AppError::TerminalState(_))
            ));
        }
        assert!(a.status.is_terminal());
    }
}

#[test]
fn duration_needs_start_and_completion() {
    let a = Assignment::new("agent".into(), "client".into());
    assert_eq!(a.duration(), None);
}

// ── Import rows ──────────────────────────────────────────

#[test]
fn complete_row_converts() {
    let fields = full_row().into_new_client().unwrap();
    assert_eq!(fields.name, "Ravi");
    assert_eq!(fields.priority, Priority::Urgent);
    assert_eq!(fields.email, None, "blank email is dropped");
}

#[test]
fn out_of_range_priority_falls_back_to_medium() {
    for level in [Some(json!(0)), Some(json!(7)), Some(Value::Null), None] {
        let row = ImportRow {
            priority: level,
            ..full_row()
        };
        assert_eq!(row.into_new_client().unwrap().priority, Priority::Medium);
    }
}

#[test]
fn missing_columns_are_named() {
    let no_phone = ImportRow {
        phone: Some(json!("   ")),
        ..full_row()
    };
    assert_eq!(no_phone.into_new_client().unwrap_err(), "missing phone");

    let no_lat = ImportRow {
        latitude: None,
        ..full_row()
    };
    assert_eq!(no_lat.into_new_client().unwrap_err(), "missing latitude");
}

#[test]
fn loosely_typed_cells_convert() {
    let row: ImportRow = serde_json::from_value(json!({
        "name": "Ravi",
        "phone": 5_551_234,
        "address": "4 Lake St",
        "latitude": "12.5",
        "longitude": 77.6,
        "priority": 3.0,
    }))
    .unwrap();

    let fields = row.into_new_client().unwrap();
    assert_eq!(fields.phone, "5551234");
    assert!((fields.latitude - 12.5).abs() < f64::EPSILON);
    assert_eq!(fields.priority, Priority::High);
}

#[test]
fn unreadable_cells_are_named() {
    let bad_lat = ImportRow {
        latitude: Some(json!("north")),
        ..full_row()
    };
    assert_eq!(bad_lat.into_new_client().unwrap_err(), "invalid latitude");

    let bad_priority = ImportRow {
        priority: Some(json!("urgent")),
        ..full_row()
    };
    assert_eq!(bad_priority.into_new_client().unwrap_err(), "invalid priority");

    let bad_name = ImportRow {
        name: Some(json!(["Ravi"])),
        ..full_row()
    };
    assert_eq!(bad_name.into_new_client().unwrap_err(), "invalid name");
}

#[test]
fn import_log_counts_failures() {
    let errors = vec!["Row 3: missing phone".to_owned(), "Row 5: missing name".to_owned()];
    let log = ImportLog::new("mgr".into(), "clients.xlsx".into(), 5, 3, &errors);
    assert_eq!(log.total_rows, 5);
    assert_eq!(log.successful_imports, 3);
    assert_eq!(log.failed_imports, 2);
    assert_eq!(
        log.error_details.as_deref(),
        Some("Row 3: missing phone\nRow 5: missing name")
    );

    let clean = ImportLog::new("mgr".into(), "clients.xlsx".into(), 1, 1, &[]);
    assert_eq!(clean.error_details, None);
}
