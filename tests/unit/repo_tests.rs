use std::sync::Arc;

use chrono::Utc;

use field_dispatch::models::assignment::{Assignment, AssignmentStatus, Transition};
use field_dispatch::models::client::{Client, ClientStatus, NewClient, Priority};
use field_dispatch::models::import::ImportLog;
use field_dispatch::models::location::{LocationFix, LocationLog};
use field_dispatch::models::user::{User, UserRole};
use field_dispatch::persistence::assignment_repo::{self, AssignmentRepo};
use field_dispatch::persistence::client_repo::{self, ClientRepo};
use field_dispatch::persistence::db::{self, Database};
use field_dispatch::persistence::import_repo::ImportRepo;
use field_dispatch::persistence::location_repo::{self, LocationRepo};
use field_dispatch::persistence::user_repo::{self, UserRepo};
use field_dispatch::AppError;

async fn memory_db() -> Arc<Database> {
    Arc::new(db::connect_memory().await.expect("in-memory connect"))
}

fn client_fields(name: &str, priority: Priority) -> NewClient {
    NewClient {
        name: name.to_owned(),
        phone: "555-0100".into(),
        email: None,
        address: "1 Main St".into(),
        latitude: 12.97,
        longitude: 77.59,
        priority,
        notes: None,
    }
}

async fn agent(repo: &UserRepo, id: &str) -> User {
    let mut user = User::new(format!("agent-{id}"), UserRole::Agent);
    user.id = id.to_owned();
    repo.create(&user).await.expect("create agent")
}

#[tokio::test]
async fn in_memory_connect_creates_all_tables() {
    let pool = db::connect_memory().await.expect("in-memory connect");

    for table in ["app_user", "client", "assignment", "location_log", "import_log"] {
        let query = format!("SELECT COUNT(*) FROM {table}");
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("table '{table}' should be queryable: {e}"));
        assert_eq!(row.0, 0, "table '{table}' should start empty");
    }
}

#[tokio::test]
async fn file_database_survives_reconnect() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dispatch.db");
    let path = path.to_str().expect("utf8 path");

    {
        let pool = Arc::new(db::connect(path).await.expect("connect"));
        agent(&UserRepo::new(Arc::clone(&pool)), "a1").await;
        pool.close().await;
    }

    let pool = Arc::new(db::connect(path).await.expect("reconnect"));
    let found = UserRepo::new(pool).get_by_id("a1").await.expect("query");
    assert!(found.is_some());
}

#[tokio::test]
async fn user_round_trip_and_duplicate_username() {
    let db = memory_db().await;
    let repo = UserRepo::new(Arc::clone(&db));

    let mut user = User::new("field-1".into(), UserRole::Agent);
    user.phone = Some("555-0199".into());
    let created = repo.create(&user).await.expect("create");

    let loaded = repo.get_by_id(&created.id).await.expect("get").expect("exists");
    assert_eq!(loaded, created);

    let dup = User::new("field-1".into(), UserRole::Manager);
    assert!(matches!(
        repo.create(&dup).await,
        Err(AppError::MalformedInput(msg)) if msg.contains("field-1")
    ));
}

#[tokio::test]
async fn update_location_only_touches_agents() {
    let db = memory_db().await;
    let repo = UserRepo::new(Arc::clone(&db));
    let a = agent(&repo, "a1").await;
    let manager = repo
        .create(&User::new("boss".into(), UserRole::Manager))
        .await
        .expect("create");

    let now = Utc::now();
    user_repo::update_location(db.as_ref(), &a.id, 1.5, 2.5, now)
        .await
        .expect("update");
    let loaded = repo.get_by_id(&a.id).await.unwrap().unwrap();
    assert_eq!(loaded.current_latitude.zip(loaded.current_longitude), Some((1.5, 2.5)));
    assert!(loaded.last_location_update.is_some());

    assert!(matches!(
        user_repo::update_location(db.as_ref(), &manager.id, 1.0, 1.0, now).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn available_agents_exclude_busy_inactive_and_managers() {
    let db = memory_db().await;
    let users = UserRepo::new(Arc::clone(&db));
    let clients = ClientRepo::new(Arc::clone(&db));

    let busy = agent(&users, "b-busy").await;
    agent(&users, "c-free").await;
    agent(&users, "a-free").await;
    let off = agent(&users, "d-off").await;
    users.set_active(&off.id, false).await.expect("deactivate");
    users
        .create(&User::new("boss".into(), UserRole::Manager))
        .await
        .expect("create manager");

    let client = clients
        .create(&Client::new(client_fields("c", Priority::Low)))
        .await
        .expect("client");
    assignment_repo::insert(db.as_ref(), &Assignment::new(busy.id.clone(), client.id))
        .await
        .expect("insert");

    let available = user_repo::list_available_agents(db.as_ref())
        .await
        .expect("list");
    let ids: Vec<_> = available.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, ["a-free", "c-free"], "ascending id order");
    assert_eq!(users.count_active_agents().await.unwrap(), 3);
    assert_eq!(users.list_agents().await.unwrap().len(), 4);
}

#[tokio::test]
async fn set_active_unknown_agent_is_not_found() {
    let db = memory_db().await;
    let repo = UserRepo::new(db);
    assert!(matches!(
        repo.set_active("ghost", false).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn pending_queue_orders_by_priority_then_age() {
    let db = memory_db().await;
    let repo = ClientRepo::new(Arc::clone(&db));

    for (name, priority) in [
        ("low-old", Priority::Low),
        ("urgent-old", Priority::Urgent),
        ("medium", Priority::Medium),
        ("urgent-new", Priority::Urgent),
    ] {
        repo.create(&Client::new(client_fields(name, priority)))
            .await
            .expect("create");
    }

    let names: Vec<_> = repo
        .list_pending()
        .await
        .expect("list")
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["urgent-old", "urgent-new", "medium", "low-old"]);
}

#[tokio::test]
async fn compare_and_set_only_moves_expected_status() {
    let db = memory_db().await;
    let repo = ClientRepo::new(Arc::clone(&db));
    let client = repo
        .create(&Client::new(client_fields("c", Priority::Medium)))
        .await
        .expect("create");

    let now = Utc::now();
    let first = client_repo::compare_and_set_status(
        db.as_ref(),
        &client.id,
        ClientStatus::Pending,
        ClientStatus::Assigned,
        now,
    )
    .await
    .expect("cas");
    let second = client_repo::compare_and_set_status(
        db.as_ref(),
        &client.id,
        ClientStatus::Pending,
        ClientStatus::Assigned,
        now,
    )
    .await
    .expect("cas");

    assert!(first);
    assert!(!second);
    assert_eq!(repo.count_by_status(ClientStatus::Assigned).await.unwrap(), 1);
    assert_eq!(repo.count_all().await.unwrap(), 1);
    assert!(matches!(
        client_repo::set_status(db.as_ref(), "ghost", ClientStatus::Pending, now).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn store_refuses_second_active_assignment() {
    let db = memory_db().await;
    let users = UserRepo::new(Arc::clone(&db));
    let clients = ClientRepo::new(Arc::clone(&db));
    let a = agent(&users, "a1").await;
    let c1 = clients
        .create(&Client::new(client_fields("one", Priority::Medium)))
        .await
        .unwrap();
    let c2 = clients
        .create(&Client::new(client_fields("two", Priority::Medium)))
        .await
        .unwrap();

    assignment_repo::insert(db.as_ref(), &Assignment::new(a.id.clone(), c1.id.clone()))
        .await
        .expect("first insert");
    let second = assignment_repo::insert(db.as_ref(), &Assignment::new(a.id.clone(), c2.id)).await;
    assert!(matches!(second, Err(AppError::AgentUnavailable(_))));
    assert!(assignment_repo::has_active_for_agent(db.as_ref(), &a.id)
        .await
        .unwrap());
    assert!(assignment_repo::has_active_for_client(db.as_ref(), &c1.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn finished_assignments_free_the_agent() {
    let db = memory_db().await;
    let users = UserRepo::new(Arc::clone(&db));
    let clients = ClientRepo::new(Arc::clone(&db));
    let repo = AssignmentRepo::new(Arc::clone(&db));
    let a = agent(&users, "a1").await;
    let c1 = clients
        .create(&Client::new(client_fields("one", Priority::Medium)))
        .await
        .unwrap();

    let mut first = Assignment::new(a.id.clone(), c1.id.clone());
    assignment_repo::insert(db.as_ref(), &first).await.unwrap();
    first.apply(Transition::Cancel, Utc::now()).unwrap();
    assert!(
        assignment_repo::save_progress(db.as_ref(), &first, AssignmentStatus::Assigned)
            .await
            .unwrap()
    );
    assert!(
        !assignment_repo::save_progress(db.as_ref(), &first, AssignmentStatus::Assigned)
            .await
            .unwrap(),
        "stale expected status is refused"
    );

    assert!(!assignment_repo::has_active_for_agent(db.as_ref(), &a.id)
        .await
        .unwrap());
    assert!(repo.current_for_agent(&a.id).await.unwrap().is_none());

    let second = Assignment::new(a.id.clone(), c1.id);
    assignment_repo::insert(db.as_ref(), &second)
        .await
        .expect("agent is free again");
    assert_eq!(repo.count_active().await.unwrap(), 1);
    assert_eq!(repo.list_for_agent(&a.id, 10).await.unwrap().len(), 2);
    assert_eq!(repo.list_recent(1).await.unwrap()[0].id, second.id);

    let loaded = repo.get_by_id(&first.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, AssignmentStatus::Cancelled);
    assert!(loaded.cancelled_at.is_some());
}

#[tokio::test]
async fn owned_lookup_hides_other_agents_work() {
    let db = memory_db().await;
    let users = UserRepo::new(Arc::clone(&db));
    let clients = ClientRepo::new(Arc::clone(&db));
    let a = agent(&users, "a1").await;
    agent(&users, "a2").await;
    let c = clients
        .create(&Client::new(client_fields("c", Priority::Medium)))
        .await
        .unwrap();
    let assignment = Assignment::new(a.id.clone(), c.id);
    assignment_repo::insert(db.as_ref(), &assignment).await.unwrap();

    assert!(assignment_repo::get_owned(db.as_ref(), &assignment.id, "a1")
        .await
        .unwrap()
        .is_some());
    assert!(assignment_repo::get_owned(db.as_ref(), &assignment.id, "a2")
        .await
        .unwrap()
        .is_none());
    assert!(assignment_repo::delete(db.as_ref(), &assignment.id).await.unwrap());
    assert!(!assignment_repo::delete(db.as_ref(), &assignment.id).await.unwrap());
}

#[tokio::test]
async fn location_history_is_newest_first() {
    let db = memory_db().await;
    let users = UserRepo::new(Arc::clone(&db));
    let a = agent(&users, "a1").await;

    for lat in [1.0, 2.0, 3.0] {
        let log = LocationLog::new(
            a.id.clone(),
            LocationFix {
                latitude: lat,
                longitude: 0.0,
                accuracy: Some(5.0),
            },
        );
        location_repo::append(db.as_ref(), &log).await.expect("append");
    }

    let history = LocationRepo::new(db).list_for_agent(&a.id, 2).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!((history[0].latitude - 3.0).abs() < f64::EPSILON);
    assert_eq!(history[0].accuracy, Some(5.0));
}

#[tokio::test]
async fn import_log_round_trip() {
    let db = memory_db().await;
    let users = UserRepo::new(Arc::clone(&db));
    let manager = users
        .create(&User::new("boss".into(), UserRole::Manager))
        .await
        .unwrap();
    let repo = ImportRepo::new(db);

    let log = ImportLog::new(
        manager.id.clone(),
        "batch.xlsx".into(),
        3,
        2,
        &["Row 4: missing name".to_owned()],
    );
    repo.create(&log).await.expect("create");

    let recent = repo.list_recent(5).await.expect("list");
    assert_eq!(recent, vec![log]);
}
