//! Dashboard aggregates and route estimates.

use field_dispatch::models::assignment::AssignmentStatus;
use field_dispatch::models::client::Priority;
use field_dispatch::AppError;

use super::test_helpers::{add_agent, add_client, add_manager, test_service, KM_PER_DEGREE};

#[tokio::test]
async fn manager_dashboard_counts() {
    let (service, _db) = test_service().await;
    let busy = add_agent(&service, "busy", Some((0.0, 0.0))).await;
    let idle = add_agent(&service, "idle", None).await;
    let off = add_agent(&service, "off", None).await;
    service.set_agent_active(&off.id, false).await.unwrap();
    add_manager(&service, "boss").await;

    let held = add_client(&service, "held", (0.0, 0.0), Priority::High).await;
    add_client(&service, "waiting", (1.0, 1.0), Priority::Low).await;
    let assignment = service.manual_assign(&busy.id, &held.id).await.unwrap();

    let dashboard = service.manager_dashboard().await.unwrap();
    assert_eq!(dashboard.total_clients, 2);
    assert_eq!(dashboard.pending_clients, 1);
    assert_eq!(dashboard.active_agents, 2);
    assert_eq!(dashboard.active_assignments, 1);
    assert_eq!(dashboard.recent_assignments, vec![assignment.clone()]);

    let names: Vec<_> = dashboard
        .agents
        .iter()
        .map(|overview| overview.agent.username.as_str())
        .collect();
    assert_eq!(names, ["busy", "idle", "off"]);
    assert_eq!(dashboard.agents[0].current_assignment, Some(assignment));
    assert!(dashboard.agents[1].current_assignment.is_none());
    assert_eq!(dashboard.agents[1].agent.id, idle.id);
}

#[tokio::test]
async fn agent_dashboard_shows_current_work_and_history() {
    let (service, _db) = test_service().await;
    let agent = add_agent(&service, "field-1", Some((0.0, 0.0))).await;
    let first = add_client(&service, "first", (0.0, 0.0), Priority::High).await;
    let second = add_client(&service, "second", (0.0, 0.0), Priority::High).await;

    let done = service.manual_assign(&agent.id, &first.id).await.unwrap();
    for status in [
        AssignmentStatus::Accepted,
        AssignmentStatus::InProgress,
        AssignmentStatus::Completed,
    ] {
        service
            .advance_assignment(&done.id, &agent.id, status, None)
            .await
            .unwrap();
    }
    let current = service.manual_assign(&agent.id, &second.id).await.unwrap();

    let dashboard = service.agent_dashboard(&agent.id).await.unwrap();
    assert_eq!(dashboard.agent.id, agent.id);
    assert_eq!(dashboard.current_assignment, Some(current.clone()));
    assert_eq!(
        dashboard.current_client.map(|client| client.name),
        Some("second".to_owned())
    );
    let history: Vec<_> = dashboard.history.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(history, [current.id.as_str(), done.id.as_str()]);
}

#[tokio::test]
async fn idle_agent_dashboard_is_empty() {
    let (service, _db) = test_service().await;
    let agent = add_agent(&service, "a", None).await;

    let dashboard = service.agent_dashboard(&agent.id).await.unwrap();
    assert!(dashboard.current_assignment.is_none());
    assert!(dashboard.current_client.is_none());
    assert!(dashboard.history.is_empty());
}

#[tokio::test]
async fn agent_dashboard_rejects_managers() {
    let (service, _db) = test_service().await;
    let manager = add_manager(&service, "boss").await;
    assert!(matches!(
        service.agent_dashboard(&manager.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn route_is_straight_line_at_average_speed() {
    let (service, _db) = test_service().await;

    let route = service.route((10.0, 20.0), (11.0, 20.0));
    assert_eq!(route.coordinates, [[20.0, 10.0], [20.0, 11.0]]);
    assert!((route.distance - KM_PER_DEGREE).abs() < 1e-6);
    // 30 km/h default
    assert!((route.duration - KM_PER_DEGREE * 2.0).abs() < 1e-6);

    let still = service.route((5.0, 5.0), (5.0, 5.0));
    assert!(still.distance.abs() < f64::EPSILON);
    assert!(still.duration.abs() < f64::EPSILON);
}
