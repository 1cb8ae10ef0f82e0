//! Compound writes behind the assignment lifecycle.
//!
//! Every function here takes a live connection, normally the caller's
//! transaction, and touches both the assignment and its client so the two
//! commit or fail together. None of them publish events; callers do that
//! after commit.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::models::assignment::{Assignment, Transition};
use crate::models::client::ClientStatus;
use crate::models::user::User;
use crate::persistence::{assignment_repo, client_repo};
use crate::{AppError, Result};

/// Pair `agent` with a pending client.
///
/// Availability and client status are re-checked on `conn`, so a caller
/// that read them earlier in the same transaction still gets a
/// consistent answer.
///
/// # Errors
///
/// Returns `AppError::AgentUnavailable` if the agent already holds an
/// active assignment, `AppError::ClientNotPending` if the client is no
/// longer pending (or does not exist), and `AppError::Db` on storage
/// failure.
pub async fn create_assignment(
    conn: &mut SqliteConnection,
    agent: &User,
    client_id: &str,
    now: DateTime<Utc>,
) -> Result<Assignment> {
    if assignment_repo::has_active_for_agent(&mut *conn, &agent.id).await? {
        return Err(AppError::AgentUnavailable(format!(
            "agent {} already holds an active assignment",
            agent.username
        )));
    }

    let claimed = client_repo::compare_and_set_status(
        &mut *conn,
        client_id,
        ClientStatus::Pending,
        ClientStatus::Assigned,
        now,
    )
    .await?;
    if !claimed {
        return Err(AppError::ClientNotPending(format!(
            "client {client_id} is not pending"
        )));
    }

    let mut assignment = Assignment::new(agent.id.clone(), client_id.to_owned());
    assignment.assigned_at = now;
    assignment_repo::insert(&mut *conn, &assignment).await?;

    debug!(assignment_id = %assignment.id, agent_id = %agent.id, client_id, "assignment created");
    Ok(assignment)
}

/// Advance an assignment by one transition and update its client to match.
///
/// When `owner` is given the lookup is scoped to that agent, so another
/// agent's assignment reads as not found. `notes`, when present, replace
/// the stored notes.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the assignment does not exist (or is not
/// owned by `owner`), `AppError::TerminalState` or
/// `AppError::InvalidTransition` if the lifecycle forbids the step, and
/// `AppError::Db` on storage failure.
pub async fn advance(
    conn: &mut SqliteConnection,
    assignment_id: &str,
    owner: Option<&str>,
    transition: Transition,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<Assignment> {
    let found = match owner {
        Some(agent_id) => assignment_repo::get_owned(&mut *conn, assignment_id, agent_id).await?,
        None => assignment_repo::get(&mut *conn, assignment_id).await?,
    };
    let mut assignment =
        found.ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id} not found")))?;

    let expected = assignment.status;
    assignment.apply(transition, now)?;
    if notes.is_some() {
        assignment.notes = notes;
    }

    if !assignment_repo::save_progress(&mut *conn, &assignment, expected).await? {
        return Err(AppError::InvalidTransition(format!(
            "assignment {assignment_id} changed concurrently"
        )));
    }

    if let Some(client_status) = transition.client_status() {
        client_repo::set_status(&mut *conn, &assignment.client_id, client_status, now).await?;
    }

    debug!(
        assignment_id,
        from = expected.as_str(),
        to = assignment.status.as_str(),
        "assignment advanced"
    );
    Ok(assignment)
}

/// Delete an assignment and put its client back in the queue.
///
/// Returns `false` if the assignment did not exist.
///
/// # Errors
///
/// Returns `AppError::Db` on storage failure.
pub async fn requeue(
    conn: &mut SqliteConnection,
    assignment_id: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let Some(assignment) = assignment_repo::get(&mut *conn, assignment_id).await? else {
        return Ok(false);
    };

    assignment_repo::delete(&mut *conn, assignment_id).await?;
    client_repo::set_status(&mut *conn, &assignment.client_id, ClientStatus::Pending, now)
        .await?;

    debug!(assignment_id, client_id = %assignment.client_id, "assignment requeued");
    Ok(true)
}
