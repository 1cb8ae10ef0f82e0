//! Dispatch operation contract.
//!
//! [`DispatchService`] is the single entry point the HTTP API and the
//! realtime gateway call into. Every compound write takes the write gate,
//! runs in one transaction and publishes its events only after commit, so
//! subscribers never observe state the store could still roll back.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::geo;
use crate::hub::events::{
    AssignmentNotice, LocationReport, OutboundEvent, StatusChange, StatusReport,
};
use crate::hub::{Channel, EventHub};
use crate::models::assignment::{Assignment, AssignmentStatus, Transition};
use crate::models::client::{Client, ClientStatus, NewClient};
use crate::models::import::{ImportLog, ImportRow};
use crate::models::location::{LocationFix, LocationLog};
use crate::models::user::{User, UserRole};
use crate::persistence::assignment_repo::{self, AssignmentRepo};
use crate::persistence::client_repo::{self, ClientRepo};
use crate::persistence::db::{self, Database};
use crate::persistence::import_repo::ImportRepo;
use crate::persistence::location_repo;
use crate::persistence::user_repo::{self, UserRepo};
use crate::{AppError, Result};

use super::{lifecycle, matcher};

/// One pairing made by [`DispatchService::auto_assign`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignedPair {
    /// Created assignment.
    pub assignment_id: String,
    /// Assigned agent.
    pub agent_id: String,
    /// Assigned agent's username.
    pub agent_name: String,
    /// Served client.
    pub client_id: String,
    /// Client contact name.
    pub client_name: String,
}

/// Outcome of one automatic matching run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoAssignReport {
    /// Number of assignments created.
    pub assignments_created: usize,
    /// Pairings in queue order.
    pub pairs: Vec<AssignedPair>,
}

/// Fields accepted when creating a user.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NewUser {
    /// Unique login name.
    pub username: String,
    /// Manager or agent.
    pub role: UserRole,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
}

/// One agent row on the manager dashboard.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgentOverview {
    /// The agent, including last known position.
    pub agent: User,
    /// Active assignment, if any.
    pub current_assignment: Option<Assignment>,
}

/// Operational picture for managers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ManagerDashboard {
    /// Every client ever created.
    pub total_clients: i64,
    /// Clients waiting for an agent.
    pub pending_clients: i64,
    /// Agents flagged as taking work.
    pub active_agents: i64,
    /// Assignments in an active status.
    pub active_assignments: i64,
    /// Newest assignments first.
    pub recent_assignments: Vec<Assignment>,
    /// Every agent with its current work.
    pub agents: Vec<AgentOverview>,
}

/// An agent's own view.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgentDashboard {
    /// The agent.
    pub agent: User,
    /// Active assignment, if any.
    pub current_assignment: Option<Assignment>,
    /// Client served by the active assignment.
    pub current_client: Option<Client>,
    /// Newest assignments first, including the current one.
    pub history: Vec<Assignment>,
}

/// Straight-line route approximation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteEstimate {
    /// `[[lng, lat], [lng, lat]]` from start to end.
    pub coordinates: [[f64; 2]; 2],
    /// Great-circle distance in kilometres.
    pub distance: f64,
    /// Travel time in minutes at the configured average speed.
    pub duration: f64,
}

/// The dispatch operation contract.
///
/// Cheap to clone; clones share the store, the hub and the write gate.
#[derive(Clone)]
pub struct DispatchService {
    db: Arc<Database>,
    hub: EventHub,
    write_gate: Arc<Mutex<()>>,
    recent_limit: u32,
    average_speed_kmh: f64,
}

impl DispatchService {
    /// Build the service over an open store and a running hub.
    #[must_use]
    pub fn new(db: Arc<Database>, hub: EventHub, config: &GlobalConfig) -> Self {
        Self {
            db,
            hub,
            write_gate: Arc::new(Mutex::new(())),
            recent_limit: config.recent_assignments_limit,
            average_speed_kmh: config.routing.average_speed_kmh,
        }
    }

    /// Hub the service publishes to.
    #[must_use]
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Look up a user by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        UserRepo::new(Arc::clone(&self.db)).get_by_id(user_id).await
    }

    /// Pair pending clients with the nearest available agents.
    ///
    /// The whole batch is one transaction; notifications go out after it
    /// commits.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on storage failure, in which case nothing is
    /// assigned.
    pub async fn auto_assign(&self) -> Result<AutoAssignReport> {
        async move {
            let _gate = self.write_gate.lock().await;
            let mut tx = db::begin_write(&self.db).await?;

            let clients = client_repo::list_pending(&mut *tx).await?;
            let agents = user_repo::list_available_agents(&mut *tx).await?;
            let planned = matcher::plan(&clients, agents);

            let now = Utc::now();
            let mut created = Vec::with_capacity(planned.len());
            for (agent, client) in planned {
                let assignment = lifecycle::create_assignment(&mut tx, &agent, &client.id, now).await?;
                created.push((agent, client, assignment));
            }
            tx.commit().await?;

            let mut report = AutoAssignReport::default();
            for (agent, client, assignment) in &created {
                self.announce_assignment(agent, client, assignment);
                report.pairs.push(AssignedPair {
                    assignment_id: assignment.id.clone(),
                    agent_id: agent.id.clone(),
                    agent_name: agent.username.clone(),
                    client_id: client.id.clone(),
                    client_name: client.name.clone(),
                });
            }
            report.assignments_created = report.pairs.len();

            info!(
                pending = clients.len(),
                created = report.assignments_created,
                "auto-assign complete"
            );
            Ok(report)
        }
        .instrument(info_span!("auto_assign"))
        .await
    }

    /// Assign a specific client to a specific agent, ignoring distance.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the agent or client does not exist
    /// (or the user is not an agent), `AppError::ClientNotPending` if the
    /// client is already taken, and `AppError::AgentUnavailable` if the
    /// agent already holds an active assignment.
    pub async fn manual_assign(&self, agent_id: &str, client_id: &str) -> Result<Assignment> {
        async move {
            let _gate = self.write_gate.lock().await;
            let mut tx = db::begin_write(&self.db).await?;

            let agent = user_repo::get(&mut *tx, agent_id)
                .await?
                .filter(User::is_agent)
                .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} not found")))?;
            let client = client_repo::get(&mut *tx, client_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("client {client_id} not found")))?;

            let assignment =
                lifecycle::create_assignment(&mut tx, &agent, &client.id, Utc::now()).await?;
            tx.commit().await?;

            self.announce_assignment(&agent, &client, &assignment);
            info!(assignment_id = %assignment.id, agent = %agent.username, "manual assignment created");
            Ok(assignment)
        }
        .instrument(info_span!("manual_assign", agent_id, client_id))
        .await
    }

    /// Move an agent's own assignment to `status` and tell managers.
    ///
    /// Agents may only request `accepted`, `in_progress` or `completed`;
    /// cancelling is [`DispatchService::cancel_assignment`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the assignment does not exist or
    /// belongs to another agent, and `AppError::InvalidTransition` or
    /// `AppError::TerminalState` if the lifecycle forbids the step.
    pub async fn advance_assignment(
        &self,
        assignment_id: &str,
        requester_agent_id: &str,
        status: AssignmentStatus,
        notes: Option<String>,
    ) -> Result<Assignment> {
        async move {
            let transition = Transition::for_agent(status)?;
            let (assignment, agent, client) = self
                .transition(assignment_id, Some(requester_agent_id), transition, notes)
                .await?;

            self.publish_status_change(&assignment, &agent, &client);
            info!(status = assignment.status.as_str(), "assignment status updated");
            Ok(assignment)
        }
        .instrument(info_span!("advance_assignment", assignment_id, agent_id = requester_agent_id))
        .await
    }

    /// Realtime variant of [`DispatchService::advance_assignment`].
    ///
    /// Publishes a `status_broadcast` carrying the client's own timestamp
    /// instead of a `status_update`.
    ///
    /// # Errors
    ///
    /// Same as [`DispatchService::advance_assignment`].
    pub async fn report_status(
        &self,
        agent_id: &str,
        assignment_id: &str,
        status: AssignmentStatus,
        timestamp: Option<Value>,
    ) -> Result<Assignment> {
        async move {
            let transition = Transition::for_agent(status)?;
            let (assignment, agent, client) = self
                .transition(assignment_id, Some(agent_id), transition, None)
                .await?;

            self.hub.publish(
                &Channel::Managers,
                OutboundEvent::StatusBroadcast {
                    data: StatusReport {
                        assignment_id: assignment.id.clone(),
                        agent_name: agent.username,
                        client_name: client.name,
                        status: assignment.status.as_str().to_owned(),
                        timestamp,
                    },
                },
            );
            info!(status = assignment.status.as_str(), "assignment status reported");
            Ok(assignment)
        }
        .instrument(info_span!("report_status", assignment_id, agent_id))
        .await
    }

    /// Cancel an assignment and return its client to the queue.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the assignment does not exist and
    /// `AppError::TerminalState` if it already finished.
    pub async fn cancel_assignment(&self, assignment_id: &str) -> Result<Assignment> {
        async move {
            let (assignment, agent, client) = self
                .transition(assignment_id, None, Transition::Cancel, None)
                .await?;

            self.publish_status_change(&assignment, &agent, &client);
            info!("assignment cancelled");
            Ok(assignment)
        }
        .instrument(info_span!("cancel_assignment", assignment_id))
        .await
    }

    /// Record an agent's position and tell managers.
    ///
    /// `reported_at` is relayed as the event timestamp; the server time is
    /// used when absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no agent has this id.
    pub async fn report_location(
        &self,
        agent_id: &str,
        fix: LocationFix,
        reported_at: Option<Value>,
    ) -> Result<LocationLog> {
        async move {
            let _gate = self.write_gate.lock().await;
            let mut tx = db::begin_write(&self.db).await?;

            let agent = user_repo::get(&mut *tx, agent_id)
                .await?
                .filter(User::is_agent)
                .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} not found")))?;
            let log = LocationLog::new(agent.id.clone(), fix);
            user_repo::update_location(&mut *tx, &agent.id, fix.latitude, fix.longitude, log.timestamp)
                .await?;
            location_repo::append(&mut *tx, &log).await?;
            tx.commit().await?;

            let timestamp = reported_at.unwrap_or_else(|| {
                Value::String(log.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
            });
            self.hub.publish(
                &Channel::Managers,
                OutboundEvent::LocationUpdate {
                    data: LocationReport {
                        agent_id: agent.id,
                        agent_name: agent.username,
                        latitude: fix.latitude,
                        longitude: fix.longitude,
                        timestamp: Some(timestamp),
                    },
                },
            );
            Ok(log)
        }
        .instrument(info_span!("report_location", agent_id))
        .await
    }

    /// Create a pending client.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MalformedInput` if a required text field is blank
    /// or a coordinate is not finite.
    pub async fn create_client(&self, fields: NewClient) -> Result<Client> {
        if fields.name.trim().is_empty()
            || fields.phone.trim().is_empty()
            || fields.address.trim().is_empty()
        {
            return Err(AppError::MalformedInput(
                "name, phone and address are required".into(),
            ));
        }
        if !(fields.latitude.is_finite() && fields.longitude.is_finite()) {
            return Err(AppError::MalformedInput(
                "coordinates must be finite numbers".into(),
            ));
        }

        let client = Client::new(fields);
        let client = ClientRepo::new(Arc::clone(&self.db)).create(&client).await?;
        info!(client_id = %client.id, priority = client.priority.level(), "client created");
        Ok(client)
    }

    /// Create clients from a batch of rows, recording the outcome.
    ///
    /// Invalid rows are reported as `Row N: reason`, where `N` counts from
    /// 2 to match the spreadsheet line under a header row. Valid rows are
    /// created even when others fail.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on storage failure.
    pub async fn import_clients(
        &self,
        uploaded_by: &str,
        file_name: &str,
        rows: Vec<ImportRow>,
    ) -> Result<ImportLog> {
        async move {
            let total = rows.len();
            let mut created = 0;
            let mut errors = Vec::new();

            {
                let _gate = self.write_gate.lock().await;
                let mut tx = db::begin_write(&self.db).await?;
                for (index, row) in rows.into_iter().enumerate() {
                    match row.into_new_client() {
                        Ok(fields) => {
                            client_repo::insert(&mut *tx, &Client::new(fields)).await?;
                            created += 1;
                        }
                        Err(reason) => errors.push(format!("Row {}: {reason}", index + 2)),
                    }
                }
                tx.commit().await?;
            }

            let log = ImportLog::new(
                uploaded_by.to_owned(),
                file_name.to_owned(),
                total,
                created,
                &errors,
            );
            let log = ImportRepo::new(Arc::clone(&self.db)).create(&log).await?;

            if errors.is_empty() {
                info!(total, created, "client import complete");
            } else {
                warn!(total, created, failed = errors.len(), "client import had failures");
            }
            Ok(log)
        }
        .instrument(info_span!("import_clients", uploaded_by, file_name))
        .await
    }

    /// Delete assignments and put their clients back in the queue.
    ///
    /// Unknown ids are skipped. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on storage failure, in which case nothing is
    /// deleted.
    pub async fn reassign_to_pending(&self, assignment_ids: &[String]) -> Result<usize> {
        async move {
            let _gate = self.write_gate.lock().await;
            let mut tx = db::begin_write(&self.db).await?;

            let now = Utc::now();
            let mut deleted = 0;
            for id in assignment_ids {
                if lifecycle::requeue(&mut tx, id, now).await? {
                    deleted += 1;
                }
            }
            tx.commit().await?;

            info!(requested = assignment_ids.len(), deleted, "assignments returned to pending");
            Ok(deleted)
        }
        .instrument(info_span!("reassign_to_pending"))
        .await
    }

    /// Administrative override of client status.
    ///
    /// Only `pending` and `completed` may be forced. Clients held by an
    /// active assignment are left alone so an agent never loses a client
    /// underneath a live assignment. Returns the number updated.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MalformedInput` for any other status.
    pub async fn override_client_status(
        &self,
        client_ids: &[String],
        status: ClientStatus,
    ) -> Result<usize> {
        if !matches!(status, ClientStatus::Pending | ClientStatus::Completed) {
            return Err(AppError::MalformedInput(format!(
                "client status can only be forced to pending or completed, not {}",
                status.as_str()
            )));
        }

        async move {
            let _gate = self.write_gate.lock().await;
            let mut tx = db::begin_write(&self.db).await?;

            let now = Utc::now();
            let mut updated = 0;
            for id in client_ids {
                if assignment_repo::has_active_for_client(&mut *tx, id).await? {
                    warn!(client_id = %id, "client has an active assignment, override skipped");
                    continue;
                }
                match client_repo::set_status(&mut *tx, id, status, now).await {
                    Ok(()) => updated += 1,
                    Err(AppError::NotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }
            tx.commit().await?;

            info!(requested = client_ids.len(), updated, "client status overridden");
            Ok(updated)
        }
        .instrument(info_span!("override_client_status", status = status.as_str()))
        .await
    }

    /// Create a manager or agent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MalformedInput` if the username is blank or taken.
    pub async fn create_user(&self, fields: NewUser) -> Result<User> {
        let username = fields.username.trim();
        if username.is_empty() {
            return Err(AppError::MalformedInput("username is required".into()));
        }

        let mut user = User::new(username.to_owned(), fields.role);
        user.phone = fields.phone.filter(|p| !p.is_empty());
        user.email = fields.email.filter(|e| !e.is_empty());
        let user = UserRepo::new(Arc::clone(&self.db)).create(&user).await?;
        info!(user_id = %user.id, username = %user.username, role = user.role.as_str(), "user created");
        Ok(user)
    }

    /// Toggle whether an agent takes new work.
    ///
    /// An agent taken off duty keeps any assignment it already holds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no agent has this id.
    pub async fn set_agent_active(&self, agent_id: &str, active: bool) -> Result<()> {
        UserRepo::new(Arc::clone(&self.db))
            .set_active(agent_id, active)
            .await?;
        info!(agent_id, active, "agent availability changed");
        Ok(())
    }

    /// Counts, recent assignments and per-agent current work.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails.
    pub async fn manager_dashboard(&self) -> Result<ManagerDashboard> {
        let users = UserRepo::new(Arc::clone(&self.db));
        let clients = ClientRepo::new(Arc::clone(&self.db));
        let assignments = AssignmentRepo::new(Arc::clone(&self.db));

        let mut agents = Vec::new();
        for agent in users.list_agents().await? {
            let current_assignment = assignments.current_for_agent(&agent.id).await?;
            agents.push(AgentOverview {
                agent,
                current_assignment,
            });
        }

        Ok(ManagerDashboard {
            total_clients: clients.count_all().await?,
            pending_clients: clients.count_by_status(ClientStatus::Pending).await?,
            active_agents: users.count_active_agents().await?,
            active_assignments: assignments.count_active().await?,
            recent_assignments: assignments.list_recent(self.recent_limit).await?,
            agents,
        })
    }

    /// An agent's current work and history.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no agent has this id.
    pub async fn agent_dashboard(&self, agent_id: &str) -> Result<AgentDashboard> {
        let agent = UserRepo::new(Arc::clone(&self.db))
            .get_by_id(agent_id)
            .await?
            .filter(User::is_agent)
            .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} not found")))?;

        let assignments = AssignmentRepo::new(Arc::clone(&self.db));
        let current_assignment = assignments.current_for_agent(agent_id).await?;
        let current_client = match &current_assignment {
            Some(assignment) => {
                ClientRepo::new(Arc::clone(&self.db))
                    .get_by_id(&assignment.client_id)
                    .await?
            }
            None => None,
        };
        let history = assignments
            .list_for_agent(agent_id, self.recent_limit)
            .await?;

        Ok(AgentDashboard {
            agent,
            current_assignment,
            current_client,
            history,
        })
    }

    /// Straight-line route between two `(lat, lng)` points.
    #[must_use]
    pub fn route(&self, start: (f64, f64), end: (f64, f64)) -> RouteEstimate {
        let distance = geo::haversine_km(start.0, start.1, end.0, end.1);
        RouteEstimate {
            coordinates: [[start.1, start.0], [end.1, end.0]],
            distance,
            duration: distance / self.average_speed_kmh * 60.0,
        }
    }

    /// Apply one lifecycle transition and load what the event needs.
    async fn transition(
        &self,
        assignment_id: &str,
        owner: Option<&str>,
        transition: Transition,
        notes: Option<String>,
    ) -> Result<(Assignment, User, Client)> {
        let _gate = self.write_gate.lock().await;
        let mut tx = db::begin_write(&self.db).await?;

        let assignment =
            lifecycle::advance(&mut tx, assignment_id, owner, transition, notes, Utc::now())
                .await?;
        let agent = user_repo::get(&mut *tx, &assignment.agent_id)
            .await?
            .ok_or_else(|| AppError::Db(format!("agent {} missing", assignment.agent_id)))?;
        let client = client_repo::get(&mut *tx, &assignment.client_id)
            .await?
            .ok_or_else(|| AppError::Db(format!("client {} missing", assignment.client_id)))?;
        tx.commit().await?;

        Ok((assignment, agent, client))
    }

    fn announce_assignment(&self, agent: &User, client: &Client, assignment: &Assignment) {
        self.hub.publish(
            &Channel::agent(agent.id.as_str()),
            OutboundEvent::AssignmentNotification {
                data: AssignmentNotice::NewAssignment {
                    assignment_id: assignment.id.clone(),
                    client_name: client.name.clone(),
                    client_address: client.address.clone(),
                    client_phone: client.phone.clone(),
                    client_lat: client.latitude,
                    client_lng: client.longitude,
                    priority: client.priority.label().to_owned(),
                },
            },
        );
        self.hub.publish(
            &Channel::Managers,
            OutboundEvent::AssignmentNotification {
                data: AssignmentNotice::AssignmentCreated {
                    agent_name: agent.username.clone(),
                    client_name: client.name.clone(),
                    assignment_id: assignment.id.clone(),
                },
            },
        );
    }

    fn publish_status_change(&self, assignment: &Assignment, agent: &User, client: &Client) {
        self.hub.publish(
            &Channel::Managers,
            OutboundEvent::StatusUpdate {
                data: StatusChange {
                    assignment_id: assignment.id.clone(),
                    agent_name: agent.username.clone(),
                    client_name: client.name.clone(),
                    new_status: assignment.status.as_str().to_owned(),
                },
            },
        );
    }
}
