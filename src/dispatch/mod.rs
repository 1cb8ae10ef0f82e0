//! Assignment engine.
//!
//! [`lifecycle`] holds the compound writes behind each assignment
//! transition, [`matcher`] the pure nearest-agent pairing, and
//! [`service`] the operation contract that runs both under the write gate
//! and publishes events once the store has committed.

pub mod lifecycle;
pub mod matcher;
pub mod service;

pub use service::{
    AgentDashboard, AgentOverview, AssignedPair, AutoAssignReport, DispatchService,
    ManagerDashboard, NewUser, RouteEstimate,
};
