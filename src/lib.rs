#![forbid(unsafe_code)]

//! Field agent dispatch: proximity matching, assignment lifecycle and
//! live updates for agents and managers.

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod gateway;
pub mod geo;
pub mod http;
pub mod hub;
pub mod models;
pub mod persistence;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
