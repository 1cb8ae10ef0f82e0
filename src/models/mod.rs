//! Domain model module declarations.

pub mod assignment;
pub mod client;
pub mod import;
pub mod location;
pub mod user;
