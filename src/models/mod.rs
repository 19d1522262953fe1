pub mod appointment;
pub mod auth;
pub mod knowledge;
pub mod permission;
pub mod schedule;
pub mod tenant;
pub mod user;
