pub mod appointments;
pub mod auth;
pub mod availability;
pub mod clock;
pub mod email;
pub mod knowledge;
pub mod metrics;
pub mod notifications;
pub mod permissions;
pub mod schedule;
pub mod tenants;
pub mod validation;
