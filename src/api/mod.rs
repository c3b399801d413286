//! Read/admin HTTP API (spec §6): health/stats, monitors, cron-jobs,
//! executions, alerts, channels, effective config, and admin actions.

pub mod admin;
pub mod alerts;
pub mod channels;
pub mod cronjobs;
pub mod error;
pub mod executions;
pub mod monitors;
pub mod server;
pub mod state;

pub use server::start_api_server;
pub use state::ApiState;
