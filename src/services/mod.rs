pub mod access_gate;
pub mod auth_services;
pub mod catalog;
pub mod progress;
pub mod reports;
pub mod workflow;
