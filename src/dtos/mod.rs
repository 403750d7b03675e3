pub mod admin_dtos;
pub mod api;
pub mod auth_dtos;
pub mod workflow_dtos;
