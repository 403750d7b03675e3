pub mod admin_handlers;
pub mod auth_handlers;
pub mod dashboard_handlers;
pub mod super_admin_handlers;
