// src/routes.rs - route targets and registration
use actix_web::web;

use crate::handlers::{admin_handlers, auth_handlers, dashboard_handlers, super_admin_handlers};

pub const LOGIN_PATH: &str = "/auth/login";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const ADMIN_PATH: &str = "/admin";
pub const SUPER_ADMIN_PATH: &str = "/super-admin";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // public
        .service(auth_handlers::signup)
        .service(auth_handlers::login)
        .service(auth_handlers::logout)
        .service(auth_handlers::unauthorized)
        // dashboard area
        .service(dashboard_handlers::dashboard)
        .service(dashboard_handlers::list_programs)
        .service(dashboard_handlers::enroll)
        .service(dashboard_handlers::my_profile)
        .service(dashboard_handlers::view_step)
        .service(dashboard_handlers::submit_step)
        // admin area
        .service(admin_handlers::overview)
        .service(admin_handlers::list_reviews)
        .service(admin_handlers::get_review)
        .service(admin_handlers::approve_review)
        .service(admin_handlers::reject_review)
        .service(admin_handlers::list_students)
        // super-admin area
        .service(super_admin_handlers::overview)
        .service(super_admin_handlers::list_users)
        .service(super_admin_handlers::create_staff)
        .service(super_admin_handlers::change_role)
        .service(super_admin_handlers::list_programs)
        .service(super_admin_handlers::create_program)
        .service(super_admin_handlers::update_program)
        .service(super_admin_handlers::list_steps)
        .service(super_admin_handlers::create_step)
        .service(super_admin_handlers::update_step);
}
