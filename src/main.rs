// src/main.rs - exchange approval backend
mod config;
mod dtos;
mod handlers;
mod middleware;
mod models;
mod repositories;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{error, info};
use reqwest::Client;

use crate::config::{AppConfig, StoreBackend};
use crate::repositories::memory_store::MemoryStore;
use crate::repositories::pg_store::PgStore;
use crate::repositories::supabase_store::SupabaseStore;
use crate::repositories::WorkflowStore;
use crate::services::access_gate::AccessPolicy;
use crate::services::auth_services::AuthService;

fn mask_key(k: &str) -> String {
    if k.len() <= 8 {
        "[REDACTED]".to_string()
    } else {
        format!("{}***{}", &k[..4], &k[k.len() - 4..])
    }
}

/// Shared per-worker state. The store is the only mutable resource.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WorkflowStore>,
    pub policy: AccessPolicy,
    pub jwt_secret: String,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Supabase URL: {}", config.supabase_url);
    info!("Supabase Key: {}", mask_key(&config.supabase_service_role_key));
    config.policy.warn_on_suspicious_rules();

    let http_client = match Client::builder().user_agent("exchange-approval-be/0.1").build() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build http client: {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn WorkflowStore> = match config.store_backend {
        StoreBackend::Supabase => Arc::new(SupabaseStore::new(http_client.clone(), &config)),
        StoreBackend::Postgres => match config::get_pg_pool() {
            Ok(pool) => Arc::new(PgStore::new(pool)),
            Err(e) => {
                error!("Failed to create PG pool: {:#}", e);
                std::process::exit(1);
            }
        },
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let auth_data = web::Data::new(AuthService::new(http_client, &config));
    let state = web::Data::new(AppState {
        store,
        policy: config.policy.clone(),
        jwt_secret: config.jwt_secret.clone(),
    });

    let allowed_origins = config.allowed_origins.clone();
    let bind_address = format!("0.0.0.0:{}", config.port);
    info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec!["authorization", "content-type", "accept", "x-requested-with"])
            .expose_headers(vec!["location"])
            .supports_credentials()
            .max_age(3600);

        for origin in &allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(auth_data.clone())
            .configure(routes::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
}
