use std::env;

use anyhow::{bail, Context, Result};
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

use crate::models::user::Role;
use crate::services::access_gate::{AccessPolicy, RouteGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase,
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: Option<String>,
    pub supabase_service_role_key: String,
    pub jwt_secret: String,
    pub store_backend: StoreBackend,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub policy: AccessPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads every setting through `lookup` so tests don't touch process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{} must be set", key))
        };

        let store_backend = match lookup("STORE_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("supabase") => StoreBackend::Supabase,
            Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("unknown STORE_BACKEND '{}'", other),
        };

        let port = match lookup("PORT") {
            Some(p) => p.trim().parse().context("PORT must be a port number")?,
            None => 8080,
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://127.0.0.1:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let mut policy = AccessPolicy::default();
        for (group, key) in [
            (RouteGroup::Dashboard, "DASHBOARD_AREA_ROLES"),
            (RouteGroup::Admin, "ADMIN_AREA_ROLES"),
            (RouteGroup::SuperAdmin, "SUPER_ADMIN_AREA_ROLES"),
        ] {
            if let Some(raw) = lookup(key) {
                let roles = parse_roles(&raw).with_context(|| format!("invalid {}", key))?;
                policy = policy.with_roles(group, roles);
            }
        }

        Ok(Self {
            supabase_url: required("SUPABASE_URL")?,
            supabase_anon_key: lookup("SUPABASE_ANON_KEY")
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            jwt_secret: required("SUPABASE_JWT_SECRET")?,
            store_backend,
            port,
            allowed_origins,
            policy,
        })
    }
}

fn parse_roles(raw: &str) -> Result<Vec<Role>> {
    let roles = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Role>())
        .collect::<Result<Vec<_>, _>>()?;
    if roles.is_empty() {
        bail!("at least one role is required");
    }
    Ok(roles)
}

pub fn get_pg_pool() -> Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(env::var("PG_HOST").context("PG_HOST not set")?);
    cfg.user = Some(env::var("PG_USER").context("PG_USER not set")?);
    cfg.password = env::var("PG_PASS").ok();
    cfg.dbname = Some(env::var("PG_DB").context("PG_DB not set")?);

    let mut pool = cfg.pool.unwrap_or_default();
    pool.max_size = 16;
    cfg.pool = Some(pool);

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .context("failed to create postgres pool")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("SUPABASE_URL", "https://demo.supabase.co/"),
        ("SUPABASE_SERVICE_ROLE_KEY", "service-key"),
        ("SUPABASE_JWT_SECRET", "jwt-secret"),
    ];

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let cfg = AppConfig::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Supabase);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.allowed_origins.len(), 2);
        assert_eq!(cfg.supabase_anon_key, None);
        assert_eq!(cfg.policy, AccessPolicy::default());
    }

    #[test]
    fn missing_jwt_secret_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&BASE[..2])).unwrap_err();
        assert!(err.to_string().contains("SUPABASE_JWT_SECRET"));
    }

    #[test]
    fn admin_area_roles_can_be_overridden() {
        let mut pairs = BASE.to_vec();
        pairs.push(("ADMIN_AREA_ROLES", "admin, super_admin"));
        pairs.push(("STORE_BACKEND", "memory"));
        let cfg = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert_eq!(
            cfg.policy.allowed_roles(RouteGroup::Admin),
            &[Role::Admin, Role::SuperAdmin]
        );
    }

    #[test]
    fn unknown_role_in_override_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("SUPER_ADMIN_AREA_ROLES", "root"));
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }
}
