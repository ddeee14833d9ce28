//! # Application State
//!
//! Shared state for the Axum application: the engine, configuration, the
//! optional database pool and the optional Prometheus handle.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;

use blindate_core::ValidationError;
use blindate_engine::config::parse_var;
use blindate_engine::memory::InMemoryBackend;
use blindate_engine::{Blindate, Clock, EngineConfig, SystemClock};

/// Application configuration.
///
/// Custom `Debug` redacts the auth token and database URL.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. If `None`, only the user id is read.
    pub auth_token: Option<String>,
    /// Postgres URL. `None` runs on in-memory adapters.
    pub database_url: Option<String>,
    /// Apply migrations before serving.
    pub migrate_on_start: bool,
    /// Install the Prometheus recorder and serve `/metrics`.
    pub metrics_enabled: bool,
    /// Log as JSON lines instead of human-readable text.
    pub log_json: bool,
    pub engine: EngineConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("migrate_on_start", &self.migrate_on_start)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("log_json", &self.log_json)
            .field("engine", &self.engine)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            database_url: None,
            migrate_on_start: false,
            metrics_enabled: true,
            log_json: false,
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ValidationError> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Ok(Self {
            port: parse_var(&lookup, "PORT", defaults.port)?,
            auth_token: lookup("AUTH_TOKEN"),
            database_url: lookup("DATABASE_URL"),
            migrate_on_start: parse_var(
                &lookup,
                "BLINDATE_MIGRATE_ON_START",
                defaults.migrate_on_start,
            )?,
            metrics_enabled: parse_var(
                &lookup,
                "BLINDATE_METRICS_ENABLED",
                defaults.metrics_enabled,
            )?,
            log_json: parse_var(&lookup, "BLINDATE_LOG_JSON", defaults.log_json)?,
            engine: EngineConfig::from_lookup(lookup)?,
        })
    }
}

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub engine: Blindate,
    pub config: Arc<AppConfig>,
    /// When `Some`, readiness checks the database.
    pub db_pool: Option<PgPool>,
    /// When `Some`, `/metrics` renders it.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("db", &self.db_pool.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AppState {
    /// State over an already-built engine.
    pub fn new(engine: Blindate, config: AppConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
            db_pool: None,
            metrics: None,
        }
    }

    /// State backed by PostgreSQL.
    pub fn with_postgres(pool: PgPool, config: AppConfig) -> Self {
        let events = Arc::new(blindate_engine::memory::BroadcastHub::default());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ports = crate::db::ports(pool.clone(), events, clock);
        let engine = Blindate::new(ports, config.engine.clone());
        Self {
            db_pool: Some(pool),
            ..Self::new(engine, config)
        }
    }

    /// State backed by fresh in-memory adapters, returned for seeding.
    pub fn in_memory(config: AppConfig, clock: Arc<dyn Clock>) -> (Self, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let engine = Blindate::new(backend.ports(clock), config.engine.clone());
        (Self::new(engine, config), backend)
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
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

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn reads_all_variables() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("AUTH_TOKEN", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/blindate"),
            ("BLINDATE_MIGRATE_ON_START", "true"),
            ("BLINDATE_METRICS_ENABLED", "false"),
            ("BLINDATE_GRACE_PERIOD_DAYS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
        assert!(config.migrate_on_start);
        assert!(!config.metrics_enabled);
        assert_eq!(config.engine.grace_period_days, 3);
    }

    #[test]
    fn empty_auth_token_disables_secret_check() {
        let config = AppConfig::from_lookup(lookup(&[("AUTH_TOKEN", "  ")])).unwrap();
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn bad_port_names_variable() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(err.field, "PORT");
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            auth_token: Some("super-secret".into()),
            database_url: Some("postgres://user:pw@db/blindate".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("pw@db"));
    }
}
