use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::Key};

use time;

use crate::config::Config;
use crate::state::SharedState;

mod admin;
pub mod auth;
mod businesses;
mod error;
mod observability;
mod system;
mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn crate::services::AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn audit(&self) -> &crate::services::AuditLogger {
        &self.shared.audit
    }
}

pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let (cors_origins, secure_cookies, session_secret, session_ttl_minutes) = {
        let config = state.config().read().await;
        (
            config.server.cors_allowed_origins.clone(),
            config.server.secure_cookies,
            config.server.session_secret.clone(),
            config.server.session_ttl_minutes,
        )
    };

    let protected_routes = create_protected_router();

    let session_store = MemoryStore::default();
    let signing_key = Key::try_from(session_secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("session secret unusable as signing key: {e}"))?;
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            session_ttl_minutes,
        )))
        .with_signed(signing_key);

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/login", post(auth::login))
        .route("/auth/federated", post(auth::federated_login))
        .route("/auth/logout", post(auth::logout))
        .route("/system/health", get(system::health))
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Ok(Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        )))
}

fn create_protected_router() -> Router<Arc<AppState>> {
    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}/deactivate", post(admin::deactivate_user))
        .route("/businesses/{id}/verify", post(admin::verify_business))
        .route("/login-attempts", get(admin::list_login_attempts))
        .route("/audit", get(admin::list_audit_events))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(auth::require_admin));

    Router::new()
        .route("/auth/me", get(auth::get_current_user))
        .route("/auth/2fa", get(auth::get_2fa_status))
        .route("/auth/2fa/setup", post(auth::setup_2fa))
        .route("/auth/2fa/enable", post(auth::enable_2fa))
        .route("/auth/2fa/backup/consume", post(auth::consume_backup_code))
        .route("/businesses", get(businesses::list_businesses))
        .route("/businesses", post(businesses::create_business))
        .route("/businesses/{id}", get(businesses::get_business))
        .route("/businesses/{id}", put(businesses::update_business))
        .route("/businesses/{id}", delete(businesses::delete_business))
        .route("/system/status", get(system::get_status))
        .nest("/admin", admin_routes)
        .route_layer(middleware::from_fn(auth::auth_middleware))
}
