pub mod auth_service;
pub use auth_service::{AuthError, AuthService, AuthView, FederatedIdentity, SessionClaims, SignUp};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod audit;
pub use audit::AuditLogger;
