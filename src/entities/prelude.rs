pub use super::audit_logs::Entity as AuditLogs;
pub use super::businesses::Entity as Businesses;
pub use super::login_attempts::Entity as LoginAttempts;
pub use super::two_factor_backup_codes::Entity as TwoFactorBackupCodes;
pub use super::user_2fa::Entity as User2fa;
pub use super::users::Entity as Users;
