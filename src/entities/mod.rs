pub mod prelude;

pub mod audit_logs;
pub mod businesses;
pub mod login_attempts;
pub mod two_factor_backup_codes;
pub mod user_2fa;
pub mod users;
