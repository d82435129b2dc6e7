use std::sync::LazyLock;

use super::ApiError;

static EMAIL_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex")
});

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    if email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }

    if email.len() > 254 || !EMAIL_RE.is_match(email) {
        return Err(ApiError::validation("Invalid email address"));
    }

    Ok(email)
}

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    if username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }

    if !(3..=32).contains(&username.len()) {
        return Err(ApiError::validation(
            "Username must be between 3 and 32 characters",
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::validation(
            "Username can only contain letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(username)
}

pub fn validate_password(password: &str) -> Result<&str, ApiError> {
    if password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }

    if password.len() > 512 {
        return Err(ApiError::validation("Password is too long"));
    }

    Ok(password)
}

pub fn validate_business_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ApiError::validation("Business name cannot be empty"));
    }

    if trimmed.len() > 120 {
        return Err(ApiError::validation(
            "Business name must be 120 characters or less",
        ));
    }

    Ok(trimmed)
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ApiError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ApiError::validation("Latitude must be between -90 and 90"));
    }

    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ApiError::validation(
            "Longitude must be between -180 and 180",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(validate_email("biz1@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.org").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two@@example.com").is_err());
        assert!(validate_email("spaces in@example.com").is_err());
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("biz1").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
    }

    #[test]
    fn coordinate_bounds() {
        assert!(validate_coordinates(-1.28, 36.82).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, 181.0).is_err());
    }
}
