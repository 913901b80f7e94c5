//! Input checks run before any hashing or store access.

use super::errors::AccountError;

pub const MAX_USERNAME_CHARS: usize = 64;
pub const MAX_EMAIL_CHARS: usize = 255;
/// Argon2 accepts longer input, but nothing legitimate needs it.
pub const MAX_PASSWORD_BYTES: usize = 1024;

pub fn validate_username(username: &str) -> Result<(), AccountError> {
    if username.is_empty() {
        return Err(AccountError::Validation("username required".into()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(AccountError::Validation(format!("username longer than {MAX_USERNAME_CHARS} characters")));
    }
    if username.trim() != username {
        return Err(AccountError::Validation("username has leading or trailing whitespace".into()));
    }
    if username.chars().any(char::is_control) {
        return Err(AccountError::Validation("username contains control characters".into()));
    }
    Ok(())
}

pub fn validate_password(password: &str, min_chars: usize) -> Result<(), AccountError> {
    if password.is_empty() {
        return Err(AccountError::Validation("password required".into()));
    }
    if password.chars().count() < min_chars {
        return Err(AccountError::Validation(format!("password too short (>={min_chars})")));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AccountError::Validation(format!("password longer than {MAX_PASSWORD_BYTES} bytes")));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AccountError> {
    if email.chars().count() > MAX_EMAIL_CHARS {
        return Err(AccountError::Validation(format!("email longer than {MAX_EMAIL_CHARS} characters")));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.trim().is_empty() && !domain.trim().is_empty() => Ok(()),
        _ => Err(AccountError::Validation("invalid email".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_inputs() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_password("s3cret!", 1).is_ok());
        assert!(validate_email("a@x.com").is_ok());
    }

    #[test]
    fn rejects_bad_usernames() {
        for bad in ["", " alice", "alice ", "al\nice"] {
            assert!(matches!(validate_username(bad), Err(AccountError::Validation(_))), "{bad:?}");
        }
        assert!(validate_username(&"a".repeat(MAX_USERNAME_CHARS)).is_ok());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_CHARS + 1)).is_err());
    }

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("", 1).is_err());
        assert!(validate_password("short", 8).is_err());
        assert!(validate_password("long enough", 8).is_ok());
        assert!(validate_password(&"p".repeat(MAX_PASSWORD_BYTES + 1), 1).is_err());
    }

    #[test]
    fn rejects_bad_emails() {
        for bad in ["", "no-at-sign", "@x.com", "a@"] {
            assert!(validate_email(bad).is_err(), "{bad:?}");
        }
    }
}
