//! Input validation for session lifecycle requests.
//!
//! All checks run before any collaborator is touched, so a rejected request
//! never leaves partial state behind.

use url::Url;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::MAX_SESSION_NAME_LEN;

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;

/// Schemes accepted for proxy URLs. `socks5` is understood by the protocol client.
const PROXY_SCHEMES: &[&str] = &["http", "https", "socks5"];

/// Validate a session name and return it trimmed.
pub fn validate_session_name(name: &str) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::ValidationFailed(
            "session name cannot be empty".to_string(),
        ));
    }

    if trimmed.chars().count() > MAX_SESSION_NAME_LEN {
        return Err(DomainError::ValidationFailed(format!(
            "session name exceeds {MAX_SESSION_NAME_LEN} characters"
        )));
    }

    if let Some(bad) = trimmed
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(DomainError::ValidationFailed(format!(
            "session name contains invalid character '{bad}'"
        )));
    }

    Ok(trimmed.to_string())
}

/// Validate a phone number and return its digits.
///
/// Spaces, dashes, parentheses and `+` are separators and are stripped;
/// anything else that is not a digit is rejected.
pub fn normalize_phone_number(phone_number: &str) -> DomainResult<String> {
    if phone_number.trim().is_empty() {
        return Err(DomainError::ValidationFailed(
            "phone number cannot be empty".to_string(),
        ));
    }

    let mut digits = String::with_capacity(phone_number.len());
    for c in phone_number.chars() {
        match c {
            ' ' | '-' | '(' | ')' | '+' => {}
            d if d.is_ascii_digit() => digits.push(d),
            other => {
                return Err(DomainError::ValidationFailed(format!(
                    "phone number contains invalid character '{other}'"
                )))
            }
        }
    }

    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return Err(DomainError::ValidationFailed(format!(
            "phone number must have {MIN_PHONE_DIGITS}-{MAX_PHONE_DIGITS} digits, got {}",
            digits.len()
        )));
    }

    Ok(digits)
}

/// Validate a proxy URL: absolute, non-empty host, supported scheme.
pub fn validate_proxy_url(proxy_url: &str) -> DomainResult<String> {
    let parsed = parse_absolute_url(proxy_url, "proxy URL")?;

    if !PROXY_SCHEMES.contains(&parsed.scheme()) {
        return Err(DomainError::ValidationFailed(format!(
            "unsupported proxy scheme '{}' (expected one of: {})",
            parsed.scheme(),
            PROXY_SCHEMES.join(", ")
        )));
    }

    Ok(proxy_url.trim().to_string())
}

/// Validate a webhook URL: absolute http(s) with a host.
pub fn validate_webhook_url(webhook_url: &str) -> DomainResult<String> {
    let parsed = parse_absolute_url(webhook_url, "webhook URL")?;

    match parsed.scheme() {
        "http" | "https" => Ok(webhook_url.trim().to_string()),
        other => Err(DomainError::ValidationFailed(format!(
            "unsupported webhook scheme '{other}'"
        ))),
    }
}

fn parse_absolute_url(raw: &str, what: &str) -> DomainResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::ValidationFailed(format!("{what} cannot be empty")));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| DomainError::ValidationFailed(format!("invalid {what}: {e}")))?;

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(DomainError::ValidationFailed(format!("{what} has no host"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_number_strips_separators() {
        assert_eq!(
            normalize_phone_number("+1 (555) 123-4567").unwrap(),
            "15551234567"
        );
    }

    #[test]
    fn test_phone_number_rejects_empty() {
        assert!(matches!(
            normalize_phone_number(""),
            Err(DomainError::ValidationFailed(_))
        ));
        assert!(matches!(
            normalize_phone_number("   "),
            Err(DomainError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_phone_number_digit_bounds() {
        assert!(normalize_phone_number("123456789").is_err());
        assert!(normalize_phone_number("1234567890").is_ok());
        assert!(normalize_phone_number("123456789012345").is_ok());
        assert!(normalize_phone_number("1234567890123456").is_err());
    }

    #[test]
    fn test_phone_number_rejects_letters() {
        assert!(normalize_phone_number("555-CALL-NOW1").is_err());
    }

    #[test]
    fn test_proxy_url_accepts_supported_schemes() {
        assert!(validate_proxy_url("http://proxy.local:3128").is_ok());
        assert!(validate_proxy_url("https://user:pw@proxy.example.com").is_ok());
        assert!(validate_proxy_url("socks5://10.0.0.2:1080").is_ok());
    }

    #[test]
    fn test_proxy_url_rejects_bad_input() {
        assert!(validate_proxy_url("").is_err());
        assert!(validate_proxy_url("proxy.local:3128").is_err());
        assert!(validate_proxy_url("ftp://proxy.local").is_err());
        assert!(validate_proxy_url("http://").is_err());
    }

    #[test]
    fn test_webhook_url() {
        assert!(validate_webhook_url("https://hooks.example.com/in").is_ok());
        assert!(validate_webhook_url("socks5://hooks.example.com").is_err());
    }

    #[test]
    fn test_session_name_rules() {
        assert_eq!(validate_session_name("  alpha-1 ").unwrap(), "alpha-1");
        assert!(validate_session_name("").is_err());
        assert!(validate_session_name("has space").is_err());
        assert!(validate_session_name(&"a".repeat(65)).is_err());
        assert!(validate_session_name(&"a".repeat(64)).is_ok());
    }
}
