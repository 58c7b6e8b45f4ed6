//! Common validation utilities shared across modules

use url::Url;

/// Check if a string is empty or only whitespace
pub fn is_empty_or_whitespace(s: &str) -> bool {
    s.trim().is_empty()
}

/// Parse a listen port given as a string. Port 0 is accepted and binds an ephemeral port.
pub fn parse_port(port: &str) -> Result<u16, String> {
    let trimmed = port.trim();
    if trimmed.is_empty() {
        return Err("Port must not be empty".to_string());
    }
    trimmed.parse::<u16>().map_err(|_| format!("Port must be a number between 0 and 65535, got '{}'", trimmed))
}

/// Validate that a routing prefix is a single, non-empty path segment
pub fn validate_prefix(prefix: &str) -> Result<(), String> {
    if is_empty_or_whitespace(prefix) {
        return Err("Path prefix must not be empty".to_string());
    }
    if prefix.contains('/') {
        return Err(format!("Path prefix '{}' must not contain '/'", prefix));
    }
    if prefix.contains('?') || prefix.contains('#') {
        return Err(format!("Path prefix '{}' must not contain '?' or '#'", prefix));
    }
    Ok(())
}

/// Parse a backend target into an absolute http(s) URL with a host
pub fn validate_target_url(target: &str) -> Result<Url, String> {
    let url = Url::parse(target.trim()).map_err(|e| format!("'{}' is not a valid URL: {}", target, e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("'{}' must use http or https, not {}", target, url.scheme()));
    }
    if url.host_str().is_none_or(is_empty_or_whitespace) {
        return Err(format!("'{}' has no host", target));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_empty_or_whitespace() {
        assert!(is_empty_or_whitespace(""));
        assert!(is_empty_or_whitespace("   "));
        assert!(is_empty_or_whitespace("\t\n"));
        assert!(!is_empty_or_whitespace("8081"));
        assert!(!is_empty_or_whitespace("  a  "));
    }

    #[test]
    fn test_parse_port_valid() {
        assert_eq!(parse_port("8081"), Ok(8081));
        assert_eq!(parse_port(" 80 "), Ok(80));
        assert_eq!(parse_port("0"), Ok(0));
        assert_eq!(parse_port("65535"), Ok(65535));
    }

    #[test]
    fn test_parse_port_invalid() {
        assert!(parse_port("").is_err());
        assert!(parse_port("65536").is_err());
        assert!(parse_port("-1").is_err());
        assert_eq!(parse_port("http").unwrap_err(), "Port must be a number between 0 and 65535, got 'http'");
    }

    #[test]
    fn test_validate_prefix() {
        assert!(validate_prefix("a").is_ok());
        assert!(validate_prefix("hub-1").is_ok());
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix(" ").is_err());
        assert!(validate_prefix("a/b").is_err());
        assert!(validate_prefix("a?b").is_err());
    }

    #[test]
    fn test_validate_target_url_valid() {
        let url = validate_target_url("http://localhost:9000").unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(9000));
        assert!(validate_target_url("https://www.alarm.com").is_ok());
        assert!(validate_target_url("http://10.0.0.5:39500/api?key=1").is_ok());
    }

    #[test]
    fn test_validate_target_url_invalid() {
        assert!(validate_target_url("not a url").is_err());
        assert!(validate_target_url("").is_err());
        assert!(validate_target_url("localhost:9000").is_err());
        assert!(validate_target_url("ftp://files.example.com").is_err());
        assert!(validate_target_url("file:///etc/hosts").is_err());
    }
}
