//! Webhook target URL guard (spec §4.K)
//!
//! Rejects inbound webhook registrations whose target would let a
//! tenant point delivery back at the platform itself, or at addresses
//! that only make sense inside the platform's own network.

use std::net::IpAddr;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlGuardError {
    #[error("URL could not be parsed: {0}")]
    Unparseable(String),
    #[error("scheme must be http or https")]
    DisallowedScheme,
    #[error("URL has no host")]
    MissingHost,
    #[error("localhost targets are not allowed")]
    Localhost,
    #[error("private network targets are not allowed")]
    PrivateNetwork,
    #[error("platform domains cannot be used as webhook targets")]
    PlatformDomain,
}

/// Validate a candidate webhook target URL against the platform's
/// outbound-delivery guard rules.
///
/// `platform_domains` comes from `WebhookGuardConfig::platform_domains`.
pub fn validate_webhook_url(url: &str, platform_domains: &[String]) -> Result<(), UrlGuardError> {
    let parsed = Url::parse(url).map_err(|e| UrlGuardError::Unparseable(e.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(UrlGuardError::DisallowedScheme);
    }

    let host = parsed.host_str().ok_or(UrlGuardError::MissingHost)?.to_lowercase();

    if host == "localhost" || host == "localhost.localdomain" {
        return Err(UrlGuardError::Localhost);
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_loopback(ip) {
            return Err(UrlGuardError::Localhost);
        }
        if is_private(ip) {
            return Err(UrlGuardError::PrivateNetwork);
        }
    }

    if platform_domains.iter().any(|d| host == d.to_lowercase() || host.ends_with(&format!(".{}", d.to_lowercase()))) {
        return Err(UrlGuardError::PlatformDomain);
    }

    Ok(())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        // IPv6 tightening is an open question (spec §9); only loopback is rejected for now.
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

fn is_private(ip: IpAddr) -> bool {
    let IpAddr::V4(v4) = ip else { return false };
    let octets = v4.octets();
    // 10.0.0.0/8
    if octets[0] == 10 {
        return true;
    }
    // 172.16.0.0/12
    if octets[0] == 172 && (16..=31).contains(&octets[1]) {
        return true;
    }
    // 192.168.0.0/16
    octets[0] == 192 && octets[1] == 168
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_PLATFORM_DOMAINS: &[String] = &[];

    #[test]
    fn test_https_url_allowed() {
        assert!(validate_webhook_url("https://example.com/hook", NO_PLATFORM_DOMAINS).is_ok());
    }

    #[test]
    fn test_ftp_scheme_rejected() {
        assert_eq!(
            validate_webhook_url("ftp://example.com/hook", NO_PLATFORM_DOMAINS),
            Err(UrlGuardError::DisallowedScheme)
        );
    }

    #[test]
    fn test_localhost_rejected() {
        assert_eq!(
            validate_webhook_url("http://localhost:8080/hook", NO_PLATFORM_DOMAINS),
            Err(UrlGuardError::Localhost)
        );
    }

    #[test]
    fn test_loopback_ip_rejected() {
        assert_eq!(
            validate_webhook_url("http://127.0.0.1/hook", NO_PLATFORM_DOMAINS),
            Err(UrlGuardError::Localhost)
        );
    }

    #[test]
    fn test_rfc1918_10_rejected() {
        assert_eq!(
            validate_webhook_url("http://10.1.2.3/hook", NO_PLATFORM_DOMAINS),
            Err(UrlGuardError::PrivateNetwork)
        );
    }

    #[test]
    fn test_rfc1918_172_16_rejected() {
        assert_eq!(
            validate_webhook_url("http://172.16.0.5/hook", NO_PLATFORM_DOMAINS),
            Err(UrlGuardError::PrivateNetwork)
        );
    }

    #[test]
    fn test_rfc1918_172_31_rejected() {
        assert_eq!(
            validate_webhook_url("http://172.31.255.254/hook", NO_PLATFORM_DOMAINS),
            Err(UrlGuardError::PrivateNetwork)
        );
    }

    #[test]
    fn test_rfc1918_172_32_is_public_and_allowed() {
        assert!(validate_webhook_url("http://172.32.0.5/hook", NO_PLATFORM_DOMAINS).is_ok());
    }

    #[test]
    fn test_rfc1918_192_168_rejected() {
        assert_eq!(
            validate_webhook_url("http://192.168.1.1/hook", NO_PLATFORM_DOMAINS),
            Err(UrlGuardError::PrivateNetwork)
        );
    }

    #[test]
    fn test_platform_domain_rejected() {
        let domains = vec!["api.example.com".to_string()];
        assert_eq!(
            validate_webhook_url("https://api.example.com/hook", &domains),
            Err(UrlGuardError::PlatformDomain)
        );
    }

    #[test]
    fn test_platform_domain_subdomain_rejected() {
        let domains = vec!["example.com".to_string()];
        assert_eq!(
            validate_webhook_url("https://hooks.example.com/callback", &domains),
            Err(UrlGuardError::PlatformDomain)
        );
    }

    #[test]
    fn test_unrelated_domain_allowed_despite_platform_list() {
        let domains = vec!["api.example.com".to_string()];
        assert!(validate_webhook_url("https://customer-app.com/hook", &domains).is_ok());
    }

    #[test]
    fn test_unparseable_url_rejected() {
        assert!(matches!(validate_webhook_url("not a url", NO_PLATFORM_DOMAINS), Err(UrlGuardError::Unparseable(_))));
    }
}
