//! URL validation with SSRF protection.

use std::net::IpAddr;

use url::{Host, Url};

use super::{FetchError, FetchFailure};

/// Validate a feed URL.
///
/// Only http and https are accepted. With `block_private_hosts`, loopback,
/// private, link-local and documentation addresses and internal hostnames
/// are rejected as well.
pub fn validate_url(url: &str, block_private_hosts: bool) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| invalid(format!("invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(invalid(format!("unsupported URL scheme: {scheme}"))),
    }

    let host = parsed
        .host()
        .ok_or_else(|| invalid("URL has no host".to_string()))?;

    if block_private_hosts {
        match host {
            Host::Domain(domain) => {
                if is_forbidden_hostname(domain) {
                    return Err(invalid(format!("forbidden host: {domain}")));
                }
            }
            Host::Ipv4(ipv4) => check_ip(IpAddr::V4(ipv4))?,
            Host::Ipv6(ipv6) => check_ip(IpAddr::V6(ipv6))?,
        }
    }

    Ok(parsed)
}

fn invalid(message: String) -> FetchError {
    FetchError::new(FetchFailure::Network, message)
}

fn check_ip(ip: IpAddr) -> Result<(), FetchError> {
    if is_private_ip(&ip) {
        return Err(invalid(format!("private IP address not allowed: {ip}")));
    }
    Ok(())
}

fn is_forbidden_hostname(host: &str) -> bool {
    const FORBIDDEN_SUFFIXES: [&str; 7] = [
        ".local",
        ".localhost",
        ".internal",
        ".intranet",
        ".corp",
        ".home",
        ".lan",
    ];

    let host = host.to_lowercase();
    host == "localhost" || FORBIDDEN_SUFFIXES.iter().any(|s| host.ends_with(s))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let o = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                // Documentation: 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24
                || (o[0] == 192 && o[1] == 0 && o[2] == 2)
                || (o[0] == 198 && o[1] == 51 && o[2] == 100)
                || (o[0] == 203 && o[1] == 0 && o[2] == 113)
        }
        IpAddr::V6(ipv6) => {
            let first = ipv6.segments()[0];
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local fc00::/7
                || (first & 0xffc0) == 0xfe80 // link-local fe80::/10
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(url: &str) -> String {
        validate_url(url, true).unwrap_err().to_string()
    }

    #[test]
    fn test_public_urls_accepted() {
        assert!(validate_url("https://example.com/feed.xml", true).is_ok());
        assert!(validate_url("http://natesnewsletter.substack.com/feed", true).is_ok());
        assert!(validate_url("http://172.32.0.1/feed.xml", true).is_ok());
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        assert!(rejected("ftp://example.com/feed.xml").contains("unsupported URL scheme"));
        assert!(validate_url("file:///etc/passwd", false).is_err());
    }

    #[test]
    fn test_unparseable_url_rejected() {
        assert!(rejected("not a url").contains("invalid URL"));
    }

    #[test]
    fn test_internal_hostnames_rejected() {
        assert!(rejected("http://localhost/feed.xml").contains("forbidden host"));
        assert!(rejected("http://server.local/feed.xml").contains("forbidden host"));
        assert!(rejected("http://api.internal/feed.xml").contains("forbidden host"));
        assert!(validate_url("http://localhost.example.com/feed", true).is_ok());
    }

    #[test]
    fn test_private_ips_rejected() {
        for url in [
            "http://127.0.0.1/feed.xml",
            "http://10.0.0.1/feed.xml",
            "http://172.16.0.1/feed.xml",
            "http://192.168.1.1/feed.xml",
            "http://169.254.1.1/feed.xml",
            "http://[::1]/feed.xml",
            "http://[fd00::1]/feed.xml",
        ] {
            assert!(rejected(url).contains("private IP"), "{} accepted", url);
        }
    }

    #[test]
    fn test_guard_can_be_disabled() {
        assert!(validate_url("http://127.0.0.1:8080/feed.xml", false).is_ok());
        assert!(validate_url("http://localhost/feed.xml", false).is_ok());
    }

    #[test]
    fn test_rejections_are_network_failures() {
        let err = validate_url("http://10.0.0.1/", true).unwrap_err();
        assert_eq!(err.reason, FetchFailure::Network);
    }
}
