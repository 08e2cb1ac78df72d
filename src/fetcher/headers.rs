//! Browser-equivalent request headers.

use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL,
    CONNECTION, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};

/// Browser engine family, which decides the client hint headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    /// Chrome, Edge and other Chromium derivatives.
    Chromium,
    /// Firefox.
    Firefox,
    /// Safari.
    Safari,
}

/// A desktop browser identity.
#[derive(Debug)]
pub struct BrowserProfile {
    /// `User-Agent` value.
    pub user_agent: &'static str,
    /// Engine family.
    pub family: BrowserFamily,
    /// `Sec-CH-UA` brand list (Chromium only).
    pub ch_ua: Option<&'static str>,
    /// `Sec-CH-UA-Platform` value (Chromium only).
    pub ch_platform: Option<&'static str>,
}

/// Pool of current desktop browser identities.
pub const BROWSER_PROFILES: &[BrowserProfile] = &[
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        family: BrowserFamily::Chromium,
        ch_ua: Some(r#""Google Chrome";v="131", "Chromium";v="131", "Not_A Brand";v="24""#),
        ch_platform: Some(r#""Windows""#),
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        family: BrowserFamily::Chromium,
        ch_ua: Some(r#""Google Chrome";v="131", "Chromium";v="131", "Not_A Brand";v="24""#),
        ch_platform: Some(r#""macOS""#),
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        family: BrowserFamily::Chromium,
        ch_ua: Some(r#""Microsoft Edge";v="131", "Chromium";v="131", "Not_A Brand";v="24""#),
        ch_platform: Some(r#""Windows""#),
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
        family: BrowserFamily::Firefox,
        ch_ua: None,
        ch_platform: None,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
        family: BrowserFamily::Firefox,
        ch_ua: None,
        ch_platform: None,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
        family: BrowserFamily::Safari,
        ch_ua: None,
        ch_platform: None,
    },
];

/// Pick a browser identity at random.
pub fn pick_profile() -> &'static BrowserProfile {
    let index = rand::rng().random_range(0..BROWSER_PROFILES.len());
    &BROWSER_PROFILES[index]
}

/// Build the full header set a browser sends for a top-level navigation.
pub fn browser_headers(profile: &BrowserProfile) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(USER_AGENT, HeaderValue::from_static(profile.user_agent));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,application/rss+xml,application/atom+xml,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("none"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-user"),
        HeaderValue::from_static("?1"),
    );

    if profile.family == BrowserFamily::Chromium {
        if let Some(ch_ua) = profile.ch_ua {
            headers.insert(
                HeaderName::from_static("sec-ch-ua"),
                HeaderValue::from_static(ch_ua),
            );
        }
        headers.insert(
            HeaderName::from_static("sec-ch-ua-mobile"),
            HeaderValue::from_static("?0"),
        );
        if let Some(platform) = profile.ch_platform {
            headers.insert(
                HeaderName::from_static("sec-ch-ua-platform"),
                HeaderValue::from_static(platform),
            );
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_of(family: BrowserFamily) -> &'static BrowserProfile {
        BROWSER_PROFILES
            .iter()
            .find(|p| p.family == family)
            .unwrap()
    }

    #[test]
    fn test_pool_covers_all_families() {
        for family in [
            BrowserFamily::Chromium,
            BrowserFamily::Firefox,
            BrowserFamily::Safari,
        ] {
            assert!(BROWSER_PROFILES.iter().any(|p| p.family == family));
        }
    }

    #[test]
    fn test_chromium_profiles_have_client_hints() {
        for p in BROWSER_PROFILES
            .iter()
            .filter(|p| p.family == BrowserFamily::Chromium)
        {
            assert!(p.ch_ua.is_some());
            assert!(p.ch_platform.is_some());
        }
    }

    #[test]
    fn test_common_headers_present() {
        let headers = browser_headers(profile_of(BrowserFamily::Firefox));
        for name in [
            "user-agent",
            "accept",
            "accept-language",
            "accept-encoding",
            "connection",
            "upgrade-insecure-requests",
            "cache-control",
            "sec-fetch-dest",
            "sec-fetch-mode",
            "sec-fetch-site",
            "sec-fetch-user",
        ] {
            assert!(headers.contains_key(name), "missing {}", name);
        }
    }

    #[test]
    fn test_client_hints_only_for_chromium() {
        let chrome = browser_headers(profile_of(BrowserFamily::Chromium));
        assert!(chrome.contains_key("sec-ch-ua"));
        assert_eq!(chrome.get("sec-ch-ua-mobile").unwrap(), "?0");
        assert!(chrome.contains_key("sec-ch-ua-platform"));

        for family in [BrowserFamily::Firefox, BrowserFamily::Safari] {
            let headers = browser_headers(profile_of(family));
            assert!(!headers.contains_key("sec-ch-ua"));
            assert!(!headers.contains_key("sec-ch-ua-mobile"));
            assert!(!headers.contains_key("sec-ch-ua-platform"));
        }
    }

    #[test]
    fn test_pick_profile_from_pool() {
        for _ in 0..20 {
            let picked = pick_profile();
            assert!(BROWSER_PROFILES
                .iter()
                .any(|p| p.user_agent == picked.user_agent));
        }
    }
}
