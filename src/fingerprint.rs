//! Browser-like request fingerprints.
//!
//! Share pages and their internal APIs reject obviously automated clients,
//! so both the HTTP fetcher and the headless browser present one of these
//! profiles.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Chrome build advertised by the desktop profile.
const CHROME_MAJOR: &str = "131";
const CHROME_FULL: &str = "131.0.0.0";

/// Header set presented to share hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub accept_encoding: String,
    pub sec_ch_ua: String,
    pub sec_ch_ua_mobile: String,
    pub sec_ch_ua_platform: String,
    pub mobile: bool,
}

/// Desktop Chrome on macOS, the default for every platform.
#[must_use]
pub fn desktop_chrome() -> BrowserProfile {
    let user_agent = format!(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{CHROME_FULL} Safari/537.36"
    );
    let brands = [
        format!("\"Google Chrome\";v=\"{CHROME_MAJOR}\""),
        format!("\"Chromium\";v=\"{CHROME_MAJOR}\""),
        "\"Not_A Brand\";v=\"24\"".to_string(),
    ];

    BrowserProfile {
        user_agent,
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8".to_string(),
        accept_language: "en-US,en;q=0.9".to_string(),
        accept_encoding: "gzip, deflate, br, zstd".to_string(),
        sec_ch_ua: brands.join(", "),
        sec_ch_ua_mobile: "?0".to_string(),
        sec_ch_ua_platform: "\"macOS\"".to_string(),
        mobile: false,
    }
}

/// Mobile Safari on iOS. Gemini share pages render more reliably for it.
#[must_use]
pub fn mobile_safari() -> BrowserProfile {
    BrowserProfile {
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1".to_string(),
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        accept_language: "en-US,en;q=0.9".to_string(),
        // Safari doesn't support zstd yet
        accept_encoding: "gzip, deflate, br".to_string(),
        // Safari doesn't send Sec-CH-UA headers
        sec_ch_ua: String::new(),
        sec_ch_ua_mobile: String::new(),
        sec_ch_ua_platform: String::new(),
        mobile: true,
    }
}

impl BrowserProfile {
    /// Replace the advertised user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Replace the `Accept` header (JSON endpoints want `application/json`).
    #[must_use]
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }

    /// Header name/value pairs in the order a browser sends them.
    #[must_use]
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Accept".to_string(), self.accept.clone()),
            ("Accept-Language".to_string(), self.accept_language.clone()),
            ("Accept-Encoding".to_string(), self.accept_encoding.clone()),
        ];

        // Sec-CH-UA headers for Chrome only
        if !self.sec_ch_ua.is_empty() {
            pairs.push(("Sec-CH-UA".to_string(), self.sec_ch_ua.clone()));
            pairs.push(("Sec-CH-UA-Mobile".to_string(), self.sec_ch_ua_mobile.clone()));
            pairs.push(("Sec-CH-UA-Platform".to_string(), self.sec_ch_ua_platform.clone()));
        }

        pairs.push(("DNT".to_string(), "1".to_string()));
        pairs.push(("Upgrade-Insecure-Requests".to_string(), "1".to_string()));
        pairs
    }

    /// Headers suitable for `Network.setExtraHTTPHeaders`: everything except
    /// the user agent, which the browser overrides separately.
    #[must_use]
    pub fn extra_browser_headers(&self) -> Vec<(String, String)> {
        self.header_pairs()
            .into_iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("User-Agent"))
            .collect()
    }
}

/// Convert header pairs into a reqwest `HeaderMap`, skipping invalid entries.
#[must_use]
pub fn to_header_map(pairs: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid header"),
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{ACCEPT, USER_AGENT};

    #[test]
    fn chrome_profile_sends_client_hints() {
        let profile = desktop_chrome();
        assert!(profile.user_agent.contains("Chrome/131"));
        assert!(!profile.mobile);
        let names: Vec<_> = profile.header_pairs().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"Sec-CH-UA".to_string()));
    }

    #[test]
    fn safari_profile_is_mobile_without_client_hints() {
        let profile = mobile_safari();
        assert!(profile.user_agent.contains("iPhone"));
        assert!(profile.mobile);
        assert!(profile
            .header_pairs()
            .iter()
            .all(|(n, _)| !n.starts_with("Sec-CH-UA")));
    }

    #[test]
    fn header_map_conversion() {
        let profile = desktop_chrome().with_accept("application/json");
        let headers = to_header_map(&profile.header_pairs());
        assert!(headers.contains_key(USER_AGENT));
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
    }

    #[test]
    fn invalid_headers_are_skipped() {
        let pairs = vec![
            ("Bad Header".to_string(), "x".to_string()),
            ("X-Ok".to_string(), "fine".to_string()),
        ];
        let headers = to_header_map(&pairs);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn browser_headers_exclude_user_agent() {
        let extra = desktop_chrome().extra_browser_headers();
        assert!(extra.iter().all(|(n, _)| n != "User-Agent"));
        assert!(extra.iter().any(|(n, _)| n == "Accept-Language"));
    }
}
