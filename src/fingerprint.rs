//! Browser fingerprints for embed-host requests.
//!
//! Hosts reject clients that do not look like a desktop browser. A
//! [`BrowserProfile`] bundles a consistent User-Agent / Accept-Language /
//! client-hint set; the same values are forwarded to the downloader so the
//! CDN sees the browser that resolved the stream.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, USER_AGENT,
};

const CHROME_VERSIONS: &[(&str, &str)] = &[
    ("131", "131.0.0.0"),
    ("132", "132.0.0.0"),
    ("133", "133.0.0.0"),
    ("134", "134.0.0.0"),
];

const FIREFOX_VERSIONS: &[&str] = &["133.0", "134.0", "135.0"];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "en-US,en;q=0.9,de;q=0.8",
    "en-US,en;q=0.9,fr;q=0.8",
    "en-US,en;q=0.9,ja;q=0.8",
];

/// Browser profile with realistic fingerprint
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub accept_encoding: String,
    /// Empty for browsers that do not send client hints.
    pub sec_ch_ua: String,
    pub sec_ch_ua_platform: String,
}

#[derive(Debug, Clone, Copy)]
enum Platform {
    MacOS,
    Windows,
    Linux,
}

impl Platform {
    fn random() -> Self {
        let roll: f32 = rand::thread_rng().gen();
        if roll < 0.65 {
            Platform::Windows
        } else if roll < 0.85 {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    fn os_string(self) -> &'static str {
        match self {
            Platform::MacOS => "Macintosh; Intel Mac OS X 10_15_7",
            Platform::Windows => "Windows NT 10.0; Win64; x64",
            Platform::Linux => "X11; Linux x86_64",
        }
    }

    fn sec_ch_platform(self) -> &'static str {
        match self {
            Platform::MacOS => "\"macOS\"",
            Platform::Windows => "\"Windows\"",
            Platform::Linux => "\"Linux\"",
        }
    }
}

fn pick<'a, T: ?Sized>(items: &'a [&'a T], fallback: &'a T) -> &'a T {
    items
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(fallback)
}

/// Generate a realistic Chrome browser profile
#[must_use]
pub fn chrome_profile() -> BrowserProfile {
    let platform = Platform::random();
    let (major, full) = CHROME_VERSIONS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(("134", "134.0.0.0"));

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{full} Safari/537.36",
            platform.os_string()
        ),
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8".to_string(),
        accept_language: pick(ACCEPT_LANGUAGES, "en-US,en;q=0.9").to_string(),
        accept_encoding: "gzip, deflate, br, zstd".to_string(),
        sec_ch_ua: format!(
            "\"Google Chrome\";v=\"{major}\", \"Chromium\";v=\"{major}\", \"Not_A Brand\";v=\"24\""
        ),
        sec_ch_ua_platform: platform.sec_ch_platform().to_string(),
    }
}

/// Generate a realistic Firefox browser profile
#[must_use]
pub fn firefox_profile() -> BrowserProfile {
    let platform = Platform::random();
    let version = pick(FIREFOX_VERSIONS, "135.0");

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({}; rv:{version}) Gecko/20100101 Firefox/{version}",
            platform.os_string()
        ),
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        accept_language: pick(ACCEPT_LANGUAGES, "en-US,en;q=0.9").to_string(),
        accept_encoding: "gzip, deflate, br, zstd".to_string(),
        sec_ch_ua: String::new(),
        sec_ch_ua_platform: String::new(),
    }
}

/// Random profile, weighted towards Chrome.
#[must_use]
pub fn random_profile() -> BrowserProfile {
    if rand::thread_rng().gen_bool(0.75) {
        chrome_profile()
    } else {
        firefox_profile()
    }
}

impl BrowserProfile {
    /// Convert profile to reqwest `HeaderMap`.
    ///
    /// Values that are not valid header text are skipped.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let mut put = |name: HeaderName, value: &str| {
            if value.is_empty() {
                return;
            }
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(name, value);
            }
        };

        put(USER_AGENT, &self.user_agent);
        put(ACCEPT, &self.accept);
        put(ACCEPT_LANGUAGE, &self.accept_language);
        put(ACCEPT_ENCODING, &self.accept_encoding);
        put(HeaderName::from_static("sec-ch-ua"), &self.sec_ch_ua);
        if !self.sec_ch_ua.is_empty() {
            put(HeaderName::from_static("sec-ch-ua-mobile"), "?0");
        }
        put(
            HeaderName::from_static("sec-ch-ua-platform"),
            &self.sec_ch_ua_platform,
        );

        headers
    }

    /// `Name: value` lines forwarded to the downloader alongside a stream.
    pub fn downloader_headers(&self, origin: Option<&str>) -> Vec<String> {
        let mut lines = vec![
            "Accept: */*".to_string(),
            format!("Accept-Language: {}", self.accept_language),
        ];
        if let Some(origin) = origin {
            lines.push(format!("Origin: {origin}"));
        }
        lines.push(format!("User-Agent: {}", self.user_agent));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_sends_client_hints() {
        let profile = chrome_profile();
        assert!(profile.user_agent.contains("Chrome/"));
        let headers = profile.to_headers();
        assert!(headers.contains_key("sec-ch-ua"));
        assert_eq!(headers.get("sec-ch-ua-mobile").unwrap(), "?0");
    }

    #[test]
    fn firefox_omits_client_hints() {
        let profile = firefox_profile();
        assert!(profile.user_agent.contains("Firefox/"));
        let headers = profile.to_headers();
        assert!(headers.contains_key(USER_AGENT));
        assert!(!headers.contains_key("sec-ch-ua"));
        assert!(!headers.contains_key("sec-ch-ua-platform"));
    }

    #[test]
    fn downloader_headers_keep_fixed_order() {
        let profile = firefox_profile();
        let lines = profile.downloader_headers(Some("https://watchsb.com"));
        assert_eq!(lines[0], "Accept: */*");
        assert!(lines[1].starts_with("Accept-Language: "));
        assert_eq!(lines[2], "Origin: https://watchsb.com");
        assert!(lines[3].starts_with("User-Agent: Mozilla/5.0"));
    }
}
