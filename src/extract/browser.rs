//! Manifest capture through a headless Chromium.
//!
//! Some players only request their HLS manifest after real script execution
//! and a click on the play control. We load the page, click, and watch
//! outgoing requests until one's path ends with the wanted suffix.
//!
//! Each navigate+click attempt is bounded by a timeout and the number of
//! attempts is capped, so a page that never plays fails instead of spinning.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::BrowserSettings;
use crate::error::{ExtractError, Result};
use crate::fingerprint::BrowserProfile;

/// Selector of the play button in JW Player based embeds.
pub const PLAY_BUTTON: &str = r#"#mediaplayer [aria-label="Play"]"#;

/// A request observed by the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    pub url: String,
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
    pub referer: Option<String>,
}

impl CapturedRequest {
    /// Downloader header lines carrying the browser's own user agent and
    /// language, falling back to `profile` for whichever was not sent.
    pub fn downloader_headers(&self, profile: &BrowserProfile, origin: &str) -> Vec<String> {
        let mut profile = profile.clone();
        if let Some(ua) = &self.user_agent {
            profile.user_agent.clone_from(ua);
        }
        if let Some(lang) = &self.accept_language {
            profile.accept_language.clone_from(lang);
        }
        profile.downloader_headers(Some(origin))
    }
}

/// What to load and what to wait for.
#[derive(Debug, Clone)]
pub struct CaptureTarget<'a> {
    pub page_url: &'a str,
    pub referer: Option<&'a str>,
    /// Matched against the request URL's path.
    pub path_suffix: &'a str,
    pub click_selector: &'a str,
}

/// `true` if `request_url`'s path ends with `suffix`.
pub fn path_matches(request_url: &str, suffix: &str) -> bool {
    Url::parse(request_url).is_ok_and(|u| u.path().ends_with(suffix))
}

fn header(headers: &Value, name: &str) -> Option<String> {
    headers.as_object()?.iter().find_map(|(k, v)| {
        if k.eq_ignore_ascii_case(name) {
            v.as_str().map(str::to_string)
        } else {
            None
        }
    })
}

fn browser_err<E: std::fmt::Display>(e: E) -> ExtractError {
    ExtractError::Browser(e.to_string())
}

/// Launches Chromium per capture and tears it down afterwards.
#[derive(Debug, Clone)]
pub struct ManifestCapture {
    settings: BrowserSettings,
}

impl ManifestCapture {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder();
        if let Some(path) = &self.settings.executable {
            builder = builder.chrome_executable(PathBuf::from(path));
        }
        builder.build().map_err(ExtractError::Browser)
    }

    /// Attempts per capture; the page is always tried at least once.
    fn attempts(&self) -> u32 {
        self.settings.max_attempts.max(1)
    }

    /// Run the capture loop. Launch failures and exhausted attempts are
    /// both extraction failures.
    pub async fn capture(&self, target: &CaptureTarget<'_>) -> Result<CapturedRequest> {
        let (mut browser, mut handler) = Browser::launch(self.config()?).await.map_err(browser_err)?;
        let driver = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let result = self.capture_in(&browser, target).await;

        if let Err(e) = browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        let _ = browser.wait().await;
        driver.abort();
        result
    }

    async fn capture_in(&self, browser: &Browser, target: &CaptureTarget<'_>) -> Result<CapturedRequest> {
        let page = browser.new_page("about:blank").await.map_err(browser_err)?;
        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(browser_err)?;

        let attempt_timeout = Duration::from_secs(self.settings.attempt_timeout_secs);
        for attempt in 1..=self.attempts() {
            debug!(attempt, url = target.page_url, "Loading page for capture");

            let wait = async {
                self.navigate_and_click(&page, target).await;
                while let Some(event) = requests.next().await {
                    if path_matches(&event.request.url, target.path_suffix) {
                        let headers = event.request.headers.inner();
                        return Some(CapturedRequest {
                            url: event.request.url.clone(),
                            user_agent: header(headers, "user-agent"),
                            accept_language: header(headers, "accept-language"),
                            referer: header(headers, "referer"),
                        });
                    }
                }
                None
            };

            match tokio::time::timeout(attempt_timeout, wait).await {
                Ok(Some(found)) => {
                    info!("Captured manifest request: {}", found.url);
                    return Ok(found);
                }
                Ok(None) => return Err(ExtractError::Browser("request stream ended".into())),
                Err(_) => warn!(attempt, "No manifest request before timeout"),
            }
        }

        Err(ExtractError::Browser(format!(
            "no request ending in {} after {} attempts",
            target.path_suffix,
            self.attempts()
        )))
    }

    /// Navigation and click errors are expected while the player boots;
    /// the request observer decides success.
    async fn navigate_and_click(&self, page: &Page, target: &CaptureTarget<'_>) {
        let mut params = NavigateParams::builder().url(target.page_url);
        if let Some(referer) = target.referer {
            params = params.referrer(referer);
        }
        match params.build() {
            Ok(params) => {
                if let Err(e) = page.goto(params).await {
                    debug!("Navigation error: {}", e);
                }
            }
            Err(e) => debug!("Bad navigate params: {}", e),
        }

        let click = async {
            page.find_element(target.click_selector).await?.click().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        let click_timeout = Duration::from_secs(self.settings.click_timeout_secs);
        match tokio::time::timeout(click_timeout, click).await {
            Ok(Ok(())) => debug!("Clicked {}", target.click_selector),
            Ok(Err(e)) => debug!("Click failed: {}", e),
            Err(_) => debug!("Click timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_matched_on_path_only() {
        assert!(path_matches("https://cdn.test/hls/master.m3u8", "master.m3u8"));
        assert!(path_matches("https://cdn.test/hls/index.m3u8?token=1", ".m3u8"));
        assert!(!path_matches("https://cdn.test/player.js?src=a.m3u8", ".m3u8"));
        assert!(!path_matches("not a url", ".m3u8"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let headers = serde_json::json!({
            "User-Agent": "Mozilla/5.0 Test",
            "accept-language": "en-US,en;q=0.9"
        });
        assert_eq!(header(&headers, "user-agent").as_deref(), Some("Mozilla/5.0 Test"));
        assert_eq!(header(&headers, "Accept-Language").as_deref(), Some("en-US,en;q=0.9"));
        assert_eq!(header(&headers, "referer"), None);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let capture = ManifestCapture::new(BrowserSettings {
            max_attempts: 0,
            ..BrowserSettings::default()
        });
        assert_eq!(capture.attempts(), 1);
    }

    #[test]
    fn captured_headers_override_profile() {
        let captured = CapturedRequest {
            url: "https://cdn.test/master.m3u8".into(),
            user_agent: Some("Captured/1.0".into()),
            accept_language: None,
            referer: None,
        };
        let profile = crate::fingerprint::firefox_profile();
        let lines = captured.downloader_headers(&profile, "https://watchsb.com");
        assert_eq!(lines[0], "Accept: */*");
        assert_eq!(lines[1], format!("Accept-Language: {}", profile.accept_language));
        assert_eq!(lines[2], "Origin: https://watchsb.com");
        assert_eq!(lines[3], "User-Agent: Captured/1.0");
    }
}
