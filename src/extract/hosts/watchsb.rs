//! watchsb.com: the HLS manifest only appears after the player runs, so
//! it is captured from a headless browser.

use async_trait::async_trait;
use url::Url;

use super::origin;
use crate::error::{ExtractError, Result};
use crate::extract::browser::{CaptureTarget, ManifestCapture, PLAY_BUTTON};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};

pub struct Watchsb;

#[async_trait]
impl HostHandler for Watchsb {
    fn domain(&self) -> &'static str {
        "watchsb.com"
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let capture = ManifestCapture::new(ctx.services().config().browser.clone());
        let found = capture
            .capture(&CaptureTarget {
                page_url: url.as_str(),
                referer: None,
                path_suffix: ".m3u8",
                click_selector: PLAY_BUTTON,
            })
            .await?;

        let origin = origin(url);
        let headers = found.downloader_headers(ctx.http().profile(), &origin);
        MediaDescriptor::new(found.url)
            .map(|d| d.with_referer(format!("{origin}/")).with_headers(headers))
            .ok_or(ExtractError::NoSources)
    }
}
