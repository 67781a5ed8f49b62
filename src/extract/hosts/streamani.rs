//! streamani.net: `sources:` arrays inlined in the player scripts.

use async_trait::async_trait;
use scraper::Html;
use url::Url;

use super::{check_sandbox_output, SCRIPT};
use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};

pub struct Streamani;

/// Right-hand sides of every `sources:` line in scripts that mention a URL.
fn source_arrays(html: &str) -> Vec<String> {
    Html::parse_document(html)
        .select(&SCRIPT)
        .map(|el| el.text().collect::<String>())
        .filter(|text| text.contains("https://"))
        .flat_map(|text| {
            text.lines()
                .filter_map(|line| line.trim_start().strip_prefix("sources:"))
                .map(|rest| rest.trim().trim_end_matches(',').to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn payload(arrays: &[String]) -> String {
    format!(
        "const s = [{}].flat(); process.stdout.write(s[0].file);",
        arrays.join(",")
    )
}

#[async_trait]
impl HostHandler for Streamani {
    fn domain(&self) -> &'static str {
        "streamani.net"
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let page = ctx.http().fetch_text(url.as_str(), None).await?;
        let arrays = source_arrays(&page);
        if arrays.is_empty() {
            return Err(ExtractError::MissingElement("sources"));
        }

        let output = ctx.services().sandbox().run_js(&payload(&arrays), &[]).await?;
        MediaDescriptor::new(check_sandbox_output(&output)?)
            .map(|d| d.with_referer(url.as_str()))
            .ok_or(ExtractError::NoSources)
    }
}
