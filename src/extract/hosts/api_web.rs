//! play.api-web.site: `POST /src.php` with the page's `id` query value.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::origin;
use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};

pub struct ApiWeb;

#[derive(Debug, Deserialize)]
struct SrcResponse {
    #[serde(default)]
    url: Vec<SrcEntry>,
}

#[derive(Debug, Deserialize)]
struct SrcEntry {
    src: String,
    /// Number or numeric string depending on the server.
    #[serde(default)]
    size: Value,
}

impl SrcEntry {
    fn size(&self) -> u64 {
        match &self.size {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }
}

fn largest(body: &str) -> Result<String> {
    let response: SrcResponse = serde_json::from_str(body)?;
    response
        .url
        .into_iter()
        .max_by_key(SrcEntry::size)
        .map(|e| e.src)
        .ok_or(ExtractError::NoSources)
}

#[async_trait]
impl HostHandler for ApiWeb {
    fn domain(&self) -> &'static str {
        "play.api-web.site"
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let id = url
            .query_pairs()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.into_owned())
            .ok_or(ExtractError::MissingElement("id query parameter"))?;

        let api = format!("{}/src.php", origin(url));
        let request = ctx.http().post(&api).form(&[("id", id.as_str())]);
        let body = ctx.http().send(request).await?.text().await?;

        MediaDescriptor::new(largest(&body)?)
            .map(|d| d.with_referer(url.as_str()))
            .ok_or(ExtractError::NoSources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn largest_size_wins_with_mixed_types() {
        let body = r#"{"url":[
            {"src":"https://v.test/360.mp4","size":360},
            {"src":"https://v.test/1080.mp4","size":"1080"},
            {"src":"https://v.test/720.mp4","size":720}
        ]}"#;
        assert_eq!(largest(body).unwrap(), "https://v.test/1080.mp4");
    }

    #[test]
    fn empty_list_has_no_sources() {
        assert!(matches!(largest(r#"{"url":[]}"#), Err(ExtractError::NoSources)));
    }
}
