//! Fembed-style `/api/source/<id>` players (fembed-hd.com, embedsito.com).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{last_path_segment, origin, parse_quality};
use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};
use crate::http_client::xhr_headers;

/// One handler type, registered once per domain that serves the API.
pub struct FembedApi {
    domain: &'static str,
}

impl FembedApi {
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    success: bool,
    /// Source list on success, an error string otherwise.
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ApiFile {
    file: String,
    #[serde(default)]
    label: String,
}

fn best_file(body: &str) -> Result<String> {
    let response: ApiResponse = serde_json::from_str(body)?;
    if !response.success && !response.data.is_array() {
        return Err(ExtractError::NoSources);
    }
    let files: Vec<ApiFile> = serde_json::from_value(response.data)?;
    files
        .into_iter()
        .max_by_key(|f| parse_quality(&f.label).unwrap_or(0))
        .map(|f| f.file)
        .ok_or(ExtractError::NoSources)
}

#[async_trait]
impl HostHandler for FembedApi {
    fn domain(&self) -> &'static str {
        self.domain
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let id = last_path_segment(url).ok_or(ExtractError::MissingElement("file id"))?;
        let api = format!("{}/api/source/{}", origin(url), id);
        let host = url.host_str().unwrap_or(self.domain);

        let request = ctx
            .http()
            .post(&api)
            .headers(xhr_headers(url.as_str()))
            .form(&[("r", ""), ("d", host)]);
        let body = ctx.http().send(request).await?.text().await?;

        MediaDescriptor::new(best_file(&body)?)
            .map(|d| d.with_referer(url.as_str()))
            .ok_or(ExtractError::NoSources)
    }
}
