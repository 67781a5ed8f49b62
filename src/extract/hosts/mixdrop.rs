//! mixdrop.co: the player script assigns `MDCore.wurl`; we run it with an
//! empty `MDCore` object and print the result.

use async_trait::async_trait;
use url::Url;

use super::{check_sandbox_output, find_script};
use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};

pub struct Mixdrop;

fn payload(script: &str) -> String {
    format!("const MDCore = {{}}; {script}; process.stdout.write(`https:${{MDCore.wurl}}`);")
}

#[async_trait]
impl HostHandler for Mixdrop {
    fn domain(&self) -> &'static str {
        "mixdrop.co"
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let page = ctx.http().fetch_text(url.as_str(), None).await?;
        let script =
            find_script(&page, "MDCore.ref").ok_or(ExtractError::MissingElement("MDCore script"))?;

        let output = ctx.services().sandbox().run_js(&payload(&script), &[]).await?;
        let stream = check_sandbox_output(&output)?;

        MediaDescriptor::new(stream)
            .map(|d| d.with_referer(url.as_str()))
            .ok_or(ExtractError::NoSources)
    }
}
