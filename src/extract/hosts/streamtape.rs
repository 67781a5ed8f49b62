//! streamtape.net: `robotlink` innerHTML is built by a string expression.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::{check_sandbox_output, find_script};
use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};

static ROBOTLINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"document\.getElementById\('robotlink'\)\.innerHTML\s*=\s*([^;]+)")
        .expect("static regex")
});

pub struct Streamtape;

fn link_expression(script: &str) -> Option<&str> {
    ROBOTLINK
        .captures(script)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

fn absolute(link: &str) -> String {
    match link.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => link.to_string(),
    }
}

#[async_trait]
impl HostHandler for Streamtape {
    fn domain(&self) -> &'static str {
        "streamtape.net"
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let page = ctx.http().fetch_text(url.as_str(), Some(url.as_str())).await?;
        let script = find_script(&page, "document.getElementById('robotlink')")
            .ok_or(ExtractError::MissingElement("robotlink script"))?;
        let expr = link_expression(&script).ok_or(ExtractError::MissingElement("robotlink"))?;

        let payload = format!("const url = {expr}; process.stdout.write(url);");
        let output = ctx.services().sandbox().run_js(&payload, &[]).await?;
        let link = absolute(check_sandbox_output(&output)?);

        MediaDescriptor::new(link)
            .map(|d| d.with_referer(url.as_str()))
            .ok_or(ExtractError::NoSources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_and_scheme() {
        let script = r"document.getElementById('ideoolink').innerHTML = 'x';
document.getElementById('robotlink').innerHTML = '//streamtape.net/get_video?id=1&expires=2'+ ('xcdtoken=abc').substring(2);";
        assert_eq!(
            link_expression(script),
            Some("'//streamtape.net/get_video?id=1&expires=2'+ ('xcdtoken=abc').substring(2)")
        );
        assert_eq!(absolute("//cdn.test/v"), "https://cdn.test/v");
        assert_eq!(absolute("https://cdn.test/v"), "https://cdn.test/v");
    }
}
