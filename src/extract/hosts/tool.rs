//! Hosts that yt-dlp already understands; we only ask it for the URL.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use url::Url;

use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};

pub struct YtDlpUrl {
    domain: &'static str,
}

impl YtDlpUrl {
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }
}

/// First non-empty line of `--get-url` output. Formats with separate
/// audio print a second line, which we do not use.
fn first_url(stdout: &str) -> Option<&str> {
    stdout.lines().map(str::trim).find(|l| !l.is_empty())
}

#[async_trait]
impl HostHandler for YtDlpUrl {
    fn domain(&self) -> &'static str {
        self.domain
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let program = ctx.services().ytdlp();
        debug!("Asking {} for {}", program.display(), url);

        let output = Command::new(&program)
            .arg("--get-url")
            .arg(url.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ExtractError::Tool(format!(
                "{} exited with {:?}: {}",
                program.display(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        first_url(&stdout)
            .and_then(MediaDescriptor::new)
            .map(|d| d.with_referer(url.as_str()))
            .ok_or(ExtractError::NoSources)
    }
}
