use std::process::ExitCode;

use anyhow::Result;
use serde_json::json;

use embed_dl::Config;

use super::dispatcher;

pub async fn cmd_resolve(url: &str, referer: Option<&str>, as_json: bool) -> Result<ExitCode> {
    let dispatcher = dispatcher(Config::load()?)?;

    let Some(media) = dispatcher.resolve(url, referer).await else {
        eprintln!("❌ No stream found for {url}");
        return Ok(ExitCode::FAILURE);
    };

    if as_json {
        let value = json!({
            "url": media.url(),
            "referer": media.referer(),
            "headers": media.headers(),
            "post_process": media.after_download().is_some(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", media.url());
        if let Some(referer) = media.referer() {
            eprintln!("   Referer: {referer}");
        }
        for header in media.headers() {
            eprintln!("   {header}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
