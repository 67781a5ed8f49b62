use anyhow::Result;

use embed_dl::{default_registry, rank_urls};

pub fn cmd_rank(urls: Vec<String>) -> Result<()> {
    let registry = default_registry()?;
    for url in rank_urls(&registry, urls) {
        println!("{url}");
    }
    Ok(())
}
