mod download;
mod hosts;
mod rank;
mod resolve;

use std::sync::Arc;

use anyhow::Result;

use embed_dl::{default_registry, Config, Dispatcher, Services};

pub use download::{cmd_download, DownloadArgs};
pub use hosts::cmd_hosts;
pub use rank::cmd_rank;
pub use resolve::cmd_resolve;

/// Production dispatcher over the built-in handlers.
fn dispatcher(config: Config) -> Result<Dispatcher> {
    let services = Arc::new(Services::from_config(config)?);
    Ok(Dispatcher::new(Arc::new(default_registry()?), services))
}
