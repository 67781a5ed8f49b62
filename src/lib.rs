//! `embed-dl` - resolve video-host embed pages to direct media streams
//!
//! # Features
//!
//! - **Host handlers**: one per embed site, covering packed scripts,
//!   CryptoJS-encrypted payloads and browser-observed manifests
//! - **Dispatch**: hostname registry with mirror aliases; every handler
//!   failure collapses to "no result"
//! - **Ranking**: candidate sources ordered by handler priority
//! - **Download**: yt-dlp with stall detection, subtitle and chapter remux
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use embed_dl::{default_registry, Config, Dispatcher, Services};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let services = Arc::new(Services::from_config(Config::load()?)?);
//!     let dispatcher = Dispatcher::new(Arc::new(default_registry()?), services);
//!     match dispatcher.resolve("https://streamtape.net/e/abc", None).await {
//!         Some(media) => println!("{}", media.url()),
//!         None => eprintln!("no stream"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod deobfuscator;
pub mod download;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod http_client;
pub mod retry;
pub mod sandbox;

pub use config::Config;
pub use download::{DownloadBackend, Orchestrator, YtDlpBackend};
pub use error::{DownloadError, ExtractError, RegistryError, RemuxError};
pub use extract::{
    default_registry, order_by_type, rank, rank_urls, Dispatcher, DownloadSite, HostHandler,
    HostRegistry, MediaDescriptor, Services,
};
pub use fingerprint::{chrome_profile, firefox_profile, random_profile, BrowserProfile};
pub use http_client::HostClient;
pub use retry::{send_with_retry, RetryPolicy};
pub use sandbox::{CodeRunner, PistonRunner};

/// Version of embed-dl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
