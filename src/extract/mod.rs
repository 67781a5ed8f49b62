//! Embed page resolution.
//!
//! A [`HostRegistry`] maps hostnames to [`HostHandler`]s; the
//! [`Dispatcher`] picks the handler for a URL and turns any failure into
//! `None`, so a caller can walk a list of candidate sources without
//! caring why one of them did not work.
//!
//! ```no_run
//! use std::sync::Arc;
//! use embed_dl::config::Config;
//! use embed_dl::extract::{default_registry, Dispatcher, Services};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let services = Arc::new(Services::from_config(Config::default())?);
//! let dispatcher = Dispatcher::new(Arc::new(default_registry()?), services);
//! if let Some(media) = dispatcher.resolve("https://mixdrop.co/e/abc", None).await {
//!     println!("{}", media.url());
//! }
//! # Ok(())
//! # }
//! ```

pub mod browser;
mod descriptor;
mod handler;
pub mod hosts;
pub mod ranking;
mod registry;
mod services;

pub use browser::ManifestCapture;
pub use descriptor::{MediaDescriptor, PostProcess};
pub use handler::{ExtractContext, HostHandler};
pub use hosts::default_registry;
pub use ranking::{order_by_type, rank, rank_urls, DownloadSite};
pub use registry::{Dispatcher, HostRegistry, RegistryBuilder};
pub use services::Services;
