//! Network and persistence seams for the confirmations client.
//!
//! Every outbound HTTP call goes through the [`UrlLoader`] trait and every
//! durable write through [`StateStore`], so the protocol crates stay
//! testable without sockets or disk.

pub mod config;
pub mod error;
pub mod http_client;
pub mod state_store;
pub mod url_loader;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::{Config, DEFAULT_BASE_URL};
pub use error::{NetError, Result};
pub use http_client::HttpClient;
pub use state_store::{FileStateStore, StateStore};
pub use url_loader::{UrlLoader, UrlMethod, UrlRequest, UrlResponse};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockUrlLoader;
#[cfg(any(test, feature = "test-utils"))]
pub use state_store::MemoryStateStore;
