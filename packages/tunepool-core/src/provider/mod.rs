//! Streaming provider integration: OAuth grants, devices, playback and search.

mod client;
mod http;
mod retry;
mod traits;
mod types;

pub use client::ProviderClient;
pub use http::{ProviderError, ProviderResult};
pub use traits::{ProviderApi, ProviderAuth, ProviderCatalog, ProviderPlayback};
pub use types::{Device, TokenGrant, TrackSummary};
