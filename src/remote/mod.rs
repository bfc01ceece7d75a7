pub mod backoff;
pub mod client;
pub mod head;

pub use backoff::backoff_delay;
pub use client::*;
pub use head::{annotate_head_status, check_url_status, create_head_client};

use async_trait::async_trait;

use crate::common::{Capability, Payload};
use crate::error::RemoteError;
use crate::validation::ParsedPurl;

/// Anything that can answer a capability query for one PURL.
/// [`RemoteClient`] is the HTTP implementation; tests substitute their own.
#[async_trait]
pub trait PurlService: Send + Sync {
    async fn fetch(&self, capability: Capability, purl: &ParsedPurl) -> Result<Payload, RemoteError>;
}
