use crate::error::Result;
use crate::types::{ApiRequest, ApiResponse};
use async_trait::async_trait;

/// Abstraction for network operations.
///
/// `fetch` sends exactly what it is given. URL resolution and credentials
/// are the dispatcher's job, so implementations stay dumb transports.
/// Non-2xx statuses are returned as `Ok`; the dispatcher maps them.
#[async_trait]
pub trait ApiNetwork: Send + Sync + 'static {
    async fn fetch(&self, url: &str, req: ApiRequest) -> Result<ApiResponse>;
}
