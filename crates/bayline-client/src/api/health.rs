//! Health API.

use crate::classify::ApiResult;
use crate::client::{RequestOptions, ShopClient};
use crate::transport::RequestClass;
use crate::types::HealthResponse;

/// Health API client.
///
/// Health checks use the short health timeout and are never cached. A 404
/// from the health endpoint is logged at debug level only.
pub struct HealthApi {
    client: ShopClient,
}

impl HealthApi {
    pub(crate) fn new(client: ShopClient) -> Self {
        Self { client }
    }

    pub async fn check(&self) -> ApiResult<HealthResponse> {
        let options = RequestOptions::new()
            .no_cache()
            .class(RequestClass::Health);
        self.client.get_as("/api/health", options).await
    }

    /// Simple connectivity check - returns true if server is reachable.
    pub async fn is_healthy(&self) -> bool {
        self.check().await.is_ok()
    }
}
