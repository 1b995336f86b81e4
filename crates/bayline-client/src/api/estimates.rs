//! Estimates API.

use serde::Serialize;
use serde_json::Value;

use crate::api::resource::Resource;
use crate::classify::ApiResult;
use crate::client::{MutationOutcome, ShopClient};

/// Estimates API client.
pub struct EstimatesApi {
    resource: Resource,
}

impl EstimatesApi {
    pub(crate) fn new(client: ShopClient) -> Self {
        Self {
            resource: Resource::new(client, "/api/auth/estimates"),
        }
    }

    pub async fn list(&self, params: &[(&str, &str)]) -> ApiResult<Value> {
        self.resource.list(params).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Value> {
        self.resource.get(id).await
    }

    pub async fn create<B: Serialize + ?Sized>(&self, estimate: &B) -> ApiResult<MutationOutcome> {
        self.resource.create(estimate).await
    }

    pub async fn update<B: Serialize + ?Sized>(
        &self,
        id: &str,
        estimate: &B,
    ) -> ApiResult<MutationOutcome> {
        self.resource.update(id, estimate).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<MutationOutcome> {
        self.resource.delete(id).await
    }
}
