//! Jobs API.

use serde::Serialize;
use serde_json::Value;

use crate::api::resource::Resource;
use crate::classify::ApiResult;
use crate::client::{MutationOutcome, ShopClient};
use crate::types::JobStatusUpdate;

/// Jobs API client.
pub struct JobsApi {
    resource: Resource,
}

impl JobsApi {
    pub(crate) fn new(client: ShopClient) -> Self {
        Self {
            resource: Resource::new(client, "/api/auth/jobs"),
        }
    }

    /// List jobs, e.g. `&[("status", "open")]`.
    pub async fn list(&self, params: &[(&str, &str)]) -> ApiResult<Value> {
        self.resource.list(params).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Value> {
        self.resource.get(id).await
    }

    pub async fn create<B: Serialize + ?Sized>(&self, job: &B) -> ApiResult<MutationOutcome> {
        self.resource.create(job).await
    }

    pub async fn update<B: Serialize + ?Sized>(
        &self,
        id: &str,
        job: &B,
    ) -> ApiResult<MutationOutcome> {
        self.resource.update(id, job).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<MutationOutcome> {
        self.resource.delete(id).await
    }

    /// Move a job to a new workflow status.
    pub async fn update_status(
        &self,
        id: &str,
        update: &JobStatusUpdate,
    ) -> ApiResult<MutationOutcome> {
        self.resource.patch_sub(id, "status", update).await
    }

    /// Attach parts to a job.
    pub async fn add_parts<B: Serialize + ?Sized>(
        &self,
        id: &str,
        parts: &B,
    ) -> ApiResult<MutationOutcome> {
        self.resource.post_sub(id, "parts", parts).await
    }

    /// Attach labor lines to a job.
    pub async fn add_labor<B: Serialize + ?Sized>(
        &self,
        id: &str,
        labor: &B,
    ) -> ApiResult<MutationOutcome> {
        self.resource.post_sub(id, "labor", labor).await
    }
}
