//! Appointments API.

use serde::Serialize;
use serde_json::Value;

use crate::api::resource::Resource;
use crate::classify::ApiResult;
use crate::client::{MutationOutcome, ShopClient};

/// Appointments API client.
pub struct AppointmentsApi {
    resource: Resource,
}

impl AppointmentsApi {
    pub(crate) fn new(client: ShopClient) -> Self {
        Self {
            resource: Resource::new(client, "/api/auth/appointments"),
        }
    }

    /// List appointments, e.g. `&[("date", "2026-10-18")]`.
    pub async fn list(&self, params: &[(&str, &str)]) -> ApiResult<Value> {
        self.resource.list(params).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Value> {
        self.resource.get(id).await
    }

    pub async fn create<B: Serialize + ?Sized>(
        &self,
        appointment: &B,
    ) -> ApiResult<MutationOutcome> {
        self.resource.create(appointment).await
    }

    pub async fn update<B: Serialize + ?Sized>(
        &self,
        id: &str,
        appointment: &B,
    ) -> ApiResult<MutationOutcome> {
        self.resource.update(id, appointment).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<MutationOutcome> {
        self.resource.delete(id).await
    }
}
