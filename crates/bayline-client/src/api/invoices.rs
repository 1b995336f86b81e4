//! Invoices API.
//!
//! Invoice totals are computed server-side; payloads pass through untouched.

use serde::Serialize;
use serde_json::Value;

use crate::api::resource::Resource;
use crate::classify::ApiResult;
use crate::client::{MutationOutcome, ShopClient};

/// Invoices API client.
pub struct InvoicesApi {
    resource: Resource,
}

impl InvoicesApi {
    pub(crate) fn new(client: ShopClient) -> Self {
        Self {
            resource: Resource::new(client, "/api/auth/invoices"),
        }
    }

    pub async fn list(&self, params: &[(&str, &str)]) -> ApiResult<Value> {
        self.resource.list(params).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Value> {
        self.resource.get(id).await
    }

    pub async fn create<B: Serialize + ?Sized>(&self, invoice: &B) -> ApiResult<MutationOutcome> {
        self.resource.create(invoice).await
    }

    pub async fn update<B: Serialize + ?Sized>(
        &self,
        id: &str,
        invoice: &B,
    ) -> ApiResult<MutationOutcome> {
        self.resource.update(id, invoice).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<MutationOutcome> {
        self.resource.delete(id).await
    }
}
