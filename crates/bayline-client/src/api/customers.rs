//! Customers API.

use serde::Serialize;
use serde_json::Value;

use crate::api::resource::Resource;
use crate::classify::ApiResult;
use crate::client::{MutationOutcome, RequestOptions, ShopClient};

const BASE: &str = "/api/auth/customers";

/// Customers API client.
pub struct CustomersApi {
    resource: Resource,
}

impl CustomersApi {
    pub(crate) fn new(client: ShopClient) -> Self {
        Self {
            resource: Resource::new(client, BASE),
        }
    }

    /// List customers, optionally filtered by query parameters.
    pub async fn list(&self, params: &[(&str, &str)]) -> ApiResult<Value> {
        self.resource.list(params).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Value> {
        self.resource.get(id).await
    }

    pub async fn create<B: Serialize + ?Sized>(&self, customer: &B) -> ApiResult<MutationOutcome> {
        self.resource.create(customer).await
    }

    pub async fn update<B: Serialize + ?Sized>(
        &self,
        id: &str,
        customer: &B,
    ) -> ApiResult<MutationOutcome> {
        self.resource.update(id, customer).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<MutationOutcome> {
        self.resource.delete(id).await
    }

    /// Vehicles owned by a customer.
    pub async fn vehicles(&self, id: &str) -> ApiResult<Value> {
        self.resource.get_sub(id, "vehicles").await
    }

    /// Free-text customer search.
    pub async fn search(&self, query: &str) -> ApiResult<Value> {
        let options = RequestOptions::new().param("q", query);
        self.resource
            .client()
            .get(&format!("{}/search", BASE), options)
            .await
    }
}
