//! Vehicles API.

use serde::Serialize;
use serde_json::Value;

use crate::api::resource::Resource;
use crate::classify::ApiResult;
use crate::client::{MutationOutcome, RequestOptions, ShopClient};

const BASE: &str = "/api/auth/vehicles";

/// Vehicles API client.
pub struct VehiclesApi {
    resource: Resource,
}

impl VehiclesApi {
    pub(crate) fn new(client: ShopClient) -> Self {
        Self {
            resource: Resource::new(client, BASE),
        }
    }

    pub async fn list(&self, params: &[(&str, &str)]) -> ApiResult<Value> {
        self.resource.list(params).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Value> {
        self.resource.get(id).await
    }

    pub async fn create<B: Serialize + ?Sized>(&self, vehicle: &B) -> ApiResult<MutationOutcome> {
        self.resource.create(vehicle).await
    }

    pub async fn update<B: Serialize + ?Sized>(
        &self,
        id: &str,
        vehicle: &B,
    ) -> ApiResult<MutationOutcome> {
        self.resource.update(id, vehicle).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<MutationOutcome> {
        self.resource.delete(id).await
    }

    /// Decode a VIN into vehicle details.
    pub async fn vin_lookup(&self, vin: &str) -> ApiResult<Value> {
        let vin = vin.trim().to_uppercase();
        let path = format!("{}/vin-lookup/{}", BASE, urlencoding::encode(&vin));
        self.resource.client().get(&path, RequestOptions::new()).await
    }
}
