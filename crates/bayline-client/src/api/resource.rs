//! Shared CRUD table for one entity collection.

use serde::Serialize;
use serde_json::Value;

use crate::classify::ApiResult;
use crate::client::{MutationOutcome, RequestOptions, ShopClient};

/// Reads and writes under one collection path, e.g. `/api/auth/customers`.
///
/// Every successful write invalidates cached reads under the collection.
#[derive(Debug, Clone)]
pub(crate) struct Resource {
    client: ShopClient,
    base: &'static str,
}

impl Resource {
    pub(crate) fn new(client: ShopClient, base: &'static str) -> Self {
        Self { client, base }
    }

    pub(crate) fn client(&self) -> &ShopClient {
        &self.client
    }

    /// Item path; the id is encoded as a single path segment.
    pub(crate) fn path(&self, id: &str) -> String {
        format!("{}/{}", self.base, urlencoding::encode(id))
    }

    /// Cache pattern covering the collection and everything below it.
    pub(crate) fn invalidation(&self) -> String {
        format!("^{}", regex::escape(self.base))
    }

    fn write_options<B: Serialize + ?Sized>(&self, body: &B) -> ApiResult<RequestOptions> {
        Ok(RequestOptions::new()
            .json(body)?
            .invalidate(self.invalidation()))
    }

    pub(crate) async fn list(&self, params: &[(&str, &str)]) -> ApiResult<Value> {
        let options = RequestOptions::new().params(params.iter().copied());
        self.client.get(self.base, options).await
    }

    pub(crate) async fn get(&self, id: &str) -> ApiResult<Value> {
        self.client.get(&self.path(id), RequestOptions::new()).await
    }

    pub(crate) async fn get_sub(&self, id: &str, suffix: &str) -> ApiResult<Value> {
        let path = format!("{}/{}", self.path(id), suffix);
        self.client.get(&path, RequestOptions::new()).await
    }

    pub(crate) async fn create<B: Serialize + ?Sized>(
        &self,
        body: &B,
    ) -> ApiResult<MutationOutcome> {
        self.client.post(self.base, self.write_options(body)?).await
    }

    pub(crate) async fn update<B: Serialize + ?Sized>(
        &self,
        id: &str,
        body: &B,
    ) -> ApiResult<MutationOutcome> {
        self.client.put(&self.path(id), self.write_options(body)?).await
    }

    pub(crate) async fn delete(&self, id: &str) -> ApiResult<MutationOutcome> {
        let options = RequestOptions::new().invalidate(self.invalidation());
        self.client.delete(&self.path(id), options).await
    }

    pub(crate) async fn post_sub<B: Serialize + ?Sized>(
        &self,
        id: &str,
        suffix: &str,
        body: &B,
    ) -> ApiResult<MutationOutcome> {
        let path = format!("{}/{}", self.path(id), suffix);
        self.client.post(&path, self.write_options(body)?).await
    }

    pub(crate) async fn patch_sub<B: Serialize + ?Sized>(
        &self,
        id: &str,
        suffix: &str,
        body: &B,
    ) -> ApiResult<MutationOutcome> {
        let path = format!("{}/{}", self.path(id), suffix);
        self.client.patch(&path, self.write_options(body)?).await
    }
}
