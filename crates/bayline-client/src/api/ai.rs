//! AI assistant API.

use serde::Serialize;
use serde_json::Value;

use crate::classify::ApiResult;
use crate::client::{MutationOutcome, RequestOptions, ShopClient};

/// AI assistant API client.
///
/// Chat and diagnostics are interactive, so they fail rather than queue when
/// offline. Creating an estimate from a diagnosis is an ordinary write.
pub struct AiApi {
    client: ShopClient,
}

impl AiApi {
    pub(crate) fn new(client: ShopClient) -> Self {
        Self { client }
    }

    pub async fn chat<B: Serialize + ?Sized>(&self, message: &B) -> ApiResult<Value> {
        let options = RequestOptions::new().json(message)?.no_queue();
        self.client.post("/api/ai/chat", options).await?.completed()
    }

    /// Run a diagnosis from symptoms and codes.
    pub async fn diagnostics<B: Serialize + ?Sized>(&self, request: &B) -> ApiResult<Value> {
        let options = RequestOptions::new()
            .json(request)?
            .no_queue()
            .invalidate("^/api/auth/ai/diagnostics");
        self.client.post("/api/ai/diagnostics", options).await?.completed()
    }

    pub async fn diagnostics_history(&self) -> ApiResult<Value> {
        self.client
            .get("/api/auth/ai/diagnostics/history", RequestOptions::new())
            .await
    }

    pub async fn create_estimate_from_diagnosis<B: Serialize + ?Sized>(
        &self,
        estimate: &B,
    ) -> ApiResult<MutationOutcome> {
        let options = RequestOptions::new()
            .json(estimate)?
            .invalidate("^/api/auth/estimates");
        self.client.post("/api/auth/estimates", options).await
    }
}
