//! Data migration API.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::classify::ApiResult;
use crate::client::{RequestOptions, ShopClient};
use crate::transport::FilePart;

/// Data migration API client.
pub struct MigrationApi {
    client: ShopClient,
}

impl MigrationApi {
    pub(crate) fn new(client: ShopClient) -> Self {
        Self { client }
    }

    /// Upload an export file from another shop system for analysis.
    pub async fn analyze(
        &self,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> ApiResult<Value> {
        let file = FilePart {
            field: "file".to_string(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        };
        self.client
            .upload("/api/migration/analyze", vec![file], RequestOptions::new())
            .await
    }

    /// Import analyzed data. Clears the whole cache on success.
    pub async fn import<B: Serialize + ?Sized>(&self, data: &B) -> ApiResult<Value> {
        let options = RequestOptions::new().json(data)?.no_queue();
        let result = self
            .client
            .post("/api/migration/import", options)
            .await?
            .completed()?;
        self.client.cache().clear();
        info!("Migration imported, cache cleared");
        Ok(result)
    }
}
