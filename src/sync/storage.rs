use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{BlobStore, SyncError};

/// Supabase Storage 客户端
pub struct SupabaseStorage {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("storage http client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for SupabaseStorage {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), SyncError> {
        let response = self
            .http
            .post(format!("{}/storage/v1/bucket", self.base_url))
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({
                "id": bucket,
                "name": bucket,
                "public": true,
            }))
            .send()
            .await?;

        // 重复创建视为已存在
        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            Ok(())
        } else {
            Err(SyncError::Storage(format!(
                "bucket create for '{}' returned {}",
                bucket,
                response.status()
            )))
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, SyncError> {
        let response = self
            .http
            .post(format!(
                "{}/storage/v1/object/{}/{}",
                self.base_url, bucket, key
            ))
            .bearer_auth(&self.service_key)
            .header("content-type", content_type)
            // 重复上传直接覆盖，同一个场所的键是确定的
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Storage(format!(
                "object upload for '{}/{}' returned {}",
                bucket,
                key,
                response.status()
            )));
        }

        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, key
        ))
    }
}
