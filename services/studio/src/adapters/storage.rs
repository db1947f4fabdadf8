//! services/studio/src/adapters/storage.rs
//!
//! Uploads generated audio to a public bucket of the hosted backend's object
//! storage and hands back the public URL.

use async_trait::async_trait;
use reqwest::Method;
use tracing::info;

use sonicwave_core::ports::{AudioStorageService, PortResult};

use super::supabase::{ensure_success, SupabaseClient, SupabaseError};

#[derive(Clone)]
pub struct StorageAdapter {
    client: SupabaseClient,
    bucket: String,
}

impl StorageAdapter {
    pub fn new(client: SupabaseClient, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn public_url(&self, path: &str) -> String {
        self.client
            .url(&format!("/storage/v1/object/public/{}/{}", self.bucket, path))
    }
}

#[async_trait]
impl AudioStorageService for StorageAdapter {
    async fn store_audio(&self, path: &str, audio: Vec<u8>) -> PortResult<String> {
        let size = audio.len();
        let response = self
            .client
            .request(Method::POST, &format!("/storage/v1/object/{}/{}", self.bucket, path))
            .await
            .header("Content-Type", "audio/mpeg")
            .header("x-upsert", "true")
            .body(audio)
            .send()
            .await
            .map_err(|e| SupabaseError::from(e).into_port())?;
        ensure_success(response)
            .await
            .map_err(SupabaseError::into_port)?;

        info!("Uploaded {} bytes to {}/{}", size, self.bucket, path);
        Ok(self.public_url(path))
    }
}
