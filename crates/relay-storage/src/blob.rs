//! Encrypted blob object store, backed by any S3-compatible endpoint.
//!
//! The broker never inspects payload contents; this wrapper only moves
//! opaque bytes in, out, and away again.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use relay_core::error::{RelayError, Result};

pub struct BlobStore {
    client: Client,
    bucket: String,
}

impl BlobStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub async fn put(&self, object_name: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_name)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| RelayError::ObjectStore(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, object_name: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_name)
            .send()
            .await
            .map_err(|e| RelayError::ObjectStore(e.to_string()))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| RelayError::ObjectStore(e.to_string()))?;

        Ok(bytes.into_bytes().to_vec())
    }

    /// Delete is tolerant of the object already being gone: the reaper and
    /// a recipient's successful download can race to clean up the same key.
    /// `DeleteObject` itself is idempotent and never reports `NoSuchKey`, so
    /// any error here is a real backend failure.
    pub async fn delete(&self, object_name: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(object_name)
            .send()
            .await
            .map_err(|e| RelayError::ObjectStore(e.to_string()))?;
        Ok(())
    }
}
