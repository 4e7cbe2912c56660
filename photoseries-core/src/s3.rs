use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{error::DisplayErrorContext, primitives::ByteStream, Client};

use crate::config::StoreSettings;
use crate::error::StorageError;
use crate::storage::BlobStore;

/// Blob store backed by an S3-compatible service (Cloudflare R2 by default).
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub async fn new(settings: &StoreSettings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "photoseries-secrets",
        );

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("auto"))
            .endpoint_url(&settings.endpoint)
            .credentials_provider(credentials)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(settings.force_path_style)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: settings.bucket.clone(),
        }
    }

    fn service_error(
        &self,
        operation: &'static str,
        key: &str,
        err: impl std::error::Error,
    ) -> StorageError {
        StorageError::Service {
            operation,
            bucket: self.bucket.clone(),
            key: key.to_string(),
            message: DisplayErrorContext(err).to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> Result<bool, StorageError> {
        tracing::debug!("S3 HEAD bucket: bucket={}", self.bucket);

        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(self.service_error("HeadBucket", "", service_err))
                }
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        tracing::debug!("S3 GET: bucket={}, key={}", self.bucket, key);

        let response = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(response) => response,
            Err(err) => {
                let service_err = err.into_service_error();
                return Err(if service_err.is_no_such_key() {
                    StorageError::NotFound {
                        bucket: self.bucket.clone(),
                        key: key.to_string(),
                    }
                } else {
                    self.service_error("GetObject", key, service_err)
                });
            }
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| self.service_error("GetObject", key, e))?;

        let bytes = data.to_vec();
        tracing::debug!("S3 GET success: key={}, size={} bytes", key, bytes.len());
        Ok(bytes)
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        tracing::debug!("S3 PUT: bucket={}, key={}, size={} bytes", self.bucket, key, data.len());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| self.service_error("PutObject", key, e))?;

        tracing::debug!("S3 PUT success: key={}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        tracing::debug!("S3 DELETE: bucket={}, key={}", self.bucket, key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.service_error("DeleteObject", key, e))?;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        // A single call returns at most 1000 keys
        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if let Some(ref token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| self.service_error("ListObjectsV2", prefix, e))?;

            for object in response.contents() {
                match object.key() {
                    Some(key) => keys.push(key.to_string()),
                    None => {
                        tracing::warn!("Found object without key when listing prefix {}", prefix)
                    }
                }
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated() == Some(true) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!("S3 LIST: prefix={}, {} keys", prefix, keys.len());
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(self.service_error("HeadObject", key, service_err))
                }
            }
        }
    }
}
