use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use thiserror::Error;
use uuid::Uuid;

use crate::core::config::Settings;

/// Object keys handed out by the upload endpoint start with this prefix.
pub(crate) const UPLOAD_KEY_PREFIX: &str = "chapters/";

#[derive(Debug, Error)]
pub(crate) enum StorageError {
    #[error("failed to presign upload: {0}")]
    Presign(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object {key} exceeds {limit} bytes")]
    TooLarge { key: String, limit: u64 },
    #[error("failed to download object: {0}")]
    Download(String),
    #[error("failed to delete object: {0}")]
    Delete(String),
}

#[derive(Debug, Clone)]
pub(crate) struct PresignedUpload {
    pub(crate) url: String,
    pub(crate) document_ref: String,
}

/// S3-compatible bucket holding uploaded chapter documents.
#[derive(Debug, Clone)]
pub(crate) struct StorageService {
    client: Client,
    bucket: String,
}

impl StorageService {
    /// `None` when no S3 credentials are configured; documents are then
    /// only read from the local document directory.
    pub(crate) async fn from_settings(settings: &Settings) -> Option<Self> {
        let s3 = settings.s3();
        if !s3.is_configured() {
            return None;
        }

        let credentials = Credentials::new(
            s3.access_key.clone(),
            s3.secret_key.clone(),
            None,
            None,
            "lessonforge-settings",
        );
        let config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(s3.endpoint.clone())
            .region(aws_config::Region::new(s3.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        Some(Self { client: Client::new(&config), bucket: s3.bucket.clone() })
    }

    /// Reserves a fresh key under the teacher's upload prefix and signs a PUT for it.
    pub(crate) async fn presign_upload(
        &self,
        owner_id: &str,
        extension: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUpload, StorageError> {
        let document_ref = upload_key(owner_id, extension);
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Presign(e.to_string()))?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&document_ref)
            .content_type(content_type)
            .presigned(config)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(PresignedUpload { url: presigned.uri().to_string(), document_ref })
    }

    /// Streams an object into memory and stops as soon as it passes `max_bytes`.
    pub(crate) async fn download(
        &self,
        key: &str,
        max_bytes: u64,
    ) -> Result<Vec<u8>, StorageError> {
        let object =
            self.client.get_object().bucket(&self.bucket).key(key).send().await.map_err(|err| {
                if err.as_service_error().is_some_and(|service| service.is_no_such_key()) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Download(err.to_string())
                }
            })?;

        let too_large = || StorageError::TooLarge { key: key.to_string(), limit: max_bytes };
        let declared = object.content_length().and_then(|length| u64::try_from(length).ok());
        if declared.is_some_and(|length| length > max_bytes) {
            return Err(too_large());
        }

        let mut body = object.body;
        let mut bytes = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| StorageError::Download(e.to_string()))?;
            if (bytes.len() + chunk.len()) as u64 > max_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    /// Missing keys are not an error.
    pub(crate) async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Delete(e.to_string()))?;
        Ok(())
    }
}

/// Every document a teacher uploads lives under this prefix.
pub(crate) fn owner_prefix(owner_id: &str) -> String {
    format!("{UPLOAD_KEY_PREFIX}{owner_id}/")
}

pub(crate) fn upload_key(owner_id: &str, extension: &str) -> String {
    format!("{}{}.{extension}", owner_prefix(owner_id), Uuid::new_v4())
}
