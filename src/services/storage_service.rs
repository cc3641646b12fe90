use crate::{
    config::StorageConfig,
    error::{ApiError, Result},
};
use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::Builder as S3ConfigBuilder, primitives::ByteStream, Client as S3Client,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Resumes: PDF only, at most 10 MiB.
pub const MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;
/// Images (logos, profile photos): JPEG/PNG/WebP, at most 5 MiB.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Validate a resume upload before it touches storage.
pub fn validate_resume_upload(content_type: &str, len: usize) -> Result<()> {
    if content_type != "application/pdf" {
        return Err(ApiError::Validation(
            "Resumes must be uploaded as PDF".to_string(),
        ));
    }
    if len == 0 {
        return Err(ApiError::Validation("Uploaded file is empty".to_string()));
    }
    if len > MAX_RESUME_BYTES {
        return Err(ApiError::Validation(
            "Resume exceeds the 10MB size limit".to_string(),
        ));
    }
    Ok(())
}

/// Validate an image upload and return the file extension to store under.
pub fn validate_image_upload(content_type: &str, len: usize) -> Result<&'static str> {
    let extension = match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => {
            return Err(ApiError::Validation(
                "Images must be JPEG, PNG or WebP".to_string(),
            ))
        }
    };
    if len == 0 {
        return Err(ApiError::Validation("Uploaded file is empty".to_string()));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(ApiError::Validation(
            "Image exceeds the 5MB size limit".to_string(),
        ));
    }
    Ok(extension)
}

pub struct StorageService {
    client: S3Client,
    bucket_name: String,
    endpoint_url: String,
    public_base_url: Option<String>,
}

impl StorageService {
    /// Create a new StorageService instance
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "CloudflareR2",
        );

        // Build S3 config for an R2-compatible endpoint
        let s3_config = S3ConfigBuilder::new()
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint_url)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for R2
            .behavior_version_latest()
            .build();

        let client = S3Client::from_conf(s3_config);

        info!(
            "StorageService initialized with bucket: {}, region: {}",
            config.bucket_name, config.region
        );

        Ok(Self {
            client,
            bucket_name: config.bucket_name.clone(),
            endpoint_url: config.endpoint_url.clone(),
            public_base_url: config.public_base_url.clone(),
        })
    }

    /// Upload a validated resume and return its permanent URL.
    #[instrument(skip(self, data))]
    pub async fn upload_resume(&self, data: Vec<u8>, user_id: Uuid) -> Result<String> {
        let key = format!("resumes/{}/{}.pdf", user_id, Uuid::now_v7());
        self.put(key, data, "application/pdf").await
    }

    /// Upload a validated image and return its permanent URL.
    #[instrument(skip(self, data))]
    pub async fn upload_image(
        &self,
        data: Vec<u8>,
        extension: &str,
        content_type: &str,
        user_id: Uuid,
    ) -> Result<String> {
        let key = format!("images/{}/{}.{}", user_id, Uuid::now_v7(), extension);
        self.put(key, data, content_type).await
    }

    async fn put(&self, key: String, data: Vec<u8>, content_type: &str) -> Result<String> {
        let size = data.len();
        info!("Uploading to storage: {} ({} bytes)", key, size);

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                warn!("Storage upload failed for {}: {}", key, e);
                ApiError::Upstream(format!("storage upload failed: {}", e))
            })?;

        // Permanent URL: public base URL when configured, endpoint otherwise
        let url = if let Some(base_url) = &self.public_base_url {
            format!("{}/{}", base_url, key)
        } else {
            format!("{}/{}/{}", self.endpoint_url, self.bucket_name, key)
        };

        info!("Upload stored at {}", url);

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_must_be_pdf_and_under_limit() {
        assert!(validate_resume_upload("application/pdf", 1024).is_ok());
        assert!(validate_resume_upload("image/png", 1024).is_err());
        assert!(validate_resume_upload("application/pdf", 0).is_err());
        assert!(validate_resume_upload("application/pdf", MAX_RESUME_BYTES).is_ok());
        assert!(validate_resume_upload("application/pdf", MAX_RESUME_BYTES + 1).is_err());
    }

    #[test]
    fn test_image_type_allowlist_and_limit() {
        assert_eq!(validate_image_upload("image/jpeg", 1024).unwrap(), "jpg");
        assert_eq!(validate_image_upload("image/png", 1024).unwrap(), "png");
        assert_eq!(validate_image_upload("image/webp", 1024).unwrap(), "webp");
        assert!(validate_image_upload("image/gif", 1024).is_err());
        assert!(validate_image_upload("application/pdf", 1024).is_err());
        assert!(validate_image_upload("image/png", MAX_IMAGE_BYTES + 1).is_err());
    }
}
