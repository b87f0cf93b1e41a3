//! Asset publishing: upload page images and return a public URL.
//!
//! The vision model fetches slides by URL, so every page PNG is pushed to
//! an S3-compatible bucket with a `public-read` ACL before narration.
//! [`AssetPublisher`] is the seam: [`S3Publisher`] talks to real storage,
//! tests and embedders can inject any other implementation through
//! [`crate::config::PodcastConfigBuilder::publisher`].

use crate::config::StorageConfig;
use crate::error::PodcastError;
use crate::output::PublishedAsset;
use async_trait::async_trait;
use aws_sdk_s3::config::RequestChecksumCalculation;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client as S3Client;
use secrecy::ExposeSecret;
use std::path::Path;
use tracing::{debug, info};

/// Content type of every published page.
pub const PAGE_CONTENT_TYPE: &str = "image/png";

/// Uploads a local file and returns where it can be fetched publicly.
#[async_trait]
pub trait AssetPublisher: Send + Sync {
    /// Upload `local_path` under a key derived from `logical_name`.
    async fn publish(
        &self,
        local_path: &Path,
        logical_name: &str,
    ) -> Result<PublishedAsset, PodcastError>;
}

/// Object key for an upload: `<folder>/<8 random hex>_<logical_name>`.
///
/// The random part keeps repeated runs of the same document from
/// overwriting each other's images.
pub fn object_key(folder: &str, logical_name: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        format!("{}_{}", &suffix[..8], logical_name)
    } else {
        format!("{}/{}_{}", folder, &suffix[..8], logical_name)
    }
}

/// Public URL for a key: `<endpoint>/<bucket>/<key>`.
pub fn public_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
}

/// Publisher backed by an S3-compatible object store (path-style addressing).
#[derive(Debug)]
pub struct S3Publisher {
    client: S3Client,
    endpoint: String,
    bucket: String,
    folder: String,
}

impl S3Publisher {
    /// Build a publisher from storage settings; every field is required.
    pub async fn from_config(storage: &StorageConfig) -> Result<Self, PodcastError> {
        let endpoint = storage.endpoint.clone().ok_or(PodcastError::MissingCredential {
            name: "object storage endpoint",
            env: "OBJECT_STORAGE_ENDPOINT",
        })?;
        let bucket = storage.bucket.clone().ok_or(PodcastError::MissingCredential {
            name: "object storage bucket",
            env: "OBJECT_STORAGE_BUCKET",
        })?;
        let access_key = storage.access_key.as_ref().ok_or(PodcastError::MissingCredential {
            name: "object storage access key",
            env: "OBJECT_STORAGE_ACCESS_KEY",
        })?;
        let secret_key = storage.secret_key.as_ref().ok_or(PodcastError::MissingCredential {
            name: "object storage secret key",
            env: "OBJECT_STORAGE_SECRET_KEY",
        })?;

        let credentials = aws_credential_types::Credentials::new(
            access_key.expose_secret(),
            secret_key.expose_secret(),
            None, // session token
            None, // expiry
            "pdf2podcast-config",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(storage.region.clone()))
            .endpoint_url(endpoint.clone())
            .credentials_provider(credentials)
            .load()
            .await;

        // S3-compatible stores generally reject the SDK's default trailing checksums.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();

        info!("Publishing page images to {}/{}", endpoint, bucket);

        Ok(Self {
            client: S3Client::from_conf(s3_config),
            endpoint,
            bucket,
            folder: storage.folder.clone(),
        })
    }
}

#[async_trait]
impl AssetPublisher for S3Publisher {
    async fn publish(
        &self,
        local_path: &Path,
        logical_name: &str,
    ) -> Result<PublishedAsset, PodcastError> {
        let key = object_key(&self.folder, logical_name);

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| PodcastError::PublishFailed {
                key: key.clone(),
                detail: format!("cannot read {}: {e}", local_path.display()),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(PAGE_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| PodcastError::PublishFailed {
                key: key.clone(),
                detail: format!("{}", aws_sdk_s3::error::DisplayErrorContext(&e)),
            })?;

        let url = public_url(&self.endpoint, &self.bucket, &key);
        debug!("Uploaded {} → {}", local_path.display(), url);

        Ok(PublishedAsset { url, key })
    }
}
