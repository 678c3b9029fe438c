//! S3 client for segment uploads and presigned playback URLs.

use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// Prefix for raw segment objects.
const SEGMENT_PREFIX: &str = "video_segments";

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Explicit credentials; the default provider chain is used when absent.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            bucket: std::env::var("S3_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("S3_BUCKET_NAME not set"))?,
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
        })
    }
}

/// S3 storage client. Credentials come from the default provider chain.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
    region: String,
}

impl S3Client {
    /// Create a new client from configuration.
    pub async fn new(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(key_id), Some(secret)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader
                .credentials_provider(Credentials::new(key_id, secret, None, None, "lifeos"));
        }

        let sdk_config = loader.load().await;

        Self {
            client: Client::new(&sdk_config),
            bucket: config.bucket,
            region: config.region,
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Ok(Self::new(config).await)
    }

    /// Ensure the bucket exists, creating it if missing. Called once by the
    /// worker pool at startup.
    pub async fn ensure_bucket(&self) -> StorageResult<()> {
        match self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
        {
            Ok(_) => {
                debug!("Bucket {} exists", self.bucket);
                Ok(())
            }
            Err(e) if e.to_string().contains("NotFound") => {
                info!("Creating bucket {}", self.bucket);
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(|e| StorageError::Bucket(e.to_string()))?;
                Ok(())
            }
            Err(e) => Err(StorageError::Bucket(e.to_string())),
        }
    }

    /// Upload one segment under `video_segments/<basename>` and return the
    /// canonical object URL. No retry: blob failure is non-fatal for the job
    /// and the caller records the row without a link.
    pub async fn upload_segment(&self, path: impl AsRef<Path>) -> StorageResult<String> {
        let path = path.as_ref();
        let basename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::upload_failed("segment path has no file name"))?;
        let key = format!("{}/{}", SEGMENT_PREFIX, basename);

        debug!("Uploading {} to s3://{}/{}", path.display(), self.bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .content_type("video/mp4")
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let url = self.object_url(&key);
        info!("Uploaded segment to {}", url);
        Ok(url)
    }

    /// Canonical URL for an object key.
    pub fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, key
        )
    }

    /// Rewrite a stored object URL into a presigned GET URL.
    ///
    /// The parse ignores any existing query string, so feeding an already
    /// presigned URL back in yields a fresh signature over the same object.
    /// Unparseable input is returned unchanged, matching the read paths that
    /// prefer a stale link over a missing one.
    pub async fn presign_url(&self, s3_url: &str, ttl: Duration) -> String {
        let Some((bucket, key)) = parse_bucket_and_key(s3_url) else {
            warn!("Could not parse S3 URL, returning original: {}", s3_url);
            return s3_url.to_string();
        };

        match self.presign_get(&bucket, &key, ttl).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Presign failed for {}: {}", s3_url, e);
                s3_url.to_string()
            }
        }
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}

/// Extract `(bucket, key)` from a virtual-hosted S3 URL, presigned or not.
///
/// Accepts `https://<bucket>.s3.<region>.amazonaws.com/<key>` and the
/// regionless `https://<bucket>.s3.amazonaws.com/<key>` form.
pub fn parse_bucket_and_key(s3_url: &str) -> Option<(String, String)> {
    let parsed = url::Url::parse(s3_url).ok()?;
    if parsed.scheme() != "https" {
        return None;
    }

    let host = parsed.host_str()?;
    let mut host_parts = host.split('.');
    let bucket = host_parts.next()?;
    if host_parts.next()? != "s3" {
        return None;
    }

    let key = parsed.path().strip_prefix('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }

    Some((bucket.to_string(), key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_regional_url() {
        let (bucket, key) = parse_bucket_and_key(
            "https://lifeos-segments.s3.us-east-2.amazonaws.com/video_segments/seg_1.mp4",
        )
        .unwrap();
        assert_eq!(bucket, "lifeos-segments");
        assert_eq!(key, "video_segments/seg_1.mp4");
    }

    #[test]
    fn parses_regionless_url() {
        let (bucket, key) =
            parse_bucket_and_key("https://b.s3.amazonaws.com/video_segments/a.mp4").unwrap();
        assert_eq!(bucket, "b");
        assert_eq!(key, "video_segments/a.mp4");
    }

    #[test]
    fn presigned_query_string_is_ignored() {
        let (bucket, key) = parse_bucket_and_key(
            "https://b.s3.us-east-1.amazonaws.com/video_segments/a.mp4?X-Amz-Signature=abc&X-Amz-Expires=3600",
        )
        .unwrap();
        assert_eq!(bucket, "b");
        assert_eq!(key, "video_segments/a.mp4");
    }

    #[test]
    fn rejects_non_s3_hosts() {
        assert!(parse_bucket_and_key("https://example.com/video.mp4").is_none());
        assert!(parse_bucket_and_key("http://b.s3.amazonaws.com/a.mp4").is_none());
        assert!(parse_bucket_and_key("not a url").is_none());
    }
}
