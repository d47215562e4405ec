use async_trait::async_trait;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("duplicate")]
    Duplicate,
    #[error("not_found")]
    NotFound,
    #[error("other: {0}")]
    Other(String),
}

/// Content-addressed store for question images and resource files.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn save(&self, hash: &str, mime: &str, bytes: &[u8]) -> Result<(), FileStoreError>;
    async fn load(&self, hash: &str) -> Result<(Vec<u8>, String), FileStoreError>;
    async fn delete(&self, hash: &str) -> Result<(), FileStoreError>;
}

// ---------------- Filesystem implementation (default) ----------------

pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new() -> Self {
        let mut root = std::env::var("EDULINK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));
        root.push("files");
        Self { root }
    }

    fn path_for(&self, hash: &str) -> PathBuf {
        // shard by hash prefix so one directory never holds everything
        let mut p = self.root.clone();
        p.push(&hash[0..2]);
        p.push(hash);
        p
    }
}

impl Default for FsFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStore for FsFileStore {
    async fn save(&self, hash: &str, _mime: &str, bytes: &[u8]) -> Result<(), FileStoreError> {
        let path = self.path_for(hash);
        if path.exists() {
            return Err(FileStoreError::Duplicate);
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| FileStoreError::Other(e.to_string()))?;
        }
        std::fs::write(&path, bytes).map_err(|e| FileStoreError::Other(e.to_string()))
    }

    async fn load(&self, hash: &str) -> Result<(Vec<u8>, String), FileStoreError> {
        let path = self.path_for(hash);
        let bytes = std::fs::read(&path).map_err(|_| FileStoreError::NotFound)?;
        // MIME is not stored alongside; sniff on the way out
        let mime = infer::get(&bytes)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        Ok((bytes, mime))
    }

    async fn delete(&self, hash: &str) -> Result<(), FileStoreError> {
        let _ = std::fs::remove_file(self.path_for(hash));
        Ok(())
    }
}

// ---------------- S3 implementation (MinIO compatible) ----------------

pub struct S3FileStore {
    bucket: String,
    client: aws_sdk_s3::Client,
    prefix: String,
}

impl S3FileStore {
    pub async fn new() -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "edulink-files".into());
        let endpoint = std::env::var("S3_ENDPOINT")
            .map_err(|_| anyhow::anyhow!("S3_ENDPOINT must be set (MinIO / S3 endpoint)"))?;
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into());
        let access = std::env::var("S3_ACCESS_KEY").unwrap_or_default();
        let secret = std::env::var("S3_SECRET_KEY").unwrap_or_default();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region))
            .endpoint_url(endpoint);
        if !access.is_empty() && !secret.is_empty() {
            let creds = Credentials::new(access, secret, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // Path-style addressing: required for MinIO / local endpoints
        // without wildcard DNS.
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf)
            .force_path_style(true)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!("initialized S3/MinIO file store client");

        // Ensure the bucket exists; MinIO containers may still be coming up.
        if client.head_bucket().bucket(&bucket).send().await.is_err() {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match client.create_bucket().bucket(&bucket).send().await {
                    Ok(_) => {
                        info!("created bucket '{bucket}' (attempt {attempt})");
                        break;
                    }
                    Err(e) if attempt >= 5 => {
                        error!("create_bucket failed for '{bucket}' after {attempt} attempts: {e:?}");
                        return Err(anyhow::anyhow!("failed to ensure bucket '{bucket}': {e}"));
                    }
                    Err(e) => {
                        let backoff_ms = 200 * u64::from(attempt);
                        warn!("create_bucket attempt {attempt} failed for '{bucket}': {e:?} (retrying in {backoff_ms}ms)");
                        tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                    }
                }
            }
        }

        Ok(Self {
            bucket,
            client,
            prefix: "files".into(),
        })
    }

    fn key_for(&self, hash: &str) -> String {
        format!("{}/{}/{}", self.prefix, &hash[0..2], hash)
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn save(&self, hash: &str, mime: &str, bytes: &[u8]) -> Result<(), FileStoreError> {
        use aws_sdk_s3::primitives::ByteStream;
        let key = self.key_for(hash);
        if self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .is_ok()
        {
            return Err(FileStoreError::Duplicate);
        }
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(mime);
        if let Err(e) = put.send().await {
            error!(
                "put_object failed hash={hash} key={key} bucket={}: {e:?}",
                self.bucket
            );
            let hint = if e.to_string().contains("AccessDenied") {
                " (check S3_ACCESS_KEY/S3_SECRET_KEY permissions)"
            } else {
                ""
            };
            return Err(FileStoreError::Other(format!("{e}{hint}")));
        }
        Ok(())
    }

    async fn load(&self, hash: &str) -> Result<(Vec<u8>, String), FileStoreError> {
        let key = self.key_for(hash);
        let obj = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|_| FileStoreError::NotFound)?;
        let data = obj
            .body
            .collect()
            .await
            .map_err(|e| FileStoreError::Other(e.to_string()))?;
        let bytes = Vec::from(data.into_bytes().as_ref());
        let mime = infer::get(&bytes)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        Ok((bytes, mime))
    }

    async fn delete(&self, hash: &str) -> Result<(), FileStoreError> {
        let key = self.key_for(hash);
        // Best-effort: absent objects are treated as already deleted.
        let _ = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;
        Ok(())
    }
}

/// Factory used in main: S3 when an endpoint is configured, local
/// filesystem otherwise.
pub async fn build_file_store() -> Arc<dyn FileStore> {
    if std::env::var("S3_ENDPOINT").is_ok() {
        match S3FileStore::new().await {
            Ok(store) => return Arc::new(store),
            Err(e) => panic!("Failed to initialize S3 file store: {e}"),
        }
    }
    info!("using filesystem file store");
    Arc::new(FsFileStore::new())
}
