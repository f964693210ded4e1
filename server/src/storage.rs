use std::path::PathBuf;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use waymark_shared::world_format::{decode_world_file, encode_world_file, WorldFileData};

const WORLD_FILE_NAME: &str = "world.bin";

#[async_trait]
pub trait Storage: Send + Sync {
    async fn load_world(&self) -> Result<WorldFileData, String>;
    async fn save_world(&self, data: &WorldFileData);
}

pub struct FileStorage {
    data_dir: PathBuf,
}

impl FileStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn world_path(&self) -> PathBuf {
        self.data_dir.join(WORLD_FILE_NAME)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn load_world(&self) -> Result<WorldFileData, String> {
        let path = self.world_path();
        let payload = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Failed to read world file {}: {e}", path.display()))?;
        decode_world_file(&payload).map_err(|e| e.to_string())
    }

    async fn save_world(&self, data: &WorldFileData) {
        let path = self.world_path();
        let payload = encode_world_file(data);
        if let Err(error) = tokio::fs::write(&path, payload).await {
            eprintln!("Failed to save world file {}: {error}", path.display());
        }
    }
}

#[derive(Clone, Debug)]
pub struct S3StorageConfig {
    pub bucket: String,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl S3StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            region: None,
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

pub struct S3Storage {
    bucket: String,
    prefix: String,
    client: Client,
}

impl S3Storage {
    pub async fn new(config: S3StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let (Some(access_key_id), Some(secret_access_key)) = (
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
        ) {
            let creds = Credentials::new(access_key_id, secret_access_key, None, None, "static");
            loader = loader.credentials_provider(creds);
        }
        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint_url) = config.endpoint_url.as_ref() {
            builder = builder.endpoint_url(endpoint_url);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        let client = Client::from_conf(builder.build());
        let prefix = config
            .prefix
            .unwrap_or_default()
            .trim_matches('/')
            .to_string();
        Self {
            bucket: config.bucket,
            prefix,
            client,
        }
    }

    fn object_key(&self) -> String {
        if self.prefix.is_empty() {
            WORLD_FILE_NAME.to_string()
        } else {
            format!("{}/{WORLD_FILE_NAME}", self.prefix)
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn load_world(&self) -> Result<WorldFileData, String> {
        let key = self.object_key();
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;
        let output = match response {
            Ok(output) => output,
            Err(error) => {
                if let Some(service_error) = error.as_service_error() {
                    if service_error.is_no_such_key() {
                        return Err(format!("World object {key} not found"));
                    }
                }
                return Err(format!("Failed to load world from s3: {error:?}"));
            }
        };
        let bytes = match output.body.collect().await {
            Ok(collected) => collected.into_bytes(),
            Err(error) => {
                return Err(format!("Failed to read world from s3 response: {error:?}"));
            }
        };
        decode_world_file(&bytes).map_err(|e| e.to_string())
    }

    async fn save_world(&self, data: &WorldFileData) {
        let key = self.object_key();
        let payload = encode_world_file(data);
        let body = ByteStream::from(payload);
        if let Err(error) = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
        {
            eprintln!("Failed to save world to s3: {error:?}");
        }
    }
}
