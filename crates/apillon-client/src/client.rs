//! Main client implementation

use crate::{
    error::{DIRECTORY_DELETING, DIRECTORY_NOT_FOUND},
    types::*,
    ClientError, Config, HttpTransport, RequestSpec, Result, RetryExecutor, Route, Transport,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Apillon storage client
#[derive(Clone, Debug)]
pub struct StorageClient<T = HttpTransport> {
    config: Config,
    executor: RetryExecutor<T>,
}

impl StorageClient<HttpTransport> {
    /// Create a new client with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(transport, config))
    }

    /// Create from `APILLON_API_KEY` / `APILLON_API_URL`
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env())
    }
}

impl<T: Transport> StorageClient<T> {
    /// Create a client over a custom transport
    pub fn with_transport(transport: T, config: Config) -> Self {
        let executor = RetryExecutor::new(transport, config.retry);
        Self { config, executor }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn executor(&self) -> &RetryExecutor<T> {
        &self.executor
    }

    // ==================== Bucket Operations ====================

    /// Create a bucket
    #[instrument(skip(self, cancel))]
    pub async fn create_bucket(
        &self,
        name: &str,
        description: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Bucket> {
        require("bucket name", name)?;

        let spec = self.write(Route::Buckets).with_json(&CreateBucketRequest {
            name: name.to_string(),
            description: description.filter(|d| !d.is_empty()).map(str::to_string),
        })?;
        let response: ApiResponse<Bucket> = self.call(&spec, cancel).await?;
        Ok(response.data)
    }

    /// List buckets, optionally filtered by name
    #[instrument(skip(self, cancel))]
    pub async fn list_buckets(
        &self,
        name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Page<Bucket>> {
        let mut spec = self.read(Route::Buckets);
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            spec = spec.with_query("name", name);
        }
        let response: ApiResponse<Page<Bucket>> = self.call(&spec, cancel).await?;
        Ok(response.data)
    }

    /// List directories and files in a bucket
    #[instrument(skip(self, options, cancel))]
    pub async fn get_bucket_content(
        &self,
        bucket_uuid: &str,
        options: Option<ListOptions>,
        cancel: &CancellationToken,
    ) -> Result<Page<BucketContent>> {
        require("bucket UUID", bucket_uuid)?;

        let spec = self
            .read(Route::BucketContent {
                bucket: bucket_uuid.to_string(),
            })
            .with_params(options.unwrap_or_default().to_params());
        let response: ApiResponse<Page<BucketContent>> = self.call(&spec, cancel).await?;
        Ok(response.data)
    }

    // ==================== File Operations ====================

    /// List files in a bucket
    #[instrument(skip(self, options, cancel))]
    pub async fn list_files(
        &self,
        bucket_uuid: &str,
        options: Option<ListOptions>,
        cancel: &CancellationToken,
    ) -> Result<Page<FileDetails>> {
        require("bucket UUID", bucket_uuid)?;

        let spec = self
            .read(Route::BucketFiles {
                bucket: bucket_uuid.to_string(),
            })
            .with_params(options.unwrap_or_default().to_params());
        let response: ApiResponse<Page<FileDetails>> = self.call(&spec, cancel).await?;
        Ok(response.data)
    }

    /// Get details of one file
    #[instrument(skip(self, cancel))]
    pub async fn get_file_details(
        &self,
        bucket_uuid: &str,
        file_uuid: &str,
        cancel: &CancellationToken,
    ) -> Result<FileDetails> {
        require("bucket UUID", bucket_uuid)?;
        require("file UUID", file_uuid)?;

        let spec = self.read(Route::File {
            bucket: bucket_uuid.to_string(),
            file: file_uuid.to_string(),
        });
        let response: ApiResponse<FileDetails> = self.call(&spec, cancel).await?;
        Ok(response.data)
    }

    /// Delete a file
    #[instrument(skip(self, cancel))]
    pub async fn delete_file(
        &self,
        bucket_uuid: &str,
        file_uuid: &str,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value> {
        require("bucket UUID", bucket_uuid)?;
        require("file UUID", file_uuid)?;

        let spec = self.remove(Route::File {
            bucket: bucket_uuid.to_string(),
            file: file_uuid.to_string(),
        });
        let response: ApiResponse<serde_json::Value> = self.call(&spec, cancel).await?;
        Ok(response.data)
    }

    /// Delete a directory.
    ///
    /// A missing directory and one already marked for deletion come back as
    /// [`ClientError::DirectoryNotFound`] and [`ClientError::DirectoryDeleting`].
    #[instrument(skip(self, cancel))]
    pub async fn delete_directory(
        &self,
        bucket_uuid: &str,
        directory_uuid: &str,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value> {
        require("bucket UUID", bucket_uuid)?;
        require("directory UUID", directory_uuid)?;

        let spec = self.remove(Route::Directory {
            bucket: bucket_uuid.to_string(),
            directory: directory_uuid.to_string(),
        });

        let directory_error = |status: i64| match status {
            DIRECTORY_NOT_FOUND => Some(ClientError::DirectoryNotFound {
                bucket: bucket_uuid.to_string(),
                directory: directory_uuid.to_string(),
            }),
            DIRECTORY_DELETING => Some(ClientError::DirectoryDeleting {
                bucket: bucket_uuid.to_string(),
                directory: directory_uuid.to_string(),
            }),
            _ => None,
        };

        // `data` may be absent when the outcome is carried in `status`.
        let result: Result<ApiResponse<Option<serde_json::Value>>> = self.call(&spec, cancel).await;
        let response = match result {
            Ok(response) => response,
            Err(ClientError::Api { status, message }) => {
                return Err(directory_error(status)
                    .unwrap_or(ClientError::Api { status, message }))
            }
            Err(e) => return Err(e),
        };

        if let Some(err) = response.status.and_then(directory_error) {
            return Err(err);
        }
        Ok(response.data.unwrap_or_default())
    }

    // ==================== IPFS Operations ====================

    /// Get or generate a gateway link for a CID
    #[instrument(skip(self, cancel))]
    pub async fn get_ipfs_link(&self, cid: &str, cancel: &CancellationToken) -> Result<String> {
        require("CID", cid)?;

        let spec = self.read(Route::IpfsLink {
            cid: cid.to_string(),
        });
        let response: ApiResponse<IpfsLink> = self.call(&spec, cancel).await?;
        if response.data.link.is_empty() {
            return Err(ClientError::NotFound(format!("no IPFS link for CID {}", cid)));
        }
        Ok(response.data.link)
    }

    /// Get IPFS cluster connection details
    #[instrument(skip(self, cancel))]
    pub async fn get_ipfs_cluster_info(&self, cancel: &CancellationToken) -> Result<IpfsClusterInfo> {
        let spec = self.read(Route::IpfsClusterInfo);
        let response: ApiResponse<IpfsClusterInfo> = self.call(&spec, cancel).await?;
        Ok(response.data)
    }

    // ==================== Helper Methods ====================

    pub(crate) fn read(&self, route: Route) -> RequestSpec {
        RequestSpec::new(Method::GET, route, self.config.read_timeout)
    }

    pub(crate) fn write(&self, route: Route) -> RequestSpec {
        RequestSpec::new(Method::POST, route, self.config.write_timeout)
    }

    pub(crate) fn remove(&self, route: Route) -> RequestSpec {
        RequestSpec::new(Method::DELETE, route, self.config.read_timeout)
    }

    /// Execute with retries and decode the JSON body
    pub(crate) async fn call<R: DeserializeOwned>(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<R> {
        let body = self.executor.execute(spec, cancel).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

pub(crate) fn require(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ClientError::InvalidInput(format!("{} cannot be empty", what)));
    }
    Ok(())
}
