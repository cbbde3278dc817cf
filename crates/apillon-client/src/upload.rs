//! Session uploads through pre-signed URLs
//!
//! An upload runs in three strictly ordered phases:
//!
//! 1. `POST /storage/buckets/{bucket}/upload` registers the files and returns
//!    a session id plus one signed URL per file.
//! 2. Each file is `PUT` to its signed URL, sequentially and in input order,
//!    without API credentials and without retries.
//! 3. `POST /storage/buckets/{bucket}/upload/{session}/end` closes the session.
//!
//! The first failure stops the run. Files already uploaded are not rolled
//! back and the session is left open; the caller decides whether to start
//! over.

use crate::{
    client::require, ApiResponse, ClientError, ErrorKind, Result, Route, StorageClient, Transport,
    UploadPhase,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Content type used when a file does not declare one
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Metadata registered for a file at session start
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_name: String,
    #[serde(default)]
    pub content_type: String,
    /// Directory inside the bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl FileMetadata {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: String::new(),
            path: None,
        }
    }
}

/// A file to upload: metadata plus raw bytes
#[derive(Clone, Debug)]
pub struct UploadFile {
    pub metadata: FileMetadata,
    pub content: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            metadata: FileMetadata::new(file_name),
            content: content.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.metadata.content_type = content_type.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.metadata.path = Some(path.into());
        self
    }

    /// Load a file from disk, guessing its content type from the extension
    pub async fn from_path(path: impl AsRef<Path>, bucket_path: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ClientError::InvalidInput(format!("path has no file name: {}", path.display()))
            })?
            .to_string();

        let content = tokio::fs::read(path).await.map_err(|e| {
            ClientError::InvalidInput(format!("failed to read {}: {}", path.display(), e))
        })?;

        let content_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        Ok(Self {
            metadata: FileMetadata {
                file_name,
                content_type,
                path: bucket_path.map(str::to_string),
            },
            content: Bytes::from(content),
        })
    }
}

#[derive(Serialize)]
struct StartUploadRequest<'a> {
    files: &'a [FileMetadata],
}

/// Phase 1 response payload
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadData {
    #[serde(default)]
    pub session_uuid: String,
    #[serde(default)]
    pub files: Vec<SignedUploadTarget>,
}

/// Signed URL issued for one registered file
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUploadTarget {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub file_uuid: Option<String>,
}

/// Orchestration progress
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    SessionStarting,
    UploadingFiles,
    SessionEnding,
    Complete,
    Failed { phase: UploadPhase, kind: ErrorKind },
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed { .. })
    }
}

/// One file within a session
#[derive(Clone, Debug)]
pub struct FileUploadSlot {
    pub metadata: FileMetadata,
    pub signed_url: Option<String>,
    content: Bytes,
    pub uploaded: bool,
}

/// State of a single orchestrated upload. Owned by one call, never reused.
#[derive(Debug)]
pub struct UploadSession {
    bucket_uuid: String,
    session_uuid: Option<String>,
    slots: Vec<FileUploadSlot>,
    state: UploadState,
}

impl UploadSession {
    /// Validate the request and build an idle session
    pub fn new(bucket_uuid: &str, files: Vec<UploadFile>) -> Result<Self> {
        require("bucket UUID", bucket_uuid)?;
        if files.is_empty() {
            return Err(ClientError::InvalidInput(
                "no files provided for upload".to_string(),
            ));
        }

        let mut slots = Vec::with_capacity(files.len());
        for (index, file) in files.into_iter().enumerate() {
            let mut metadata = file.metadata;
            normalize(index, &mut metadata)?;
            if file.content.is_empty() {
                return Err(ClientError::InvalidInput(format!(
                    "file #{} ({}) has no content",
                    index, metadata.file_name
                )));
            }
            slots.push(FileUploadSlot {
                metadata,
                signed_url: None,
                content: file.content,
                uploaded: false,
            });
        }

        Ok(Self {
            bucket_uuid: bucket_uuid.to_string(),
            session_uuid: None,
            slots,
            state: UploadState::Idle,
        })
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn slots(&self) -> &[FileUploadSlot] {
        &self.slots
    }

    pub fn session_uuid(&self) -> Option<&str> {
        self.session_uuid.as_deref()
    }

    fn metadata(&self) -> Vec<FileMetadata> {
        self.slots.iter().map(|s| s.metadata.clone()).collect()
    }

    fn transition(&mut self, next: UploadState) {
        debug!(bucket = %self.bucket_uuid, from = ?self.state, to = ?next, "Upload state change");
        self.state = next;
    }

    /// Move to `Failed` and wrap `error` with the session context
    fn fail(&mut self, phase: UploadPhase, error: ClientError) -> ClientError {
        self.transition(UploadState::Failed {
            phase,
            kind: error.kind(),
        });
        ClientError::Session {
            phase,
            bucket: self.bucket_uuid.clone(),
            source: Box::new(error),
        }
    }

    /// Attach phase 1 results. Fewer usable URLs than files is fatal.
    fn assign_targets(&mut self, data: StartUploadData) -> Result<()> {
        if data.session_uuid.is_empty() {
            return Err(ClientError::Protocol(
                "start upload response has no session UUID".to_string(),
            ));
        }

        let urls: Vec<String> = data
            .files
            .into_iter()
            .map(|target| target.url)
            .filter(|url| !url.is_empty())
            .collect();

        if urls.is_empty() {
            return Err(ClientError::Protocol(
                "no signed URLs found in start upload response".to_string(),
            ));
        }
        if urls.len() < self.slots.len() {
            return Err(ClientError::Protocol(format!(
                "not enough signed URLs: expected {}, got {}",
                self.slots.len(),
                urls.len()
            )));
        }

        for (slot, url) in self.slots.iter_mut().zip(urls) {
            slot.signed_url = Some(url);
        }
        self.session_uuid = Some(data.session_uuid);
        Ok(())
    }
}

/// Result of a completed upload session
#[derive(Clone, Debug)]
pub struct UploadOutcome {
    pub session_uuid: String,
    pub files_uploaded: usize,
    /// Decoded end-session response
    pub response: serde_json::Value,
}

fn normalize(index: usize, metadata: &mut FileMetadata) -> Result<()> {
    if metadata.file_name.is_empty() {
        return Err(ClientError::InvalidInput(format!(
            "file at index {} has no name",
            index
        )));
    }
    if metadata.content_type.is_empty() {
        metadata.content_type = DEFAULT_CONTENT_TYPE.to_string();
    }
    Ok(())
}

impl<T: Transport> StorageClient<T> {
    /// Register files with the API and obtain one signed URL per file
    #[instrument(skip(self, files, cancel), fields(files = files.len()))]
    pub async fn start_upload(
        &self,
        bucket_uuid: &str,
        files: &[FileMetadata],
        cancel: &CancellationToken,
    ) -> Result<StartUploadData> {
        require("bucket UUID", bucket_uuid)?;
        if files.is_empty() {
            return Err(ClientError::InvalidInput(
                "no files provided for upload".to_string(),
            ));
        }

        let mut files = files.to_vec();
        for (index, metadata) in files.iter_mut().enumerate() {
            normalize(index, metadata)?;
        }

        let spec = self
            .write(Route::StartUpload {
                bucket: bucket_uuid.to_string(),
            })
            .with_json(&StartUploadRequest { files: &files })?;

        let response: ApiResponse<StartUploadData> = self.call(&spec, cancel).await?;
        Ok(response.data)
    }

    /// PUT raw bytes to a signed URL. No credentials, no retries.
    #[instrument(skip(self, content, cancel), fields(size = content.len()))]
    pub async fn upload_to_signed_url(
        &self,
        signed_url: &str,
        content: Bytes,
        cancel: &CancellationToken,
    ) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = self.executor().transport().put_signed(signed_url, content) => result,
        }
    }

    /// Close an upload session
    #[instrument(skip(self, cancel))]
    pub async fn end_upload_session(
        &self,
        bucket_uuid: &str,
        session_uuid: &str,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value> {
        require("bucket UUID", bucket_uuid)?;
        require("session UUID", session_uuid)?;

        let spec = self.write(Route::EndUpload {
            bucket: bucket_uuid.to_string(),
            session: session_uuid.to_string(),
        });
        let body = self.executor().execute(&spec, cancel).await?;
        if body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Upload `files` to `bucket_uuid` in one session.
    ///
    /// Files go up sequentially in the given order; the first failure aborts
    /// the rest and the session is never ended. The returned error carries
    /// the failing phase and, for uploads, the file index.
    #[instrument(skip(self, files, cancel), fields(files = files.len()))]
    pub async fn upload_files(
        &self,
        bucket_uuid: &str,
        files: Vec<UploadFile>,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome> {
        let mut session = UploadSession::new(bucket_uuid, files)?;

        session.transition(UploadState::SessionStarting);
        let metadata = session.metadata();
        let started = match self.start_upload(bucket_uuid, &metadata, cancel).await {
            Ok(data) => data,
            Err(e) => return Err(session.fail(UploadPhase::Starting, e)),
        };
        if let Err(e) = session.assign_targets(started) {
            return Err(session.fail(UploadPhase::Starting, e));
        }

        // TODO: poll URL readiness instead once the storage API exposes a probe.
        let settle = self.config().settle_delay;
        if !settle.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(session.fail(UploadPhase::Uploading, ClientError::Cancelled));
                }
                _ = tokio::time::sleep(settle) => {}
            }
        }

        session.transition(UploadState::UploadingFiles);
        for index in 0..session.slots.len() {
            let slot = &session.slots[index];
            let url = slot.signed_url.clone().unwrap_or_default();
            let result = self
                .upload_to_signed_url(&url, slot.content.clone(), cancel)
                .await;

            if let Err(e) = result {
                let error = ClientError::FileUpload {
                    index,
                    file_name: slot.metadata.file_name.clone(),
                    source: Box::new(e),
                };
                return Err(session.fail(UploadPhase::Uploading, error));
            }
            session.slots[index].uploaded = true;
            debug!(index, "File uploaded");
        }

        session.transition(UploadState::SessionEnding);
        let session_uuid = session.session_uuid.clone().unwrap_or_default();
        let response = match self
            .end_upload_session(bucket_uuid, &session_uuid, cancel)
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(session.fail(UploadPhase::Ending, e)),
        };

        session.transition(UploadState::Complete);
        Ok(UploadOutcome {
            session_uuid,
            files_uploaded: session.slots.iter().filter(|s| s.uploaded).count(),
            response,
        })
    }
}
