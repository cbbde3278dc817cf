//! # Apillon Client SDK
//!
//! A client SDK for Apillon storage.
//!
//! ## Features
//!
//! - **Authenticated requests**: every API call carries the project credential
//! - **Retries**: transport failures are retried with linear backoff, API
//!   errors are returned as-is
//! - **Session uploads**: files are registered, pushed straight to pre-signed
//!   storage URLs and the session is closed, in that order
//! - **Cancellation**: every operation takes a [`CancellationToken`] that is
//!   honored at each network call and wait
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              StorageClient              │
//! ├───────────────────────┬─────────────────┤
//! │   RetryExecutor       │  signed URL PUT │
//! ├───────────────────────┴─────────────────┤
//! │          Transport (HttpTransport)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use apillon_client::{Config, StorageClient, UploadFile};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = StorageClient::new(Config::default().with_credential("base64-key"))?;
//!     let cancel = CancellationToken::new();
//!
//!     let outcome = client
//!         .upload_files(
//!             "bucket-uuid",
//!             vec![UploadFile::new("hello.txt", "Hello, World!")],
//!             &cancel,
//!         )
//!         .await?;
//!     println!("Session {} closed", outcome.session_uuid);
//!
//!     Ok(())
//! }
//! ```

mod client;
pub mod config;
mod error;
mod retry;
mod routes;
mod transport;
mod types;
mod upload;

pub use client::StorageClient;
pub use config::{Config, Credential, RetryPolicy};
pub use error::{
    ApiErrorBody, ClientError, ErrorKind, Result, UploadPhase, DIRECTORY_DELETING,
    DIRECTORY_NOT_FOUND,
};
pub use retry::{Attempt, RetryExecutor};
pub use routes::Route;
pub use transport::{classify_response, HttpTransport, RequestSpec, Transport};
pub use types::*;
pub use upload::{
    FileMetadata, FileUploadSlot, SignedUploadTarget, StartUploadData, UploadFile, UploadOutcome,
    UploadSession, UploadState, DEFAULT_CONTENT_TYPE,
};

// Cancellation handle taken by every operation
pub use tokio_util::sync::CancellationToken;
