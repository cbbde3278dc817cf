//! API route table

use crate::{ClientError, Result};
use url::Url;

/// An API endpoint together with its path identifiers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Buckets,
    BucketContent { bucket: String },
    BucketFiles { bucket: String },
    File { bucket: String, file: String },
    Directory { bucket: String, directory: String },
    StartUpload { bucket: String },
    EndUpload { bucket: String, session: String },
    IpfsLink { cid: String },
    IpfsClusterInfo,
}

impl Route {
    /// Path segments, each encoded separately when joined onto the origin
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Self::Buckets => vec!["storage", "buckets"],
            Self::BucketContent { bucket } => vec!["storage", "buckets", bucket, "content"],
            Self::BucketFiles { bucket } => vec!["storage", "buckets", bucket, "files"],
            Self::File { bucket, file } => vec!["storage", "buckets", bucket, "files", file],
            Self::Directory { bucket, directory } => {
                vec!["storage", "buckets", bucket, "directories", directory]
            }
            Self::StartUpload { bucket } => vec!["storage", "buckets", bucket, "upload"],
            Self::EndUpload { bucket, session } => {
                vec!["storage", "buckets", bucket, "upload", session, "end"]
            }
            Self::IpfsLink { cid } => vec!["storage", "link-on-ipfs", cid],
            Self::IpfsClusterInfo => vec!["storage", "ipfs-cluster-info"],
        }
    }

    /// Human readable path, for logs
    pub fn path(&self) -> String {
        format!("/{}", self.segments().join("/"))
    }

    /// Resolve against the API origin
    pub fn url(&self, base: &Url) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("endpoint cannot be a base URL: {}", base)))?
            .pop_if_empty()
            .extend(self.segments());
        Ok(url)
    }
}

/// Parse and validate the API origin
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint)
        .map_err(|e| ClientError::Config(format!("invalid endpoint {:?}: {}", endpoint, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ClientError::Config(format!(
                "unsupported endpoint scheme: {}",
                other
            )))
        }
    }
    if url.cannot_be_a_base() {
        return Err(ClientError::Config(format!(
            "endpoint cannot be a base URL: {}",
            endpoint
        )));
    }

    Ok(url)
}
