//! Common types for the client SDK

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope wrapping every successful API response
#[derive(Clone, Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// Request id assigned by the API
    #[serde(default)]
    pub id: Option<String>,
    /// Application status; some endpoints report domain outcomes here
    #[serde(default)]
    pub status: Option<i64>,
    pub data: T,
}

/// Paginated list
#[derive(Clone, Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
}

/// A storage bucket
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub bucket_uuid: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Used storage in bytes
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub max_size: Option<u64>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
}

/// Kind of a bucket content entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ContentKind {
    Directory,
    File,
    Other(u8),
}

impl From<u8> for ContentKind {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Directory,
            2 => Self::File,
            other => Self::Other(other),
        }
    }
}

impl From<ContentKind> for u8 {
    fn from(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Directory => 1,
            ContentKind::File => 2,
            ContentKind::Other(v) => v,
        }
    }
}

/// A directory or file listed in a bucket
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketContent {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub uuid: String,
    pub name: String,
    #[serde(default, rename = "CID", alias = "cid")]
    pub cid: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub directory_uuid: Option<String>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
}

/// Processing state of an uploaded file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum FileStatus {
    UploadRequestGenerated,
    Uploaded,
    UploadedToIpfs,
    PinnedToCrust,
    Other(u8),
}

impl From<u8> for FileStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::UploadRequestGenerated,
            2 => Self::Uploaded,
            3 => Self::UploadedToIpfs,
            4 => Self::PinnedToCrust,
            other => Self::Other(other),
        }
    }
}

impl From<FileStatus> for u8 {
    fn from(status: FileStatus) -> Self {
        match status {
            FileStatus::UploadRequestGenerated => 1,
            FileStatus::Uploaded => 2,
            FileStatus::UploadedToIpfs => 3,
            FileStatus::PinnedToCrust => 4,
            FileStatus::Other(v) => v,
        }
    }
}

/// A file stored in a bucket
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetails {
    pub file_uuid: String,
    pub name: String,
    #[serde(default, rename = "CID", alias = "cid")]
    pub cid: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub file_status: Option<FileStatus>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub directory_uuid: Option<String>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
}

/// IPFS gateway link for a CID
#[derive(Clone, Debug, Deserialize)]
pub struct IpfsLink {
    #[serde(default)]
    pub link: String,
}

/// IPFS cluster connection details for the project
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpfsClusterInfo {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub project_uuid: Option<String>,
    #[serde(default)]
    pub ipfs_gateway: Option<String>,
    #[serde(default)]
    pub ipns_gateway: Option<String>,
}

/// Body of the create bucket call
#[derive(Clone, Debug, Serialize)]
pub struct CreateBucketRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Options for listing bucket content and files
#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    /// Restrict to one directory
    pub directory_uuid: Option<String>,
    /// Filter by name
    pub search: Option<String>,
    /// Page number, starting at 1
    pub page: Option<u32>,
    /// Page size
    pub limit: Option<u32>,
}

impl ListOptions {
    /// Query parameters for the set options
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(dir) = &self.directory_uuid {
            params.push(("directoryUuid", dir.clone()));
        }
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bucket_page() {
        let json = r#"{
            "id": "req-1",
            "status": 200,
            "data": {
                "items": [{
                    "bucketUuid": "b-1",
                    "name": "website",
                    "size": 1024,
                    "createTime": "2024-01-01T00:00:00.000Z"
                }],
                "total": 1
            }
        }"#;

        let response: ApiResponse<Page<Bucket>> = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.total, 1);
        assert_eq!(response.data.items[0].bucket_uuid, "b-1");
        assert_eq!(response.data.items[0].size, Some(1024));
        assert!(response.data.items[0].create_time.is_some());
    }

    #[test]
    fn test_parse_file_details() {
        let json = r#"{
            "fileUuid": "f-1",
            "name": "index.html",
            "CID": "bafy123",
            "fileStatus": 3,
            "contentType": "text/html"
        }"#;

        let file: FileDetails = serde_json::from_str(json).unwrap();
        assert_eq!(file.cid.as_deref(), Some("bafy123"));
        assert_eq!(file.file_status, Some(FileStatus::UploadedToIpfs));
    }

    #[test]
    fn test_content_kind() {
        let json = r#"{"type": 1, "uuid": "d-1", "name": "assets"}"#;
        let entry: BucketContent = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, ContentKind::Directory);
    }

    #[test]
    fn test_create_bucket_skips_empty_description() {
        let body = CreateBucketRequest {
            name: "site".into(),
            description: None,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"name":"site"}"#);
    }

    #[test]
    fn test_list_options_params() {
        let opts = ListOptions {
            search: Some("logo".into()),
            limit: Some(20),
            ..Default::default()
        };
        assert_eq!(
            opts.to_params(),
            vec![("search", "logo".to_string()), ("limit", "20".to_string())]
        );
    }
}
