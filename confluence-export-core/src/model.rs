//! Plain data records handed to the pipeline by the fetch layer.
//!
//! Everything here is immutable once fetched: the export run owns the records for its
//! duration and only derives new values (hierarchy entries, resolved attachments) from them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One entry of a page's ancestor chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestor {
    pub id: String,
    pub title: String,
}

/// Version block of a page as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Creation timestamp, passed through verbatim (ISO-8601 from Confluence).
    pub created_at: String,
    pub author_name: String,
    pub version_number: u32,
}

/// A page in storage format, as fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub space_key: String,
    #[serde(default)]
    pub space_name: Option<String>,
    /// Root-first, immediate parent last.
    #[serde(default)]
    pub ancestors: Vec<Ancestor>,
    #[serde(default)]
    pub raw_body: String,
    #[serde(default)]
    pub version: VersionInfo,
}

impl Document {
    /// Id of the immediate parent, if the page has any ancestors.
    pub fn parent_id(&self) -> Option<&str> {
        self.ancestors.last().map(|a| a.id.as_str())
    }
}

/// Everything needed to fetch one attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    pub id: String,
    pub filename: String,
    pub parent_document_id: String,
    /// Tried in order; the first successful transfer wins.
    pub candidate_addresses: Vec<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    /// Download link as advertised by the server, kept for reporting.
    #[serde(default)]
    pub download_url: Option<String>,
}

/// An attachment that has been written to the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAttachment {
    /// Original filename as referenced from page bodies.
    pub filename: String,
    /// Name of the file inside the attachments directory (sanitized, deduplicated).
    pub local_name: String,
    pub local_path: PathBuf,
    pub attachment_id: String,
    pub parent_document_id: String,
    pub size_bytes: u64,
}

impl ResolvedAttachment {
    /// Reference to this attachment relative to the space root.
    pub fn relative_href(&self) -> String {
        format!("attachments/{}", self.local_name)
    }
}
