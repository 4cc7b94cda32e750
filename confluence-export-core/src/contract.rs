//! # contract: seams between the pipeline and the outside world
//!
//! The export pipeline never talks to the network directly. It consumes two traits:
//!
//! - [`ContentSource`] lists the pages of a space and the attachments of a page.
//! - [`AttachmentFetcher`] retrieves the bytes behind one candidate address.
//!
//! The CLI crate implements both for the Confluence REST API. Tests use the generated
//! `MockContentSource` / `MockAttachmentFetcher`, exported behind the
//! `test-export-mocks` feature so integration tests in `tests/` can reach them.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::FetchError;
use crate::model::{AttachmentDescriptor, Document};

/// Source of documents and attachment descriptors for one space.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// All pages of the space, in whatever order the server returns them.
    async fn list_documents(&self, space_key: &str) -> Result<Vec<Document>, FetchError>;

    /// Attachments uploaded to a single page.
    async fn list_attachments(
        &self,
        document_id: &str,
    ) -> Result<Vec<AttachmentDescriptor>, FetchError>;
}

/// Retrieves attachment payloads.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    /// Fetch the full payload behind `address`. Any error means "try the next candidate".
    async fn fetch(&self, address: &str) -> Result<Vec<u8>, FetchError>;
}
