//! Confluence REST client.
//!
//! Implements [`ContentSource`] and [`AttachmentFetcher`] on top of `reqwest` with basic
//! auth (account email + API token). Listings are paginated with `start`/`limit`; a short
//! page ends the listing.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, info};

use confluence_export_core::attachments::{candidate_addresses, AddressStrategy, AttachmentRef};
use confluence_export_core::contract::{AttachmentFetcher, ContentSource};
use confluence_export_core::error::FetchError;
use confluence_export_core::model::{Ancestor, AttachmentDescriptor, Document, VersionInfo};

const PAGE_BATCH: usize = 50;
const SPACE_BATCH: usize = 200;
const ATTACHMENT_BATCH: usize = 200;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub token: String,
}

/// A space the account can read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Space {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paged<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    ancestors: Vec<RawAncestor>,
    #[serde(default)]
    space: Option<RawSpace>,
    #[serde(default)]
    version: Option<RawVersion>,
    #[serde(default)]
    body: Option<RawBody>,
}

#[derive(Debug, Deserialize)]
struct RawAncestor {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct RawSpace {
    #[serde(default)]
    key: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVersion {
    #[serde(default)]
    when: String,
    #[serde(default)]
    by: Option<RawUser>,
    #[serde(default)]
    number: u32,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(rename = "displayName", default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct RawBody {
    #[serde(default)]
    storage: Option<RawStorage>,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct RawAttachment {
    id: String,
    title: String,
    #[serde(default)]
    container: Option<RawContainer>,
    #[serde(default)]
    version: Option<RawVersion>,
    #[serde(default)]
    extensions: Option<RawExtensions>,
    #[serde(rename = "_links", default)]
    links: Option<RawLinks>,
}

#[derive(Debug, Deserialize)]
struct RawContainer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawExtensions {
    #[serde(rename = "fileSize", default)]
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawLinks {
    #[serde(default)]
    download: Option<String>,
}

impl RawPage {
    fn into_document(self, requested_space: &str) -> Document {
        let (space_key, space_name) = match self.space {
            Some(space) if !space.key.is_empty() => (space.key, space.name),
            Some(space) => (requested_space.to_string(), space.name),
            None => (requested_space.to_string(), None),
        };
        let version = self
            .version
            .map(|v| VersionInfo {
                created_at: v.when,
                author_name: v.by.map(|by| by.display_name).unwrap_or_default(),
                version_number: v.number,
            })
            .unwrap_or_default();
        Document {
            id: self.id,
            title: self.title,
            space_key,
            space_name,
            ancestors: self
                .ancestors
                .into_iter()
                .map(|a| Ancestor { id: a.id, title: a.title })
                .collect(),
            raw_body: self
                .body
                .and_then(|b| b.storage)
                .map(|s| s.value)
                .unwrap_or_default(),
            version,
        }
    }
}

pub struct ConfluenceClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    page_limit: Option<usize>,
    strategies: Vec<AddressStrategy>,
}

impl ConfluenceClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            page_limit: None,
            strategies: AddressStrategy::DEFAULT.to_vec(),
        }
    }

    /// Stop listing a space after `limit` pages.
    pub fn with_page_limit(mut self, limit: Option<usize>) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Descriptor for an attachment listed under `document_id`, with its download candidates.
    fn descriptor_from(&self, raw: RawAttachment, document_id: &str) -> AttachmentDescriptor {
        let container_id = raw
            .container
            .as_ref()
            .map(|c| c.id.as_str())
            .unwrap_or(document_id);
        let download_link = raw.links.as_ref().and_then(|l| l.download.as_deref());
        let reference = AttachmentRef {
            id: &raw.id,
            filename: &raw.title,
            container_id,
            download_link,
        };
        let candidate_addresses = candidate_addresses(&self.base_url, &reference, &self.strategies);
        let download_url = download_link.map(str::to_string);
        let (uploaded_at, uploaded_by) = match raw.version {
            Some(v) => (Some(v.when), v.by.map(|by| by.display_name)),
            None => (None, None),
        };
        AttachmentDescriptor {
            id: raw.id,
            filename: raw.title,
            parent_document_id: document_id.to_string(),
            candidate_addresses,
            size_bytes: raw.extensions.and_then(|e| e.file_size),
            uploaded_at,
            uploaded_by,
            download_url,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        debug!(url = %url, ?query, "GET");
        let response = self
            .http
            .get(url)
            .query(query)
            .basic_auth(&self.credentials.email, Some(&self.credentials.token))
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            error!(status = %status, url = %url, "Confluence API returned error");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.json::<T>().await.map_err(|e| FetchError::Payload {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Every space visible to the account.
    pub async fn list_spaces(&self) -> Result<Vec<Space>, FetchError> {
        let url = format!("{}/rest/api/space", self.base_url);
        let mut spaces = Vec::new();
        let mut start = 0;
        loop {
            let query = [
                ("limit", SPACE_BATCH.to_string()),
                ("start", start.to_string()),
            ];
            let batch: Paged<Space> = self.get_json(&url, &query).await?;
            let size = batch.results.len();
            spaces.extend(batch.results);
            if size < SPACE_BATCH {
                break;
            }
            start += SPACE_BATCH;
        }
        info!(spaces = spaces.len(), "Found accessible spaces");
        Ok(spaces)
    }
}

#[async_trait]
impl ContentSource for ConfluenceClient {
    async fn list_documents(&self, space_key: &str) -> Result<Vec<Document>, FetchError> {
        let url = format!("{}/rest/api/content", self.base_url);
        let mut documents = Vec::new();
        let mut start = 0;
        loop {
            let query = [
                ("spaceKey", space_key.to_string()),
                ("type", "page".to_string()),
                ("status", "current".to_string()),
                ("expand", "ancestors,space,version,body.storage".to_string()),
                ("start", start.to_string()),
                ("limit", PAGE_BATCH.to_string()),
            ];
            let batch: Paged<RawPage> = self.get_json(&url, &query).await?;
            let size = batch.results.len();
            documents.extend(batch.results.into_iter().map(|p| p.into_document(space_key)));

            if let Some(limit) = self.page_limit {
                if documents.len() >= limit {
                    documents.truncate(limit);
                    info!(space_key, limit, "Page limit reached");
                    break;
                }
            }
            if size < PAGE_BATCH {
                break;
            }
            start += PAGE_BATCH;
        }
        info!(space_key, pages = documents.len(), "Listed pages");
        Ok(documents)
    }

    async fn list_attachments(
        &self,
        document_id: &str,
    ) -> Result<Vec<AttachmentDescriptor>, FetchError> {
        let url = format!(
            "{}/rest/api/content/{}/child/attachment",
            self.base_url, document_id
        );
        let query = [
            ("expand", "version,container".to_string()),
            ("limit", ATTACHMENT_BATCH.to_string()),
        ];
        let batch: Paged<RawAttachment> = self.get_json(&url, &query).await?;
        Ok(batch
            .results
            .into_iter()
            .map(|raw| self.descriptor_from(raw, document_id))
            .collect())
    }
}

#[async_trait]
impl AttachmentFetcher for ConfluenceClient {
    async fn fetch(&self, address: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http
            .get(address)
            .basic_auth(&self.credentials.email, Some(&self.credentials.token))
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: address.to_string(),
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: address.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|e| FetchError::Transport {
            url: address.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}
