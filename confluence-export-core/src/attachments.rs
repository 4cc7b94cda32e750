//! Attachment resolution: candidate addresses, the local store and the resolved index.
//!
//! Resolution is its own phase. [`AttachmentResolver::resolve_all`] downloads every
//! attachment of a space and returns an immutable [`AttachmentIndex`]; only then does
//! transpilation start, so a page may reference an attachment that belongs to a page
//! fetched later.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{future, stream, StreamExt};
use tracing::{debug, info, warn};

use crate::contract::AttachmentFetcher;
use crate::error::ExportError;
use crate::model::{AttachmentDescriptor, ResolvedAttachment};
use crate::sanitize::{sanitize, NameRegistry};

/// Name of the summary file kept next to the attachments.
pub const ATTACHMENTS_README: &str = "README.md";

/// Raw attachment facts the address strategies work from.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentRef<'a> {
    pub id: &'a str,
    pub filename: &'a str,
    /// Id of the page the attachment is stored under.
    pub container_id: &'a str,
    /// `_links.download` as advertised by the server, usually relative to the base URL.
    pub download_link: Option<&'a str>,
}

/// Ways of turning an attachment into a download URL. Confluence deployments disagree
/// on which one works, so all of them are tried in [`AddressStrategy::DEFAULT`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressStrategy {
    /// The server-advertised download link.
    DownloadLink,
    /// `{base}/rest/api/content/{id}/data`
    ContentData,
    /// `{root}/wiki/download/attachments/{container}/{filename}`
    WikiDownload,
    /// `{root}/download/attachments/{container}/{filename}`
    RootDownload,
}

impl AddressStrategy {
    pub const DEFAULT: [AddressStrategy; 4] = [
        AddressStrategy::DownloadLink,
        AddressStrategy::ContentData,
        AddressStrategy::WikiDownload,
        AddressStrategy::RootDownload,
    ];

    /// Address produced by this strategy, or `None` when the inputs it needs are missing.
    pub fn address(&self, base_url: &str, attachment: &AttachmentRef<'_>) -> Option<String> {
        let base = base_url.trim_end_matches('/');
        let root = base.replace("/wiki", "");
        let filename = urlencoding::encode(attachment.filename);
        match self {
            AddressStrategy::DownloadLink => {
                let link = attachment.download_link.filter(|l| !l.is_empty())?;
                if link.starts_with("http://") || link.starts_with("https://") {
                    Some(link.to_string())
                } else if link.starts_with('/') {
                    Some(format!("{base}{link}"))
                } else {
                    Some(format!("{base}/{link}"))
                }
            }
            AddressStrategy::ContentData => {
                if attachment.id.is_empty() {
                    return None;
                }
                Some(format!("{base}/rest/api/content/{}/data", attachment.id))
            }
            AddressStrategy::WikiDownload => {
                if attachment.container_id.is_empty() {
                    return None;
                }
                Some(format!(
                    "{root}/wiki/download/attachments/{}/{filename}",
                    attachment.container_id
                ))
            }
            AddressStrategy::RootDownload => {
                if attachment.container_id.is_empty() {
                    return None;
                }
                Some(format!(
                    "{root}/download/attachments/{}/{filename}",
                    attachment.container_id
                ))
            }
        }
    }
}

/// Apply `strategies` in order, skipping unusable ones and repeated addresses.
pub fn candidate_addresses(
    base_url: &str,
    attachment: &AttachmentRef<'_>,
    strategies: &[AddressStrategy],
) -> Vec<String> {
    let mut addresses: Vec<String> = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        if let Some(address) = strategy.address(base_url, attachment) {
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }
    }
    addresses
}

/// The `attachments/` directory of one space. Single writer: every file goes through
/// [`AttachmentStore::write`], which owns the deduplication counter.
#[derive(Debug)]
pub struct AttachmentStore {
    dir: PathBuf,
    names: NameRegistry,
}

impl AttachmentStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ExportError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| ExportError::write(&dir, e))?;
        let mut names = NameRegistry::new();
        names.claim(&dir, ATTACHMENTS_README);
        Ok(Self { dir, names })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `payload` under a sanitized, deduplicated version of `filename`.
    /// Returns the name used and the full path.
    pub fn write(&mut self, filename: &str, payload: &[u8]) -> Result<(String, PathBuf), ExportError> {
        let mut base = sanitize(filename);
        if base.is_empty() {
            base = "attachment".to_string();
        }
        let local_name = self.names.claim(&self.dir, &base);
        let path = self.dir.join(&local_name);
        std::fs::write(&path, payload).map_err(|e| ExportError::write(&path, e))?;
        Ok((local_name, path))
    }
}

/// Immutable result of the resolution phase.
///
/// Lookups prefer the attachment uploaded to the referencing page; the space-wide
/// filename map (last write wins) is the fallback for cross-page references.
#[derive(Debug, Default, Clone)]
pub struct AttachmentIndex {
    entries: Vec<ResolvedAttachment>,
    by_name: HashMap<String, usize>,
    by_page: HashMap<(String, String), usize>,
}

impl AttachmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resolved: ResolvedAttachment) {
        let idx = self.entries.len();
        self.by_name.insert(resolved.filename.clone(), idx);
        self.by_page.insert(
            (resolved.parent_document_id.clone(), resolved.filename.clone()),
            idx,
        );
        self.entries.push(resolved);
    }

    /// Space-wide lookup by original filename.
    pub fn get(&self, filename: &str) -> Option<&ResolvedAttachment> {
        self.by_name.get(filename).map(|&idx| &self.entries[idx])
    }

    /// Lookup restricted to attachments uploaded to `document_id`.
    pub fn get_for_document(&self, document_id: &str, filename: &str) -> Option<&ResolvedAttachment> {
        self.by_page
            .get(&(document_id.to_string(), filename.to_string()))
            .map(|&idx| &self.entries[idx])
    }

    /// All resolved attachments in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedAttachment> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// View used while transpiling one page.
    pub fn view<'a>(&'a self, document_id: Option<&'a str>) -> AttachmentView<'a> {
        AttachmentView {
            index: self,
            document_id,
        }
    }
}

/// Attachment lookups from the point of view of one page.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentView<'a> {
    index: &'a AttachmentIndex,
    document_id: Option<&'a str>,
}

impl<'a> AttachmentView<'a> {
    pub fn lookup(&self, filename: &str) -> Option<&'a ResolvedAttachment> {
        self.document_id
            .and_then(|id| self.index.get_for_document(id, filename))
            .or_else(|| self.index.get(filename))
    }

    /// Lookup of an attachment explicitly owned by another page (`ri:content-entity` inside `ri:attachment`).
    pub fn lookup_on(&self, document_id: &str, filename: &str) -> Option<&'a ResolvedAttachment> {
        self.index
            .get_for_document(document_id, filename)
            .or_else(|| self.index.get(filename))
    }
}

/// Outcome of resolving a single attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedAttachment),
    NotFound,
}

/// Everything the resolution phase produced for one space.
#[derive(Debug, Default)]
pub struct ResolutionOutcome {
    pub index: AttachmentIndex,
    /// Attachments no candidate address could deliver.
    pub unresolved: Vec<AttachmentDescriptor>,
    /// Attachments that were downloaded but could not be written.
    pub write_failures: usize,
}

/// Downloads attachments through an [`AttachmentFetcher`], first successful candidate wins.
pub struct AttachmentResolver<'a, F: AttachmentFetcher + ?Sized> {
    fetcher: &'a F,
    concurrency: usize,
    abort: Option<Arc<AtomicBool>>,
}

impl<'a, F: AttachmentFetcher + ?Sized> AttachmentResolver<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self {
            fetcher,
            concurrency: 1,
            abort: None,
        }
    }

    /// Number of downloads allowed in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Once the flag is set no new downloads are started.
    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = Some(abort);
        self
    }

    fn aborted(&self) -> bool {
        self.abort
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Try each candidate address in order and return the first payload delivered.
    pub async fn fetch_first(&self, descriptor: &AttachmentDescriptor) -> Option<(String, Vec<u8>)> {
        for address in &descriptor.candidate_addresses {
            match self.fetcher.fetch(address).await {
                Ok(payload) => {
                    debug!(
                        filename = %descriptor.filename,
                        address = %address,
                        bytes = payload.len(),
                        "Attachment candidate succeeded"
                    );
                    return Some((address.clone(), payload));
                }
                Err(e) => {
                    debug!(filename = %descriptor.filename, address = %address, error = %e, "Attachment candidate failed");
                }
            }
        }
        warn!(
            filename = %descriptor.filename,
            attachment_id = %descriptor.id,
            candidates = descriptor.candidate_addresses.len(),
            "Could not download attachment - all candidate addresses failed"
        );
        None
    }

    /// Resolve a single attachment into `store`.
    pub async fn resolve(
        &self,
        descriptor: &AttachmentDescriptor,
        store: &mut AttachmentStore,
    ) -> Result<Resolution, ExportError> {
        match self.fetch_first(descriptor).await {
            Some((_, payload)) => Ok(Resolution::Resolved(store_payload(store, descriptor, &payload)?)),
            None => Ok(Resolution::NotFound),
        }
    }

    /// Resolve every descriptor, downloading up to `concurrency` at a time.
    ///
    /// Results are consumed in descriptor order by this single writer, so suffixes
    /// like `logo_1.png` do not depend on which download finished first.
    pub async fn resolve_all(
        &self,
        descriptors: &[AttachmentDescriptor],
        store: &mut AttachmentStore,
    ) -> ResolutionOutcome {
        let mut outcome = ResolutionOutcome::default();
        let fetches = stream::iter(descriptors.iter())
            .take_while(|_| future::ready(!self.aborted()))
            .map(|descriptor| async move { (descriptor, self.fetch_first(descriptor).await) })
            .buffered(self.concurrency);
        let mut fetches = std::pin::pin!(fetches);

        while let Some((descriptor, fetched)) = fetches.next().await {
            let Some((_, payload)) = fetched else {
                outcome.unresolved.push(descriptor.clone());
                continue;
            };
            match store_payload(store, descriptor, &payload) {
                Ok(resolved) => outcome.index.insert(resolved),
                Err(e) => {
                    warn!(filename = %descriptor.filename, error = %e, "Failed to write attachment, skipping");
                    outcome.write_failures += 1;
                }
            }
        }

        if self.aborted() {
            warn!(
                resolved = outcome.index.len(),
                total = descriptors.len(),
                "Attachment resolution aborted before all downloads were started"
            );
        }
        info!(
            resolved = outcome.index.len(),
            unresolved = outcome.unresolved.len(),
            write_failures = outcome.write_failures,
            "Attachment resolution finished"
        );
        outcome
    }
}

fn store_payload(
    store: &mut AttachmentStore,
    descriptor: &AttachmentDescriptor,
    payload: &[u8],
) -> Result<ResolvedAttachment, ExportError> {
    let (local_name, local_path) = store.write(&descriptor.filename, payload)?;
    info!(filename = %descriptor.filename, path = %local_path.display(), "Downloaded attachment");
    Ok(ResolvedAttachment {
        filename: descriptor.filename.clone(),
        local_name,
        local_path,
        attachment_id: descriptor.id.clone(),
        parent_document_id: descriptor.parent_document_id.clone(),
        size_bytes: payload.len() as u64,
    })
}
