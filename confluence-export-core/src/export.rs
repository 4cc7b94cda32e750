//! Export pipeline for one or more spaces.
//!
//! Per space the phases run strictly in order:
//!
//! 1. list pages and their attachments through the [`ContentSource`],
//! 2. resolve every attachment into `attachments/` ([`AttachmentResolver`]),
//! 3. build the hierarchy and transpile each page against the finished
//!    [`AttachmentIndex`](crate::attachments::AttachmentIndex),
//! 4. write pages, index files and (optionally) tabular rows.
//!
//! # Error Handling
//! Failing to create the space directory or to list its pages fails that space. Every
//! other failure is scoped to one page or attachment: it is logged, counted in the
//! [`SpaceReport`] and the run continues.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{future, stream, StreamExt};
use tracing::{error, info, warn};

use crate::assemble::{self, AssembledDocument, DocumentAssembler};
use crate::attachments::{AttachmentResolver, AttachmentStore, ATTACHMENTS_README};
use crate::config::{ExportConfig, OutputFormat};
use crate::contract::{AttachmentFetcher, ContentSource};
use crate::error::ExportError;
use crate::hierarchy;
use crate::model::{AttachmentDescriptor, Document};
use crate::sanitize::sanitize;
use crate::tabular::{self, RowBuilder};
use crate::transpile::MacroTranspiler;

pub use crate::assemble::{ATTACHMENTS_DIR, INDEX_FILE};

/// What happened to one space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceReport {
    pub space_key: String,
    pub output_dir: PathBuf,
    pub pages_listed: usize,
    pub pages_written: usize,
    pub page_failures: usize,
    pub attachments_resolved: usize,
    pub attachments_unresolved: usize,
    pub attachment_write_failures: usize,
    /// Pages whose attachment listing failed.
    pub attachment_listing_failures: usize,
    /// Pages in export order, relative to `output_dir`.
    pub written: Vec<PathBuf>,
    pub tabular: Option<(PathBuf, PathBuf)>,
    pub aborted: bool,
}

pub struct SpaceExporter<'a, S, F>
where
    S: ContentSource + ?Sized,
    F: AttachmentFetcher + ?Sized,
{
    source: &'a S,
    fetcher: &'a F,
    transpiler: MacroTranspiler,
    base_url: String,
    output_dir: PathBuf,
    format: OutputFormat,
    concurrency: usize,
    abort: Arc<AtomicBool>,
}

impl<'a, S, F> SpaceExporter<'a, S, F>
where
    S: ContentSource + ?Sized,
    F: AttachmentFetcher + ?Sized,
{
    pub fn new(source: &'a S, fetcher: &'a F, config: &ExportConfig) -> Self {
        Self {
            source,
            fetcher,
            transpiler: MacroTranspiler::new(&config.base_url),
            base_url: config.base_url.clone(),
            output_dir: config.output_dir.clone(),
            format: config.format,
            concurrency: config.concurrency.max(1),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an abort flag (e.g. set from a Ctrl-C handler). Work already started finishes.
    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_transpiler(mut self, transpiler: MacroTranspiler) -> Self {
        self.transpiler = transpiler;
        self
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Directory a space is written to.
    pub fn space_dir(&self, space_key: &str) -> PathBuf {
        let name = sanitize(space_key);
        let name = if name.is_empty() { assemble::UNTITLED.to_string() } else { name };
        self.output_dir.join(name)
    }

    /// Export every space in turn. A failed space does not stop the others.
    pub async fn export_all(&self, spaces: &[String]) -> Vec<(String, Result<SpaceReport, ExportError>)> {
        let mut results = Vec::with_capacity(spaces.len());
        for space_key in spaces {
            if self.aborted() {
                warn!(space_key = %space_key, "Abort requested, skipping remaining spaces");
                break;
            }
            let result = self.export_space(space_key).await;
            if let Err(e) = &result {
                error!(space_key = %space_key, error = %e, "Space export failed");
            }
            results.push((space_key.clone(), result));
        }
        results
    }

    pub async fn export_space(&self, space_key: &str) -> Result<SpaceReport, ExportError> {
        let space_dir = self.space_dir(space_key);
        info!(space_key, path = %space_dir.display(), "Exporting space");
        fs::create_dir_all(&space_dir).map_err(|source| ExportError::OutputRoot {
            path: space_dir.clone(),
            source,
        })?;

        let mut report = SpaceReport {
            space_key: space_key.to_string(),
            output_dir: space_dir.clone(),
            ..SpaceReport::default()
        };

        let documents = self.source.list_documents(space_key).await?;
        report.pages_listed = documents.len();
        if documents.is_empty() {
            warn!(space_key, "No pages found for space");
            return Ok(report);
        }
        info!(space_key, pages = documents.len(), "Fetched page list");

        // Phase 1: every attachment is resolved before any page is transpiled.
        let descriptors = self.list_attachments(&documents, &mut report).await;
        let mut store = AttachmentStore::open(space_dir.join(ATTACHMENTS_DIR)).map_err(|e| match e {
            ExportError::Write { path, source } => ExportError::OutputRoot { path, source },
            other => other,
        })?;
        let outcome = AttachmentResolver::new(self.fetcher)
            .with_concurrency(self.concurrency)
            .with_abort_flag(self.abort.clone())
            .resolve_all(&descriptors, &mut store)
            .await;
        report.attachments_resolved = outcome.index.len();
        report.attachments_unresolved = outcome.unresolved.len();
        report.attachment_write_failures = outcome.write_failures;
        for descriptor in &outcome.unresolved {
            let e = ExportError::AttachmentUnresolved {
                filename: descriptor.filename.clone(),
            };
            warn!(page_id = %descriptor.parent_document_id, error = %e, "References to this attachment get a placeholder");
        }
        let attachments = outcome.index;

        // Phase 2: hierarchy, transpile, assemble.
        let entries = hierarchy::build(&documents);
        for (page_id, missing) in hierarchy::dangling_ancestors(&documents) {
            warn!(page_id, missing = ?missing, "Ancestors outside the exported set are left out of the page path");
        }
        let by_id: std::collections::HashMap<&str, &Document> =
            documents.iter().map(|doc| (doc.id.as_str(), doc)).collect();
        let rows = RowBuilder::new(space_key, &self.base_url, &documents);
        let mut assembler = DocumentAssembler::new();
        let mut assembled: Vec<AssembledDocument> = Vec::new();
        let mut page_rows = Vec::new();

        for entry in hierarchy::ordered(&entries) {
            if self.aborted() {
                warn!(space_key, "Abort requested, no further pages are written");
                report.aborted = true;
                break;
            }
            let Some(document) = by_id.get(entry.document_id.as_str()) else {
                continue;
            };
            let body = self
                .transpiler
                .transpile(&document.raw_body, attachments.view(Some(document.id.as_str())));

            if self.format.writes_tabular() {
                page_rows.push(rows.page_row(document, entry, &body));
            }
            if self.format.writes_markdown() {
                let page = assembler.assemble(document, entry, &body);
                match write_page(&space_dir, &page) {
                    Ok(()) => {
                        info!(page_id = %document.id, title = %document.title, path = %page.relative_path.display(), "Saved page");
                        report.pages_written += 1;
                        report.written.push(page.relative_path.clone());
                        assembled.push(page);
                    }
                    Err(e) => {
                        error!(page_id = %document.id, title = %document.title, error = %e, "Failed to save page");
                        report.page_failures += 1;
                    }
                }
            }
        }

        if self.format.writes_markdown() {
            let index = assemble::space_index(space_key, documents.len(), &assembled, &attachments);
            write_artifact(&space_dir.join(INDEX_FILE), &index);
            if !attachments.is_empty() {
                let summary = assemble::attachments_summary(&attachments);
                write_artifact(&store.dir().join(ATTACHMENTS_README), &summary);
            }
        }

        if self.format.writes_tabular() {
            let attachment_rows: Vec<_> = descriptors
                .iter()
                .map(|descriptor| rows.attachment_row(descriptor, &attachments))
                .collect();
            match tabular::write_rows(&space_dir, space_key, &page_rows, &attachment_rows) {
                Ok(paths) => report.tabular = Some(paths),
                Err(e) => error!(space_key, error = %e, "Failed to write tabular rows"),
            }
        }

        info!(
            space_key,
            pages_written = report.pages_written,
            page_failures = report.page_failures,
            attachments_resolved = report.attachments_resolved,
            attachments_unresolved = report.attachments_unresolved,
            aborted = report.aborted,
            "Space export complete"
        );
        Ok(report)
    }

    /// Attachment descriptors of all pages, in page order. Listing failures are per page.
    async fn list_attachments(
        &self,
        documents: &[Document],
        report: &mut SpaceReport,
    ) -> Vec<AttachmentDescriptor> {
        let listings = stream::iter(documents.iter())
            .take_while(|_| future::ready(!self.aborted()))
            .map(|doc| async move { (doc, self.source.list_attachments(&doc.id).await) })
            .buffered(self.concurrency);
        let mut listings = std::pin::pin!(listings);

        let mut descriptors = Vec::new();
        while let Some((doc, listed)) = listings.next().await {
            match listed {
                Ok(found) => {
                    if !found.is_empty() {
                        info!(page_id = %doc.id, title = %doc.title, attachments = found.len(), "Listed attachments");
                    }
                    descriptors.extend(found);
                }
                Err(e) => {
                    warn!(page_id = %doc.id, title = %doc.title, error = %e, "Failed to list attachments, skipping");
                    report.attachment_listing_failures += 1;
                }
            }
        }
        descriptors
    }
}

fn write_page(space_dir: &Path, page: &AssembledDocument) -> Result<(), ExportError> {
    let path = space_dir.join(&page.relative_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExportError::write(parent, e))?;
    }
    fs::write(&path, &page.content).map_err(|e| ExportError::write(&path, e))
}

fn write_artifact(path: &Path, content: &str) {
    if let Err(e) = fs::write(path, content) {
        error!(path = %path.display(), error = %e, "Failed to write index file");
    }
}
