//! One record per page and one per attachment, for spreadsheet-style imports.
//!
//! Rows are written as JSON arrays (`<space>_pages.json`, `<space>_attachments.json`)
//! whose object keys are the column headers.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::attachments::AttachmentIndex;
use crate::error::ExportError;
use crate::hierarchy::HierarchyEntry;
use crate::model::{AttachmentDescriptor, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileType {
    Image,
    #[serde(rename = "PDF")]
    Pdf,
    #[serde(rename = "Word Document")]
    Word,
    #[serde(rename = "Excel Document")]
    Excel,
    PowerPoint,
    Archive,
    Other,
}

impl FileType {
    /// Classify by lowercased extension (with the dot, as returned by [`extension`]).
    pub fn classify(extension: &str) -> Self {
        match extension {
            ".png" | ".jpg" | ".jpeg" | ".gif" | ".svg" | ".webp" => FileType::Image,
            ".pdf" => FileType::Pdf,
            ".docx" | ".doc" => FileType::Word,
            ".xlsx" | ".xls" => FileType::Excel,
            ".pptx" | ".ppt" => FileType::PowerPoint,
            ".zip" | ".rar" | ".7z" => FileType::Archive,
            _ => FileType::Other,
        }
    }
}

/// Lowercased extension including the dot, or an empty string.
pub fn extension(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => filename[idx..].to_lowercase(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "Project")]
    pub project: String,
    #[serde(rename = "Parent Page")]
    pub parent_page: String,
    #[serde(rename = "Source ID")]
    pub source_id: String,
    #[serde(rename = "Space Name")]
    pub space_name: String,
    #[serde(rename = "Created Date")]
    pub created_date: String,
    #[serde(rename = "Created By")]
    pub created_by: String,
    #[serde(rename = "Version")]
    pub version: u32,
    #[serde(rename = "Hierarchy Path")]
    pub hierarchy_path: String,
    #[serde(rename = "Hierarchy Level")]
    pub hierarchy_level: usize,
    #[serde(rename = "Source URL")]
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRow {
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "Page Name")]
    pub page_name: String,
    #[serde(rename = "Page ID")]
    pub page_id: String,
    #[serde(rename = "Project")]
    pub project: String,
    #[serde(rename = "File Type")]
    pub file_type: FileType,
    #[serde(rename = "Extension")]
    pub extension: String,
    #[serde(rename = "Attachment ID")]
    pub attachment_id: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "Uploaded Date")]
    pub uploaded_date: String,
    #[serde(rename = "Uploaded By")]
    pub uploaded_by: String,
    #[serde(rename = "Local File Path")]
    pub local_file_path: String,
    #[serde(rename = "Download URL")]
    pub download_url: String,
}

/// Builds rows for one space. Parent titles are looked up among the exported pages only.
pub struct RowBuilder<'a> {
    space_key: &'a str,
    base_url: &'a str,
    titles: HashMap<&'a str, &'a str>,
}

impl<'a> RowBuilder<'a> {
    pub fn new(space_key: &'a str, base_url: &'a str, documents: &'a [Document]) -> Self {
        let titles = documents
            .iter()
            .map(|doc| (doc.id.as_str(), doc.title.as_str()))
            .collect();
        Self {
            space_key,
            base_url: base_url.trim_end_matches('/'),
            titles,
        }
    }

    pub fn page_row(&self, document: &Document, entry: &HierarchyEntry, body: &str) -> PageRow {
        let parent_page = document
            .parent_id()
            .and_then(|id| self.titles.get(id))
            .map(|title| title.to_string())
            .unwrap_or_default();
        PageRow {
            name: document.title.clone(),
            content: body.to_string(),
            project: self.space_key.to_string(),
            parent_page,
            source_id: document.id.clone(),
            space_name: document.space_name.clone().unwrap_or_default(),
            created_date: document.version.created_at.clone(),
            created_by: document.version.author_name.clone(),
            version: document.version.version_number.max(1),
            hierarchy_path: entry.path.join(" > "),
            hierarchy_level: entry.depth,
            source_url: format!(
                "{}/spaces/{}/pages/{}",
                self.base_url, self.space_key, document.id
            ),
        }
    }

    /// Row for `descriptor`; `Local File Path` is empty when it was never stored.
    pub fn attachment_row(
        &self,
        descriptor: &AttachmentDescriptor,
        attachments: &AttachmentIndex,
    ) -> AttachmentRow {
        let extension = extension(&descriptor.filename);
        let resolved =
            attachments.get_for_document(&descriptor.parent_document_id, &descriptor.filename);
        AttachmentRow {
            filename: descriptor.filename.clone(),
            page_name: self
                .titles
                .get(descriptor.parent_document_id.as_str())
                .map(|title| title.to_string())
                .unwrap_or_default(),
            page_id: descriptor.parent_document_id.clone(),
            project: self.space_key.to_string(),
            file_type: FileType::classify(&extension),
            extension,
            attachment_id: descriptor.id.clone(),
            size: descriptor
                .size_bytes
                .or_else(|| resolved.map(|r| r.size_bytes))
                .unwrap_or(0),
            uploaded_date: descriptor.uploaded_at.clone().unwrap_or_default(),
            uploaded_by: descriptor.uploaded_by.clone().unwrap_or_default(),
            local_file_path: resolved
                .map(|r| r.local_path.display().to_string())
                .unwrap_or_default(),
            download_url: descriptor.download_url.clone().unwrap_or_default(),
        }
    }
}

fn write_json<T: Serialize>(path: &Path, rows: &[T], what: &'static str) -> Result<(), ExportError> {
    let json = serde_json::to_vec_pretty(rows).map_err(|source| ExportError::Serialize { what, source })?;
    fs::write(path, json).map_err(|e| ExportError::write(path, e))
}

/// Write both row sets into `dir`, returning the two file paths.
pub fn write_rows(
    dir: &Path,
    space_key: &str,
    pages: &[PageRow],
    attachments: &[AttachmentRow],
) -> Result<(PathBuf, PathBuf), ExportError> {
    let pages_path = dir.join(format!("{space_key}_pages.json"));
    let attachments_path = dir.join(format!("{space_key}_attachments.json"));
    write_json(&pages_path, pages, "page rows")?;
    write_json(&attachments_path, attachments, "attachment rows")?;
    info!(
        space_key,
        pages = pages.len(),
        attachments = attachments.len(),
        path = %dir.display(),
        "Wrote tabular rows"
    );
    Ok((pages_path, attachments_path))
}
