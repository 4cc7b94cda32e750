//! Flatten a finished space export for tools that cannot import nested folders.
//!
//! The result has two directories: `pages/` holds every page under a name derived from
//! its former relative path (`Root/Child.md` → `Root_Child.md`) and `attachments/` holds
//! every attachment. Attachment references in page bodies are rewritten to
//! `../attachments/<file>` so they still resolve from inside `pages/`. An attachment that
//! collides with one already copied is stored as `<stem>_<n>.<ext>`, and pages exported
//! alongside it link to that name.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::ExportError;
use crate::sanitize::NameRegistry;

pub const PAGES_DIR: &str = "pages";
pub use crate::assemble::ATTACHMENTS_DIR;
const README: &str = "README.md";

static ATTACHMENT_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((?:\.\./|\./)?attachments/([^)\s]+)").expect("valid regex")
});

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlattenReport {
    pub pages: usize,
    pub attachments: usize,
    /// Files that could not be read or written and were skipped.
    pub skipped: usize,
}

/// Original attachment name to the name it was copied under, for one export root.
pub type Renames = HashMap<String, String>;

/// Point every `(attachments/<file>` link target one directory up, following `renames`
/// for files that were copied under a different name.
pub fn rewrite_attachment_links(content: &str, renames: &Renames) -> String {
    ATTACHMENT_REF
        .replace_all(content, |caps: &Captures<'_>| {
            let name = &caps[1];
            let name = renames.get(name).map(String::as_str).unwrap_or(name);
            format!("(../attachments/{name}")
        })
        .into_owned()
}

/// Flat page name for a page at `relative` inside the export.
pub fn flat_page_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("_")
        .replace(' ', "_")
}

/// For a file below an `attachments/` directory: the directory holding that
/// `attachments/` and the file's path inside it, `/`-separated.
fn attachment_location(relative: &Path) -> Option<(PathBuf, String)> {
    let parts: Vec<_> = relative.components().map(|c| c.as_os_str()).collect();
    let dirs = parts.len().checked_sub(1)?;
    let pos = parts[..dirs].iter().rposition(|c| *c == ATTACHMENTS_DIR)?;
    let root: PathBuf = parts[..pos].iter().collect();
    let name = parts[pos + 1..]
        .iter()
        .map(|c| c.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Some((root, name))
}

/// Renames recorded for the nearest export root above `relative`.
fn renames_for<'a>(
    relative: &Path,
    by_root: &'a HashMap<PathBuf, Renames>,
) -> Option<&'a Renames> {
    relative.ancestors().skip(1).find_map(|dir| by_root.get(dir))
}

fn walk_files(input: &Path) -> Vec<PathBuf> {
    WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn create_dir(path: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(path).map_err(|source| ExportError::OutputRoot {
        path: path.to_path_buf(),
        source,
    })
}

/// Flatten the export at `input` into `output`.
///
/// Only failing to create the output directories is fatal; unreadable or unwritable
/// files are logged and counted in [`FlattenReport::skipped`].
pub fn flatten(input: &Path, output: &Path) -> Result<FlattenReport, ExportError> {
    let pages_dir = output.join(PAGES_DIR);
    let attachments_dir = output.join(ATTACHMENTS_DIR);
    create_dir(&pages_dir)?;
    create_dir(&attachments_dir)?;

    let mut report = FlattenReport::default();
    let mut names = NameRegistry::new();
    let mut renames: HashMap<PathBuf, Renames> = HashMap::new();
    let no_renames = Renames::new();

    let files = walk_files(input);
    let mut pages = Vec::new();

    // attachments first, so page links can follow any rename
    for path in files {
        let relative = path.strip_prefix(input).unwrap_or(&path).to_path_buf();
        let is_markdown = path.extension().is_some_and(|ext| ext == "md");

        let Some((root, original)) = attachment_location(&relative) else {
            let is_readme = path.file_name().is_some_and(|n| n == README);
            if is_markdown && !is_readme {
                pages.push((path, relative));
            }
            continue;
        };
        if is_markdown {
            continue;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let claimed = names.claim(&attachments_dir, &file_name);
        let target = attachments_dir.join(&claimed);
        match fs::copy(&path, &target) {
            Ok(_) => {
                report.attachments += 1;
                if claimed != original {
                    renames.entry(root).or_default().insert(original, claimed);
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to copy attachment, skipping");
                report.skipped += 1;
            }
        }
    }

    for (path, relative) in pages {
        let content = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read page, skipping");
                report.skipped += 1;
                continue;
            }
        };
        let links = renames_for(&relative, &renames).unwrap_or(&no_renames);
        let target = pages_dir.join(names.claim(&pages_dir, &flat_page_name(&relative)));
        match fs::write(&target, rewrite_attachment_links(&content, links)) {
            Ok(()) => report.pages += 1,
            Err(e) => {
                warn!(path = %target.display(), error = %e, "Failed to write page, skipping");
                report.skipped += 1;
            }
        }
    }

    let readme = output.join(README);
    fs::write(&readme, summary(&report)).map_err(|e| ExportError::write(&readme, e))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        pages = report.pages,
        attachments = report.attachments,
        skipped = report.skipped,
        "Flattened export"
    );
    Ok(report)
}

fn summary(report: &FlattenReport) -> String {
    format!(
        "# Confluence Import\n\n\
         ## Summary\n\
         - **Pages**: {}\n\
         - **Attachments**: {}\n\n\
         ## Structure\n\
         - `pages/` - All markdown files (flattened)\n\
         - `attachments/` - All images and files\n\n\
         ## Notes\n\
         - Attachment paths are relative to `pages/`\n\
         - The original hierarchy is kept in file names and in the `path` front-matter field\n",
        report.pages, report.attachments
    )
}
