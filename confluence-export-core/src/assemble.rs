//! Page artifacts and the per-space index files.
//!
//! [`DocumentAssembler`] decides where a page lands (one directory per ancestor, the
//! page itself as `<title>.md`) and prefixes the body with YAML front-matter. The index
//! builders render the space `README.md` and the attachments summary.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::attachments::AttachmentIndex;
use crate::hierarchy::HierarchyEntry;
use crate::model::Document;
use crate::sanitize::{dedupe, sanitize, NameRegistry};
use crate::transpile::escape_link_text;

/// Segment used when a title sanitizes to nothing.
pub const UNTITLED: &str = "untitled";
/// Space index file at the root of a space directory.
pub const INDEX_FILE: &str = "README.md";
/// Attachment store directory at the root of a space directory.
pub const ATTACHMENTS_DIR: &str = "attachments";

/// A page ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
    pub document_id: String,
    pub title: String,
    pub depth: usize,
    /// Destination relative to the space root, e.g. `Root/Child.md`.
    pub relative_path: PathBuf,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct FrontMatter<'a> {
    title: &'a str,
    confluence_id: &'a str,
    space_key: &'a str,
    created: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    author: &'a str,
    version: u32,
    path: String,
}

fn is_blank(value: &&str) -> bool {
    value.is_empty()
}

fn segment(title: &str) -> String {
    let name = sanitize(title);
    if name.is_empty() {
        UNTITLED.to_string()
    } else {
        name
    }
}

/// Places pages in the output tree. Holds the file names handed out so far, so two
/// sibling pages with the same sanitized title get `Title.md` and `Title_1.md`.
///
/// The space root already holds [`INDEX_FILE`] and [`ATTACHMENTS_DIR`]: a root page
/// titled `README` becomes `README_1.md`, and children of a root page titled
/// `attachments` go to `attachments_1/`.
#[derive(Debug)]
pub struct DocumentAssembler {
    names: NameRegistry,
    reserved_dirs: Vec<String>,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAssembler {
    pub fn new() -> Self {
        let mut names = NameRegistry::new();
        names.claim(Path::new(""), INDEX_FILE);
        Self {
            names,
            reserved_dirs: vec![ATTACHMENTS_DIR.to_string()],
        }
    }

    /// Directory name for a root-level ancestor segment, steering clear of reserved names.
    fn root_dir(&self, name: String) -> String {
        if self.reserved_dirs.contains(&name) {
            dedupe(&name, |candidate| self.reserved_dirs.iter().any(|r| r == candidate))
        } else {
            name
        }
    }

    /// Relative destination for a page at `entry`. Claims the file name.
    pub fn destination(&mut self, entry: &HierarchyEntry) -> PathBuf {
        let (own_title, ancestors) = match entry.path.split_last() {
            Some((last, rest)) => (last.as_str(), rest),
            None => ("", &[][..]),
        };
        let dir: PathBuf = ancestors
            .iter()
            .enumerate()
            .map(|(i, title)| {
                let name = segment(title);
                if i == 0 {
                    self.root_dir(name)
                } else {
                    name
                }
            })
            .collect();
        let file_name = self
            .names
            .claim(&dir, &format!("{}.md", segment(own_title)));
        dir.join(file_name)
    }

    /// Front-matter followed by a blank line and the body.
    pub fn render(document: &Document, entry: &HierarchyEntry, body: &str) -> String {
        let front_matter = FrontMatter {
            title: &document.title,
            confluence_id: &document.id,
            space_key: &document.space_key,
            created: &document.version.created_at,
            author: &document.version.author_name,
            version: document.version.version_number,
            path: entry.path.join(" > "),
        };
        let yaml = serde_yaml::to_string(&front_matter).unwrap_or_else(|_| {
            format!("title: {}\n", document.title)
        });
        format!("---\n{yaml}---\n\n{body}")
    }

    pub fn assemble(
        &mut self,
        document: &Document,
        entry: &HierarchyEntry,
        body: &str,
    ) -> AssembledDocument {
        AssembledDocument {
            document_id: document.id.clone(),
            title: document.title.clone(),
            depth: entry.depth,
            relative_path: self.destination(entry),
            content: Self::render(document, entry, body),
        }
    }
}

/// `./a/b.md` style link with forward slashes on every platform.
fn link_target(relative: &Path) -> String {
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("./{joined}")
}

/// Space `README.md`: counts, attachment links and the page tree in export order.
pub fn space_index(
    space_key: &str,
    page_count: usize,
    documents: &[AssembledDocument],
    attachments: &AttachmentIndex,
) -> String {
    let mut out = format!("# {space_key} Space Export\n\n");
    out.push_str(&format!(
        "Exported {page_count} pages and {} attachments\n\n",
        attachments.len()
    ));

    if !attachments.is_empty() {
        out.push_str("## Attachments:\n\n");
        let mut entries: Vec<_> = attachments.iter().collect();
        entries.sort_by(|a, b| a.filename.cmp(&b.filename).then(a.local_name.cmp(&b.local_name)));
        for attachment in entries {
            out.push_str(&format!(
                "- [{}](./{})\n",
                escape_link_text(&attachment.filename),
                attachment.relative_href()
            ));
        }
        out.push('\n');
    }

    out.push_str("## Page Hierarchy:\n\n");
    for doc in documents {
        out.push_str(&format!(
            "{}- [{}]({})\n",
            "  ".repeat(doc.depth),
            escape_link_text(&doc.title),
            link_target(&doc.relative_path)
        ));
    }
    out
}

/// `attachments/README.md`: one line per stored file with its size.
pub fn attachments_summary(attachments: &AttachmentIndex) -> String {
    let mut out = String::from("# Attachments Summary\n\n");
    for attachment in attachments.iter() {
        out.push_str(&format!(
            "- **{}** ({} bytes)\n",
            attachment.local_name,
            group_thousands(attachment.size_bytes)
        ));
    }
    out
}

/// `1234567` → `1,234,567`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
