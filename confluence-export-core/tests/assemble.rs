use confluence_export_core::assemble::{
    attachments_summary, group_thousands, space_index, AssembledDocument, DocumentAssembler,
};
use confluence_export_core::attachments::AttachmentIndex;
use confluence_export_core::hierarchy::HierarchyEntry;
use confluence_export_core::model::{Document, ResolvedAttachment, VersionInfo};
use std::path::PathBuf;

fn entry(id: &str, path: &[&str]) -> HierarchyEntry {
    HierarchyEntry {
        document_id: id.to_string(),
        path: path.iter().map(|s| s.to_string()).collect(),
        depth: path.len().saturating_sub(1),
    }
}

fn document(id: &str, title: &str, author: &str) -> Document {
    Document {
        id: id.to_string(),
        title: title.to_string(),
        space_key: "OPS".to_string(),
        space_name: None,
        ancestors: Vec::new(),
        raw_body: String::new(),
        version: VersionInfo {
            created_at: "2023-11-05T08:00:00Z".to_string(),
            author_name: author.to_string(),
            version_number: 7,
        },
    }
}

fn resolved(filename: &str, local_name: &str, size_bytes: u64) -> ResolvedAttachment {
    ResolvedAttachment {
        filename: filename.to_string(),
        local_name: local_name.to_string(),
        local_path: PathBuf::from("attachments").join(local_name),
        attachment_id: format!("att-{local_name}"),
        parent_document_id: "1".to_string(),
        size_bytes,
    }
}

#[test]
fn test_destination_nests_pages_under_ancestor_directories() {
    let mut assembler = DocumentAssembler::new();
    assert_eq!(
        assembler.destination(&entry("1", &["Root"])),
        PathBuf::from("Root.md")
    );
    assert_eq!(
        assembler.destination(&entry("3", &["Root", "Child: One", "Leaf"])),
        PathBuf::from("Root/Child__One/Leaf.md")
    );
}

#[test]
fn test_destination_deduplicates_sibling_names() {
    let mut assembler = DocumentAssembler::new();
    let first = assembler.destination(&entry("2", &["Root", "Child"]));
    let second = assembler.destination(&entry("5", &["Root", "Child"]));
    let elsewhere = assembler.destination(&entry("6", &["Other", "Child"]));
    assert_eq!(first, PathBuf::from("Root/Child.md"));
    assert_eq!(second, PathBuf::from("Root/Child_1.md"));
    assert_eq!(elsewhere, PathBuf::from("Other/Child.md"));
}

#[test]
fn test_destination_falls_back_for_empty_titles() {
    let mut assembler = DocumentAssembler::new();
    assert_eq!(
        assembler.destination(&entry("9", &["???", "..."])),
        PathBuf::from("untitled/untitled.md")
    );
}

#[test]
fn test_destination_avoids_index_and_attachment_store() {
    let mut assembler = DocumentAssembler::new();
    assert_eq!(
        assembler.destination(&entry("1", &["README"])),
        PathBuf::from("README_1.md")
    );
    assert_eq!(
        assembler.destination(&entry("2", &["attachments"])),
        PathBuf::from("attachments.md")
    );
    assert_eq!(
        assembler.destination(&entry("3", &["attachments", "logo"])),
        PathBuf::from("attachments_1/logo.md")
    );
    assert_eq!(
        assembler.destination(&entry("4", &["Guides", "README"])),
        PathBuf::from("Guides/README.md")
    );
    assert_eq!(
        assembler.destination(&entry("5", &["Guides", "attachments", "logo"])),
        PathBuf::from("Guides/attachments/logo.md")
    );
}

#[test]
fn test_render_prefixes_front_matter() {
    let doc = document("42", "Runbook", "Lin");
    let rendered = DocumentAssembler::render(&doc, &entry("42", &["Ops", "Runbook"]), "Body");

    assert!(rendered.starts_with("---\ntitle: Runbook\n"));
    assert!(rendered.contains("space_key: OPS\n"));
    assert!(rendered.contains("author: Lin\n"));
    assert!(rendered.contains("version: 7\n"));
    assert!(rendered.ends_with("\n---\n\nBody"));

    let front_matter = rendered
        .trim_start_matches("---\n")
        .split("\n---\n")
        .next()
        .unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(front_matter).unwrap();
    assert_eq!(parsed["confluence_id"].as_str(), Some("42"));
    assert_eq!(parsed["created"].as_str(), Some("2023-11-05T08:00:00Z"));
    assert_eq!(parsed["path"].as_str(), Some("Ops > Runbook"));
}

#[test]
fn test_render_omits_unknown_author() {
    let doc = document("1", "Anon", "");
    let rendered = DocumentAssembler::render(&doc, &entry("1", &["Anon"]), "");
    assert!(!rendered.contains("author:"));
}

#[test]
fn test_render_quotes_titles_that_need_it() {
    let doc = document("1", "Q&A: what's: new?", "");
    let rendered = DocumentAssembler::render(&doc, &entry("1", &["Q&A: what's: new?"]), "");
    let front_matter = rendered
        .trim_start_matches("---\n")
        .split("\n---\n")
        .next()
        .unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(front_matter).unwrap();
    assert_eq!(parsed["title"].as_str(), Some("Q&A: what's: new?"));
}

#[test]
fn test_assemble_combines_destination_and_content() {
    let mut assembler = DocumentAssembler::new();
    let doc = document("2", "Child", "Lin");
    let assembled = assembler.assemble(&doc, &entry("2", &["Root", "Child"]), "text");
    assert_eq!(assembled.document_id, "2");
    assert_eq!(assembled.depth, 1);
    assert_eq!(assembled.relative_path, PathBuf::from("Root/Child.md"));
    assert!(assembled.content.ends_with("text"));
}

#[test]
fn test_space_index_lists_attachments_and_indented_tree() {
    let mut index = AttachmentIndex::new();
    index.insert(resolved("zeta.pdf", "zeta.pdf", 10));
    index.insert(resolved("alpha.png", "alpha.png", 20));

    let pages = vec![
        AssembledDocument {
            document_id: "1".to_string(),
            title: "Root".to_string(),
            depth: 0,
            relative_path: PathBuf::from("Root.md"),
            content: String::new(),
        },
        AssembledDocument {
            document_id: "2".to_string(),
            title: "Child".to_string(),
            depth: 1,
            relative_path: PathBuf::from("Root").join("Child.md"),
            content: String::new(),
        },
    ];

    let readme = space_index("OPS", 2, &pages, &index);
    assert_eq!(
        readme,
        "# OPS Space Export\n\n\
         Exported 2 pages and 2 attachments\n\n\
         ## Attachments:\n\n\
         - [alpha.png](./attachments/alpha.png)\n\
         - [zeta.pdf](./attachments/zeta.pdf)\n\n\
         ## Page Hierarchy:\n\n\
         - [Root](./Root.md)\n\
         \x20 - [Child](./Root/Child.md)\n"
    );
}

#[test]
fn test_space_index_without_attachments() {
    let readme = space_index("OPS", 0, &[], &AttachmentIndex::new());
    assert_eq!(
        readme,
        "# OPS Space Export\n\nExported 0 pages and 0 attachments\n\n## Page Hierarchy:\n\n"
    );
}

#[test]
fn test_space_index_escapes_brackets_in_link_text() {
    let mut index = AttachmentIndex::new();
    index.insert(resolved("[draft] plan.pdf", "_draft__plan.pdf", 5));
    let pages = vec![AssembledDocument {
        document_id: "1".to_string(),
        title: "Notes [old]".to_string(),
        depth: 0,
        relative_path: PathBuf::from("Notes__old_.md"),
        content: String::new(),
    }];

    let readme = space_index("OPS", 1, &pages, &index);
    assert!(readme.contains("- [\\[draft\\] plan.pdf](./attachments/_draft__plan.pdf)\n"));
    assert!(readme.contains("- [Notes \\[old\\]](./Notes__old_.md)\n"));
}

#[test]
fn test_attachments_summary_uses_grouped_sizes() {
    let mut index = AttachmentIndex::new();
    index.insert(resolved("big.zip", "big.zip", 1_234_567));
    index.insert(resolved("logo.png", "logo_1.png", 999));
    assert_eq!(
        attachments_summary(&index),
        "# Attachments Summary\n\n- **big.zip** (1,234,567 bytes)\n- **logo_1.png** (999 bytes)\n"
    );
}

#[test]
fn test_group_thousands() {
    assert_eq!(group_thousands(0), "0");
    assert_eq!(group_thousands(999), "999");
    assert_eq!(group_thousands(1000), "1,000");
    assert_eq!(group_thousands(12_345_678), "12,345,678");
}
