use confluence_export_core::attachments::AttachmentIndex;
use confluence_export_core::hierarchy::build;
use confluence_export_core::model::{
    Ancestor, AttachmentDescriptor, Document, ResolvedAttachment, VersionInfo,
};
use confluence_export_core::tabular::{extension, write_rows, FileType, RowBuilder};
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_extension_is_lowercased_with_dot() {
    assert_eq!(extension("Report.PDF"), ".pdf");
    assert_eq!(extension("archive.tar.gz"), ".gz");
    assert_eq!(extension("README"), "");
    assert_eq!(extension(".bashrc"), "");
}

#[test]
fn test_file_type_classification() {
    assert_eq!(FileType::classify(".jpeg"), FileType::Image);
    assert_eq!(FileType::classify(".svg"), FileType::Image);
    assert_eq!(FileType::classify(".pdf"), FileType::Pdf);
    assert_eq!(FileType::classify(".doc"), FileType::Word);
    assert_eq!(FileType::classify(".xlsx"), FileType::Excel);
    assert_eq!(FileType::classify(".pptx"), FileType::PowerPoint);
    assert_eq!(FileType::classify(".7z"), FileType::Archive);
    assert_eq!(FileType::classify(&extension("archive.tar.gz")), FileType::Other);
    assert_eq!(FileType::classify(""), FileType::Other);
}

#[test]
fn test_file_type_column_values() {
    assert_eq!(
        serde_json::to_string(&FileType::Word).unwrap(),
        "\"Word Document\""
    );
    assert_eq!(serde_json::to_string(&FileType::Pdf).unwrap(), "\"PDF\"");
    assert_eq!(
        serde_json::to_string(&FileType::PowerPoint).unwrap(),
        "\"PowerPoint\""
    );
}

fn documents() -> Vec<Document> {
    vec![
        Document {
            id: "10".to_string(),
            title: "Parent".to_string(),
            space_key: "ENG".to_string(),
            space_name: None,
            ancestors: Vec::new(),
            raw_body: String::new(),
            version: VersionInfo::default(),
        },
        Document {
            id: "11".to_string(),
            title: "Kid".to_string(),
            space_key: "ENG".to_string(),
            space_name: Some("Engineering".to_string()),
            ancestors: vec![Ancestor {
                id: "10".to_string(),
                title: "Parent".to_string(),
            }],
            raw_body: String::new(),
            version: VersionInfo {
                created_at: "2024-01-01".to_string(),
                author_name: "Grace".to_string(),
                version_number: 0,
            },
        },
    ]
}

#[test]
fn test_page_row_columns() {
    let docs = documents();
    let entries = build(&docs);
    let rows = RowBuilder::new("ENG", "https://acme.atlassian.net/wiki/", &docs);

    let row = rows.page_row(&docs[1], &entries["11"], "Body text");
    assert_eq!(row.name, "Kid");
    assert_eq!(row.content, "Body text");
    assert_eq!(row.project, "ENG");
    assert_eq!(row.parent_page, "Parent");
    assert_eq!(row.space_name, "Engineering");
    assert_eq!(row.created_by, "Grace");
    assert_eq!(row.version, 1);
    assert_eq!(row.hierarchy_path, "Parent > Kid");
    assert_eq!(row.hierarchy_level, 1);
    assert_eq!(
        row.source_url,
        "https://acme.atlassian.net/wiki/spaces/ENG/pages/11"
    );

    let root = rows.page_row(&docs[0], &entries["10"], "");
    assert_eq!(root.parent_page, "");
    assert_eq!(root.hierarchy_level, 0);
}

#[test]
fn test_attachment_row_for_unresolved_attachment() {
    let docs = documents();
    let rows = RowBuilder::new("ENG", "https://acme.atlassian.net/wiki", &docs);
    let descriptor = AttachmentDescriptor {
        id: "a9".to_string(),
        filename: "Budget.XLSX".to_string(),
        parent_document_id: "11".to_string(),
        candidate_addresses: Vec::new(),
        size_bytes: None,
        uploaded_at: None,
        uploaded_by: None,
        download_url: None,
    };

    let row = rows.attachment_row(&descriptor, &AttachmentIndex::new());
    assert_eq!(row.page_name, "Kid");
    assert_eq!(row.file_type, FileType::Excel);
    assert_eq!(row.extension, ".xlsx");
    assert_eq!(row.size, 0);
    assert_eq!(row.local_file_path, "");
}

#[test]
fn test_attachment_row_uses_resolved_size_and_path() {
    let docs = documents();
    let rows = RowBuilder::new("ENG", "https://acme.atlassian.net/wiki", &docs);
    let descriptor = AttachmentDescriptor {
        id: "a1".to_string(),
        filename: "handbook.pdf".to_string(),
        parent_document_id: "10".to_string(),
        candidate_addresses: Vec::new(),
        size_bytes: None,
        uploaded_at: Some("2024-02-02".to_string()),
        uploaded_by: Some("Grace".to_string()),
        download_url: Some("/download/attachments/10/handbook.pdf".to_string()),
    };
    let mut index = AttachmentIndex::new();
    index.insert(ResolvedAttachment {
        filename: "handbook.pdf".to_string(),
        local_name: "handbook.pdf".to_string(),
        local_path: PathBuf::from("out/ENG/attachments/handbook.pdf"),
        attachment_id: "a1".to_string(),
        parent_document_id: "10".to_string(),
        size_bytes: 2048,
    });

    let row = rows.attachment_row(&descriptor, &index);
    assert_eq!(row.size, 2048);
    assert_eq!(row.file_type, FileType::Pdf);
    assert_eq!(row.uploaded_by, "Grace");
    assert!(row.local_file_path.ends_with("handbook.pdf"));
    assert_eq!(row.download_url, "/download/attachments/10/handbook.pdf");
}

#[test]
fn test_write_rows_uses_column_headers() {
    let dir = tempdir().unwrap();
    let docs = documents();
    let entries = build(&docs);
    let rows = RowBuilder::new("ENG", "https://acme.atlassian.net/wiki", &docs);
    let pages = vec![rows.page_row(&docs[0], &entries["10"], "hello")];

    let (pages_path, attachments_path) = write_rows(dir.path(), "ENG", &pages, &[]).unwrap();
    assert_eq!(pages_path, dir.path().join("ENG_pages.json"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(pages_path).unwrap()).unwrap();
    assert_eq!(written[0]["Name"], "Parent");
    assert_eq!(written[0]["Content"], "hello");
    assert_eq!(written[0]["Source ID"], "10");

    let empty: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(attachments_path).unwrap()).unwrap();
    assert_eq!(empty, serde_json::json!([]));
}
