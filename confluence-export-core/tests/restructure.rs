use confluence_export_core::restructure::{
    flat_page_name, flatten, rewrite_attachment_links, Renames, ATTACHMENTS_DIR, PAGES_DIR,
};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn export_tree(root: &Path) {
    fs::create_dir_all(root.join("DOCS/Root/Child Page")).unwrap();
    fs::create_dir_all(root.join("DOCS/attachments")).unwrap();
    fs::write(root.join("DOCS/README.md"), "# DOCS Space Export\n").unwrap();
    fs::write(
        root.join("DOCS/Root.md"),
        "---\ntitle: Root\n---\n\n![d.png](attachments/d.png)\n",
    )
    .unwrap();
    fs::write(
        root.join("DOCS/Root/Child Page.md"),
        "See [d](./attachments/d.png) and [site](https://example.com/download/attachments/1/d.png)\n",
    )
    .unwrap();
    fs::write(root.join("DOCS/Root/Child Page/Leaf.md"), "leaf\n").unwrap();
    fs::write(root.join("DOCS/attachments/d.png"), b"png").unwrap();
    fs::write(root.join("DOCS/attachments/README.md"), "# Attachments Summary\n").unwrap();
}

#[test]
fn test_rewrite_attachment_links() {
    let none = Renames::new();
    assert_eq!(
        rewrite_attachment_links("![a](attachments/a.png)", &none),
        "![a](../attachments/a.png)"
    );
    assert_eq!(
        rewrite_attachment_links("[b](./attachments/b.pdf)", &none),
        "[b](../attachments/b.pdf)"
    );
    let once = rewrite_attachment_links("[c](attachments/c.txt)", &none);
    assert_eq!(rewrite_attachment_links(&once, &none), once);

    let external = "[x](https://host/download/attachments/1/x.png)";
    assert_eq!(rewrite_attachment_links(external, &none), external);
}

#[test]
fn test_rewrite_attachment_links_follows_renames() {
    let renames = Renames::from([("logo.png".to_string(), "logo_1.png".to_string())]);
    assert_eq!(
        rewrite_attachment_links("![l](attachments/logo.png) [m](attachments/map.png)", &renames),
        "![l](../attachments/logo_1.png) [m](../attachments/map.png)"
    );
}

#[test]
fn test_flat_page_name_joins_components() {
    assert_eq!(flat_page_name(Path::new("Root.md")), "Root.md");
    assert_eq!(
        flat_page_name(Path::new("DOCS/Root/Child Page.md")),
        "DOCS_Root_Child_Page.md"
    );
}

#[test]
fn test_flatten_export() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    export_tree(input.path());

    let report = flatten(input.path(), output.path()).unwrap();
    assert_eq!(report.pages, 3);
    assert_eq!(report.attachments, 1);
    assert_eq!(report.skipped, 0);

    let pages = output.path().join(PAGES_DIR);
    assert!(pages.join("DOCS_Root.md").is_file());
    assert!(pages.join("DOCS_Root_Child_Page.md").is_file());
    assert!(pages.join("DOCS_Root_Child_Page_Leaf.md").is_file());
    assert!(!pages.join("DOCS_README.md").exists());
    assert!(output.path().join(ATTACHMENTS_DIR).join("d.png").is_file());
    assert!(!output.path().join(ATTACHMENTS_DIR).join("README.md").exists());

    let root = fs::read_to_string(pages.join("DOCS_Root.md")).unwrap();
    assert!(root.contains("(../attachments/d.png)"));
    let child = fs::read_to_string(pages.join("DOCS_Root_Child_Page.md")).unwrap();
    assert!(child.contains("[d](../attachments/d.png)"));
    assert!(child.contains("(https://example.com/download/attachments/1/d.png)"));

    let readme = fs::read_to_string(output.path().join("README.md")).unwrap();
    assert!(readme.starts_with("# Confluence Import"));
    assert!(readme.contains("- **Pages**: 3\n"));
    assert!(readme.contains("- **Attachments**: 1\n"));
}

#[test]
fn test_flatten_deduplicates_attachment_names_across_spaces() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    for space in ["A", "B"] {
        fs::create_dir_all(input.path().join(space).join("attachments")).unwrap();
        fs::write(input.path().join(space).join("attachments/logo.png"), space).unwrap();
    }

    let report = flatten(input.path(), output.path()).unwrap();
    assert_eq!(report.attachments, 2);
    let attachments = output.path().join(ATTACHMENTS_DIR);
    assert_eq!(fs::read_to_string(attachments.join("logo.png")).unwrap(), "A");
    assert_eq!(fs::read_to_string(attachments.join("logo_1.png")).unwrap(), "B");
}

#[test]
fn test_flatten_links_follow_renamed_attachments() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    for space in ["A", "B"] {
        let dir = input.path().join(space);
        fs::create_dir_all(dir.join("attachments")).unwrap();
        fs::create_dir_all(dir.join("Root")).unwrap();
        fs::write(dir.join("attachments/logo.png"), space).unwrap();
        fs::write(dir.join("Root.md"), "![logo](attachments/logo.png)\n").unwrap();
        fs::write(dir.join("Root/Child.md"), "[logo](./attachments/logo.png)\n").unwrap();
    }

    let report = flatten(input.path(), output.path()).unwrap();
    assert_eq!(report.pages, 4);
    assert_eq!(report.attachments, 2);

    let pages = output.path().join(PAGES_DIR);
    let a_root = fs::read_to_string(pages.join("A_Root.md")).unwrap();
    assert_eq!(a_root, "![logo](../attachments/logo.png)\n");
    let b_root = fs::read_to_string(pages.join("B_Root.md")).unwrap();
    assert_eq!(b_root, "![logo](../attachments/logo_1.png)\n");
    let b_child = fs::read_to_string(pages.join("B_Root_Child.md")).unwrap();
    assert_eq!(b_child, "[logo](../attachments/logo_1.png)\n");
}
