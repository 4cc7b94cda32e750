//! Position of every page in the space tree, derived from ancestor lists alone.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::Document;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyEntry {
    pub document_id: String,
    /// Titles from the root down to the page itself. Ancestors outside the
    /// exported set are left out.
    pub path: Vec<String>,
    /// Number of ancestors the server reported, including ones left out of `path`.
    pub depth: usize,
}

/// Compute a [`HierarchyEntry`] for every document.
///
/// Ancestor titles come from the in-memory set rather than the ancestor records, so a
/// page renamed since its children were fetched still shows one consistent title.
pub fn build(documents: &[Document]) -> HashMap<String, HierarchyEntry> {
    let titles: HashMap<&str, &str> = documents
        .iter()
        .map(|doc| (doc.id.as_str(), doc.title.as_str()))
        .collect();

    documents
        .iter()
        .map(|doc| {
            let mut path: Vec<String> = doc
                .ancestors
                .iter()
                .filter_map(|ancestor| titles.get(ancestor.id.as_str()))
                .map(|title| title.to_string())
                .collect();
            path.push(doc.title.clone());
            let entry = HierarchyEntry {
                document_id: doc.id.clone(),
                path,
                depth: doc.ancestors.len(),
            };
            (doc.id.clone(), entry)
        })
        .collect()
}

/// Entries in export order: by depth, then path, then document id.
pub fn ordered(entries: &HashMap<String, HierarchyEntry>) -> Vec<&HierarchyEntry> {
    let mut sorted: Vec<&HierarchyEntry> = entries.values().collect();
    sorted.sort_by(|a, b| {
        a.depth
            .cmp(&b.depth)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    sorted
}

/// Ancestor ids that point outside the document set, per document id.
pub fn dangling_ancestors(documents: &[Document]) -> HashMap<&str, Vec<&str>> {
    let known: HashSet<&str> = documents.iter().map(|doc| doc.id.as_str()).collect();
    documents
        .iter()
        .filter_map(|doc| {
            let missing: Vec<&str> = doc
                .ancestors
                .iter()
                .map(|a| a.id.as_str())
                .filter(|id| !known.contains(id))
                .collect();
            (!missing.is_empty()).then_some((doc.id.as_str(), missing))
        })
        .collect()
}
