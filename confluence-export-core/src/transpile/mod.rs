//! Storage-format body → portable Markdown.
//!
//! Three stages: [`tree::parse`] builds an owned tree, the rewrite pass turns
//! Confluence elements (`ac:image`, `ac:link`, structured macros) into plain nodes using
//! the resolved attachment view, and [`render`] serialises the result. The output is
//! finally passed through [`normalize`].

mod macros;
mod render;
mod rewrite;
mod tree;

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use tracing::{debug, warn};

use crate::attachments::AttachmentView;

pub use macros::{MacroCall, MacroHandler, MacroKind, MacroRegistry, MacroRule};
pub use render::{escape_link_text, escape_text, fence_length, render};
pub use tree::{parse, resolve_entity, Element, Node};

static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("valid regex"));

/// Collapse runs of blank lines to a single blank line and trim the ends.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(markdown: &str) -> String {
    BLANK_RUN
        .replace_all(markdown, "\n\n")
        .trim()
        .to_string()
}

#[derive(Debug, Clone)]
pub struct MacroTranspiler {
    base_url: Option<Url>,
    registry: MacroRegistry,
}

impl MacroTranspiler {
    /// Transpiler that absolutises relative links against `base_url`.
    pub fn new(base_url: &str) -> Self {
        let base_url = match Url::parse(base_url) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(base_url, error = %e, "Base URL is not absolute; relative links are kept");
                None
            }
        };
        Self {
            base_url,
            registry: MacroRegistry::default(),
        }
    }

    pub fn with_registry(mut self, registry: MacroRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &MacroRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MacroRegistry {
        &mut self.registry
    }

    /// Transpile one document body. A body that fails before any content parses yields
    /// an empty string; a later failure keeps what was parsed.
    pub fn transpile(&self, raw_body: &str, attachments: AttachmentView<'_>) -> String {
        if raw_body.trim().is_empty() {
            return String::new();
        }
        let nodes = match parse(raw_body) {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(position = e.position, error = %e.message, "Body could not be parsed; emitting empty content");
                return String::new();
            }
        };
        let ctx = rewrite::RewriteContext {
            attachments,
            base_url: self.base_url.as_ref(),
            registry: &self.registry,
        };
        let rewritten = rewrite::rewrite_nodes(nodes, &ctx);
        let markdown = normalize(&render(&rewritten));
        debug!(chars = markdown.len(), "Transpiled body");
        markdown
    }
}
