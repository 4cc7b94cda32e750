//! Structured-macro dispatch.
//!
//! Each recognised macro name maps to a [`MacroRule`] in the [`MacroRegistry`]; anything
//! not in the table goes to the generic fallback, which always emits a visible
//! `[Macro: name]` marker. Supporting a new macro means registering another rule.

use std::collections::HashMap;

use super::tree::{Element, Node};

/// Closed set of macro kinds the registry knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroKind {
    /// Titled blockquote (`info`, `note`, `tip`, `warning`).
    Callout,
    /// Fenced code block.
    Code,
    /// Placeholder for a generated table of contents.
    TableOfContents,
    /// Anything not in the table.
    Generic,
}

/// A macro element together with its name, as seen by a handler.
#[derive(Debug, Clone, Copy)]
pub struct MacroCall<'a> {
    pub name: &'a str,
    pub element: &'a Element,
}

impl<'a> MacroCall<'a> {
    pub fn new(element: &'a Element) -> Self {
        let name = element.attr("ac:name").unwrap_or("");
        Self { name, element }
    }

    /// Text of the `ac:parameter` called `name`.
    pub fn param(&self, name: &str) -> Option<String> {
        self.element
            .child_elements()
            .find(|el| el.name == "ac:parameter" && el.attr("ac:name") == Some(name))
            .map(|el| el.text().trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn rich_text_body(&self) -> Option<&'a Element> {
        self.element
            .child("ac:rich-text-body")
            .or_else(|| self.element.find("ac:rich-text-body"))
    }

    pub fn plain_text_body(&self) -> Option<String> {
        self.element
            .child("ac:plain-text-body")
            .or_else(|| self.element.find("ac:plain-text-body"))
            .map(Element::text)
    }
}

pub type MacroHandler = fn(&MacroCall<'_>) -> Vec<Node>;

#[derive(Clone, Copy)]
pub struct MacroRule {
    pub kind: MacroKind,
    pub handler: MacroHandler,
}

impl std::fmt::Debug for MacroRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacroRule").field("kind", &self.kind).finish()
    }
}

/// Lookup table from macro name to rule, plus the mandatory fallback.
#[derive(Debug, Clone)]
pub struct MacroRegistry {
    rules: HashMap<String, MacroRule>,
    fallback: MacroRule,
}

impl Default for MacroRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for name in ["info", "note", "tip", "warning"] {
            registry.register(name, MacroKind::Callout, callout);
        }
        registry.register("code", MacroKind::Code, code_block);
        registry.register("noformat", MacroKind::Code, code_block);
        registry.register("toc", MacroKind::TableOfContents, table_of_contents);
        registry
    }
}

impl MacroRegistry {
    /// Registry with no rules: every macro goes to the fallback.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
            fallback: MacroRule {
                kind: MacroKind::Generic,
                handler: generic,
            },
        }
    }

    pub fn register(&mut self, name: &str, kind: MacroKind, handler: MacroHandler) {
        self.rules
            .insert(name.to_ascii_lowercase(), MacroRule { kind, handler });
    }

    /// Rule for `name`, falling back to the generic rule.
    pub fn rule(&self, name: &str) -> &MacroRule {
        self.rules
            .get(&name.to_ascii_lowercase())
            .unwrap_or(&self.fallback)
    }

    pub fn kind_of(&self, name: &str) -> MacroKind {
        self.rule(name).kind
    }

    pub fn dispatch(&self, element: &Element) -> Vec<Node> {
        let call = MacroCall::new(element);
        (self.rule(call.name).handler)(&call)
    }
}

const BLOCK_TEXT_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "pre", "blockquote",
];

/// Paragraph texts of a rich body: block children become separate entries, inline
/// runs are merged, whitespace is collapsed.
fn paragraphs(body: &Element) -> Vec<String> {
    fn walk(nodes: &[Node], current: &mut String, out: &mut Vec<String>) {
        for node in nodes {
            match node {
                Node::Text(t) | Node::Literal(t) => current.push_str(t),
                Node::Element(el) if BLOCK_TEXT_TAGS.contains(&el.name.as_str()) => {
                    flush(current, out);
                    walk(&el.children, current, out);
                    flush(current, out);
                }
                Node::Element(el) if el.name == "br" => flush(current, out),
                Node::Element(el) => walk(&el.children, current, out),
            }
        }
    }
    fn flush(current: &mut String, out: &mut Vec<String>) {
        let collapsed = current.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            out.push(collapsed);
        }
        current.clear();
    }

    let mut out = Vec::new();
    let mut current = String::new();
    walk(&body.children, &mut current, &mut out);
    flush(&mut current, &mut out);
    out
}

fn capitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `> **Title**` followed by the body, one quoted line per paragraph.
fn callout(call: &MacroCall<'_>) -> Vec<Node> {
    let title = call.param("title").unwrap_or_else(|| capitalized(call.name));
    let mut quote = Element::new("blockquote")
        .with_child(Node::Element(
            Element::new("strong").with_child(Node::Text(title)),
        ));
    if let Some(body) = call.rich_text_body() {
        for paragraph in paragraphs(body) {
            quote.children.push(Node::Element(Element::new("br")));
            quote.children.push(Node::Text(paragraph));
        }
    }
    vec![Node::Element(quote)]
}

fn code_block(call: &MacroCall<'_>) -> Vec<Node> {
    let language = call.param("language").unwrap_or_default();
    let code = call.plain_text_body().unwrap_or_default();
    let pre = Element::new("pre")
        .with_attr("data-language", language)
        .with_child(Node::Literal(code));
    vec![Node::Element(pre)]
}

fn table_of_contents(_call: &MacroCall<'_>) -> Vec<Node> {
    vec![Node::Element(
        Element::new("p").with_child(Node::Literal("[Table of Contents]".to_string())),
    )]
}

/// `[Macro: name]` plus the body text, so no macro disappears without a trace.
fn generic(call: &MacroCall<'_>) -> Vec<Node> {
    let mut p = Element::new("p").with_child(Node::Literal(format!("[Macro: {}]", call.name)));
    if let Some(body) = call.rich_text_body() {
        let text = paragraphs(body).join(" ");
        if !text.is_empty() {
            p.children.push(Node::Text(format!(" {text}")));
        }
    }
    vec![Node::Element(p)]
}
