//! Tree rewrite: Confluence-specific nodes become plain HTML-like nodes the renderer knows.

use reqwest::Url;
use tracing::debug;

use super::macros::MacroRegistry;
use super::tree::{Element, Node};
use crate::attachments::AttachmentView;

pub(crate) struct RewriteContext<'a> {
    pub attachments: AttachmentView<'a>,
    pub base_url: Option<&'a Url>,
    pub registry: &'a MacroRegistry,
}

/// Bookkeeping-only nodes that carry no content once their parent has been rewritten.
fn is_residual(name: &str) -> bool {
    matches!(
        name,
        "ac:parameter" | "ac:plain-text-body" | "ac:placeholder" | "ac:task-id"
    ) || name.starts_with("ri:")
}

pub(crate) fn rewrite_nodes(nodes: Vec<Node>, ctx: &RewriteContext<'_>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Element(el) => out.extend(rewrite_element(el, ctx)),
            other => out.push(other),
        }
    }
    out
}

fn rewrite_element(mut el: Element, ctx: &RewriteContext<'_>) -> Vec<Node> {
    let name = el.name.clone();
    match name.as_str() {
        "ac:image" => vec![rewrite_image(&el, ctx)],
        "ac:link" => vec![rewrite_link(&el, ctx)],
        "ac:structured-macro" | "ac:macro" => ctx.registry.dispatch(&el),
        name if is_residual(name) => Vec::new(),
        "a" => {
            absolutize_href(&mut el, ctx.base_url);
            el.children = rewrite_nodes(std::mem::take(&mut el.children), ctx);
            vec![Node::Element(el)]
        }
        _ => {
            el.children = rewrite_nodes(std::mem::take(&mut el.children), ctx);
            vec![Node::Element(el)]
        }
    }
}

/// The attachment an `ri:attachment` element points at, honouring an explicit owner page.
fn attachment_target<'a>(
    reference: &Element,
    ctx: &RewriteContext<'a>,
) -> Option<&'a crate::model::ResolvedAttachment> {
    let filename = reference.attr("ri:filename")?;
    match reference
        .child("ri:content-entity")
        .and_then(|owner| owner.attr("ri:content-id"))
    {
        Some(owner_id) => ctx.attachments.lookup_on(owner_id, filename),
        None => ctx.attachments.lookup(filename),
    }
}

fn rewrite_image(el: &Element, ctx: &RewriteContext<'_>) -> Node {
    if let Some(reference) = el.child("ri:attachment") {
        let filename = reference.attr("ri:filename").filter(|f| !f.is_empty());
        return match (filename, attachment_target(reference, ctx)) {
            (Some(filename), Some(resolved)) => Node::Element(
                Element::new("img")
                    .with_attr("src", resolved.relative_href())
                    .with_attr("alt", filename),
            ),
            (Some(filename), None) => {
                debug!(filename, "Image references an attachment that was not resolved");
                Node::Literal(format!("[Image: {filename}]"))
            }
            (None, _) => Node::Literal("[Image: Missing]".to_string()),
        };
    }
    if let Some(url) = el.child("ri:url").and_then(|u| u.attr("ri:value")) {
        let alt = el.attr("ac:alt").unwrap_or("");
        return Node::Element(
            Element::new("img")
                .with_attr("src", url)
                .with_attr("alt", alt),
        );
    }
    Node::Literal("[Image: Missing]".to_string())
}

fn rewrite_link(el: &Element, ctx: &RewriteContext<'_>) -> Node {
    let link_text = el.text().split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(reference) = el.child("ri:attachment") {
        let filename = reference.attr("ri:filename").unwrap_or("");
        let text = if link_text.is_empty() {
            filename.to_string()
        } else {
            link_text
        };
        return match attachment_target(reference, ctx) {
            Some(resolved) => Node::Element(
                Element::new("a")
                    .with_attr("href", resolved.relative_href())
                    .with_child(Node::Text(text)),
            ),
            None => Node::Text(text),
        };
    }

    if !link_text.is_empty() {
        return Node::Text(link_text);
    }
    let target = el
        .child("ri:page")
        .and_then(|page| page.attr("ri:content-title"))
        .or_else(|| el.child("ri:space").and_then(|space| space.attr("ri:space-key")))
        .or_else(|| el.attr("ac:anchor"))
        .unwrap_or("");
    Node::Text(target.to_string())
}

fn absolutize_href(el: &mut Element, base_url: Option<&Url>) {
    let Some(base) = base_url else {
        return;
    };
    let Some(href) = el.attr("href").filter(|h| h.starts_with('/')) else {
        return;
    };
    if let Ok(absolute) = base.join(href) {
        el.set_attr("href", absolute.to_string());
    }
}
