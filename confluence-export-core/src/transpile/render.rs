//! Rewritten tree → Markdown.
//!
//! Pure string building: ATX headings, `-` bullets, pipe tables with the first row as
//! header, fenced code. Elements the renderer does not know are transparent: their
//! children are rendered in place, as blocks if any descendant is a block.

use super::tree::{Element, Node};

const BLOCK_TAGS: &[&str] = &[
    "p",
    "div",
    "section",
    "article",
    "header",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
    "li",
    "table",
    "pre",
    "blockquote",
    "hr",
    "ac:task-list",
    "ac:layout",
    "ac:layout-section",
    "ac:layout-cell",
    "ac:rich-text-body",
];

fn is_block(el: &Element) -> bool {
    BLOCK_TAGS.contains(&el.name.as_str())
        || el.children.iter().any(|child| match child {
            Node::Element(inner) => is_block(inner),
            _ => false,
        })
}

/// Render a forest of nodes as Markdown blocks separated by blank lines.
pub fn render(nodes: &[Node]) -> String {
    render_blocks(nodes, "\n\n")
}

fn render_blocks(nodes: &[Node], separator: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut inline = String::new();
    for node in nodes {
        match node {
            Node::Element(el) if is_block(el) => {
                flush_paragraph(&mut inline, &mut blocks);
                let block = render_block(el);
                if !block.trim().is_empty() {
                    blocks.push(block);
                }
            }
            other => render_inline(other, &mut inline),
        }
    }
    flush_paragraph(&mut inline, &mut blocks);
    blocks.join(separator)
}

/// Turn accumulated inline text into a paragraph. `\n` marks a hard line break.
fn flush_paragraph(inline: &mut String, blocks: &mut Vec<String>) {
    let lines: Vec<&str> = inline
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if !lines.is_empty() {
        blocks.push(lines.join("  \n"));
    }
    inline.clear();
}

fn render_block(el: &Element) -> String {
    match el.name.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = el.name[1..].parse::<usize>().unwrap_or(1);
            let text = single_line(&inline_of(&el.children));
            if text.is_empty() {
                String::new()
            } else {
                format!("{} {}", "#".repeat(level), text)
            }
        }
        "blockquote" => quote(&render_blocks(&el.children, "\n\n")),
        "pre" => code_block(el),
        "ul" => render_list(el, false),
        "ol" => render_list(el, true),
        "li" => prefix_lines(&render_blocks(&el.children, "\n"), "- "),
        "ac:task-list" => render_task_list(el),
        "table" => render_table(el),
        "hr" => "---".to_string(),
        _ => render_blocks(&el.children, "\n\n"),
    }
}

fn quote(inner: &str) -> String {
    inner
        .lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prefix the first line with `marker` and indent the rest to line up under it.
fn prefix_lines(content: &str, marker: &str) -> String {
    let indent = " ".repeat(marker.chars().count());
    let mut out = String::new();
    for (i, line) in content.lines().enumerate() {
        if i == 0 {
            out.push_str(marker);
            out.push_str(line);
        } else {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&indent);
                out.push_str(line);
            }
        }
    }
    if out.is_empty() {
        out.push_str(marker.trim_end());
    }
    out
}

fn render_list(el: &Element, ordered: bool) -> String {
    let mut number = el
        .attr("start")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1);
    let mut items = Vec::new();
    for item in el.child_elements() {
        let content = render_blocks(&item.children, "\n");
        let content = if item.name == "li" {
            content
        } else {
            // a nested list placed directly in the list, not inside an item
            render_block(item)
        };
        if content.trim().is_empty() {
            continue;
        }
        let marker = if ordered {
            format!("{number}. ")
        } else {
            "- ".to_string()
        };
        number += 1;
        items.push(prefix_lines(&content, &marker));
    }
    items.join("\n")
}

fn render_task_list(el: &Element) -> String {
    let mut items = Vec::new();
    for task in el.child_elements().filter(|t| t.name == "ac:task") {
        let done = task
            .child("ac:task-status")
            .map(|s| s.text().trim() == "complete")
            .unwrap_or(false);
        let body = task
            .child("ac:task-body")
            .map(|b| single_line(&render_blocks(&b.children, " ")))
            .unwrap_or_default();
        let marker = if done { "- [x] " } else { "- [ ] " };
        items.push(format!("{marker}{body}").trim_end().to_string());
    }
    items.join("\n")
}

fn table_rows(el: &Element) -> Vec<&Element> {
    let mut rows = Vec::new();
    for child in el.child_elements() {
        match child.name.as_str() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => {
                rows.extend(child.child_elements().filter(|r| r.name == "tr"))
            }
            _ => {}
        }
    }
    rows
}

fn render_table(el: &Element) -> String {
    let rows: Vec<Vec<String>> = table_rows(el)
        .into_iter()
        .map(|row| {
            row.child_elements()
                .filter(|cell| cell.name == "td" || cell.name == "th")
                .map(|cell| {
                    single_line(&render_blocks(&cell.children, " ")).replace('|', "\\|")
                })
                .collect()
        })
        .collect();
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return String::new();
    }

    let format_row = |cells: &[String]| {
        let mut line = String::from("|");
        for i in 0..columns {
            line.push(' ');
            line.push_str(cells.get(i).map(String::as_str).unwrap_or(""));
            line.push_str(" |");
        }
        line
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format_row(&rows[0]));
    lines.push(format!("|{}", " --- |".repeat(columns)));
    for row in &rows[1..] {
        lines.push(format_row(row));
    }
    lines.join("\n")
}

fn code_block(el: &Element) -> String {
    let language = el.attr("data-language").unwrap_or("");
    let text = el.text();
    let code = text.strip_suffix('\n').unwrap_or(&text);
    let fence = "`".repeat(fence_length(code));
    format!("{fence}{language}\n{code}\n{fence}")
}

/// Smallest fence (at least three backticks) longer than any backtick run in `code`.
pub fn fence_length(code: &str) -> usize {
    longest_backtick_run(code).max(2) + 1
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn inline_of(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        render_inline(node, &mut out);
    }
    out
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape the emphasis markers that would otherwise change meaning.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '*' || c == '_' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape the brackets that would close link text early.
pub fn escape_link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '[' || c == ']' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Append `text`, collapsing whitespace runs and never doubling a space across nodes.
fn push_collapsed(out: &mut String, text: &str) {
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !(out.is_empty() || out.ends_with(' ') || out.ends_with('\n')) {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
}

fn wrap(out: &mut String, inner: &str, marker: &str) {
    let core = inner.trim();
    if core.is_empty() {
        push_collapsed(out, inner);
        return;
    }
    if inner.starts_with(' ') {
        push_collapsed(out, " ");
    }
    out.push_str(marker);
    out.push_str(core);
    out.push_str(marker);
    if inner.ends_with(' ') {
        out.push(' ');
    }
}

fn render_inline(node: &Node, out: &mut String) {
    let el = match node {
        Node::Text(text) => return push_collapsed(out, &escape_text(text)),
        Node::Literal(text) => return push_collapsed(out, text),
        Node::Element(el) => el,
    };

    match el.name.as_str() {
        "strong" | "b" => wrap(out, &inline_of(&el.children), "**"),
        "em" | "i" => wrap(out, &inline_of(&el.children), "*"),
        "del" | "s" | "strike" => wrap(out, &inline_of(&el.children), "~~"),
        "code" | "tt" | "kbd" => {
            let code = single_line(&el.text());
            if code.is_empty() {
                return;
            }
            let ticks = "`".repeat(longest_backtick_run(&code) + 1);
            let pad = if code.starts_with('`') || code.ends_with('`') {
                " "
            } else {
                ""
            };
            out.push_str(&format!("{ticks}{pad}{code}{pad}{ticks}"));
        }
        "a" => {
            let text = single_line(&inline_of(&el.children));
            match el.attr("href").filter(|h| !h.is_empty()) {
                Some(href) if text.is_empty() => out.push_str(&format!("<{href}>")),
                Some(href) => out.push_str(&format!("[{text}]({href})")),
                None => push_collapsed(out, &text),
            }
        }
        "img" => {
            let src = el.attr("src").unwrap_or("");
            if !src.is_empty() {
                let alt = el.attr("alt").unwrap_or("");
                out.push_str(&format!("![{alt}]({src})"));
            }
        }
        "br" => {
            out.push('\n');
        }
        "time" if el.children.is_empty() => {
            if let Some(datetime) = el.attr("datetime") {
                push_collapsed(out, datetime);
            }
        }
        "ac:emoticon" | "script" | "style" => {}
        _ => {
            for child in &el.children {
                render_inline(child, out);
            }
        }
    }
}
