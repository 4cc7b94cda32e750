//! Filesystem-safe names.
//!
//! [`sanitize`] is total and idempotent; [`NameRegistry`] applies the `_<n>` suffix
//! policy for names that collide inside one directory.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Longest name (in characters) `sanitize` will produce.
pub const MAX_NAME_CHARS: usize = 100;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f\x7f]"#).expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

fn is_trimmed(c: char) -> bool {
    c == '.' || c == '_'
}

/// Turn arbitrary text into a name that is safe on common filesystems.
///
/// Disallowed characters and whitespace runs become `_`, leading and trailing `.`/`_`
/// are stripped and the result is capped at [`MAX_NAME_CHARS`] characters.
pub fn sanitize(name: &str) -> String {
    let replaced = WHITESPACE.replace_all(name, "_");
    let replaced = DISALLOWED.replace_all(&replaced, "_");
    let stripped = replaced.trim_matches(is_trimmed);
    if stripped.chars().count() <= MAX_NAME_CHARS {
        return stripped.to_string();
    }
    let truncated: String = stripped.chars().take(MAX_NAME_CHARS).collect();
    // truncation can expose a separator at the new end
    truncated.trim_end_matches(is_trimmed).to_string()
}

/// Split `name` into stem and extension (including the dot). Dotfiles keep their dot in the stem.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// First name of the form `stem_<n>.ext` (n = 1, 2, ...) not rejected by `taken`,
/// or `name` itself when it is free.
pub fn dedupe(name: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(name) {
        return name.to_string();
    }
    let (stem, ext) = split_extension(name);
    let mut n = 1usize;
    loop {
        let candidate = format!("{stem}_{n}{ext}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Names handed out so far in this run, per directory.
#[derive(Debug, Default)]
pub struct NameRegistry {
    claimed: HashMap<PathBuf, HashSet<String>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name` inside `dir`, returning the deduplicated name actually reserved.
    pub fn claim(&mut self, dir: &Path, name: &str) -> String {
        let names = self.claimed.entry(dir.to_path_buf()).or_default();
        let unique = dedupe(name, |candidate| names.contains(candidate));
        names.insert(unique.clone());
        unique
    }

    pub fn is_claimed(&self, dir: &Path, name: &str) -> bool {
        self.claimed
            .get(dir)
            .map(|names| names.contains(name))
            .unwrap_or(false)
    }
}
