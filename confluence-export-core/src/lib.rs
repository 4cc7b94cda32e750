#![doc = "confluence-export-core: transformation pipeline for confluence-export."]

//! This crate turns Confluence spaces (storage-format pages, their ancestor chains and
//! attachments) into a tree of portable Markdown files with local attachment links.
//! It never talks to the network itself: pages and attachment bytes come in through the
//! traits in [`contract`], which the CLI crate implements for the REST API.
//!
//! # Modules
//! - [`sanitize`]: filesystem-safe names and the `_<n>` collision policy
//! - [`attachments`]: candidate addresses, the attachment store, the resolved index
//! - [`transpile`]: storage format → Markdown, with table-driven macro handling
//! - [`hierarchy`]: page paths and depths from ancestor lists
//! - [`assemble`]: front-matter, destination paths and index files
//! - [`tabular`]: page/attachment rows as JSON
//! - [`restructure`]: flatten a finished export into `pages/` + `attachments/`
//! - [`export`]: the per-space pipeline tying the above together

pub mod assemble;
pub mod attachments;
pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod model;
pub mod restructure;
pub mod sanitize;
pub mod tabular;
pub mod transpile;
