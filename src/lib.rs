//! confluence-export: command-line front end and Confluence REST client.
//!
//! The transformation pipeline lives in `confluence-export-core`; this crate supplies the
//! network side ([`client`]), config loading ([`load_config`]) and the CLI ([`cli`]).

pub mod cli;
pub mod client;
pub mod load_config;
