#![forbid(unsafe_code)]

//! Command-line plumbing: settings files, CSV triple import and plan
//! execution.

/// TOML settings for the join core and the index layout.
pub mod config;

/// Triple loading and query execution for the `query` command.
pub mod query;
