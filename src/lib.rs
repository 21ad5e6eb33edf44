//! nsrc - Nacelle GraphQL sourcing
//!
//! This crate provides the core functionality for the `nsrc` CLI tool:
//! compile per-type GraphQL documents against the remote schema, walk every
//! paginated listing, and upsert the results as content-addressed nodes.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Settings file, database location and run configuration
//! - [`schema`] - Remote schema loaded by introspection
//! - [`fragments`] - Field-selection fragments, cached on disk
//! - [`query`] - Entity registry and the query compiler
//! - [`pagination`] - Token pagination adapter
//! - [`executor`] - GraphQL transport
//! - [`sourcing`] - The sourcing engine and singleton sourcer
//! - [`model`] - Raw items, natural keys and nodes
//! - [`storage`] - Node stores (SQLite, in-memory)
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod executor;
pub mod fragments;
pub mod model;
pub mod pagination;
pub mod query;
pub mod schema;
pub mod sourcing;
pub mod storage;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
