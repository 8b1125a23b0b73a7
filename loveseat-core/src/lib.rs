//! A CouchDB client with a schema-driven document mapper.
//!
//! This crate is the core of the loveseat project and provides:
//!
//! - **Transport abstraction** ([`transport`]) - The seam where HTTP requests are performed
//! - **Resource addressing** ([`locator`]) - Percent-encoded, credential-carrying URLs
//! - **Server handle** ([`server`]) - Database management and the UUID pool
//! - **Database handle** ([`database`]) - Document CRUD by id
//! - **Changes feed** ([`changes`]) - Batch and continuous `_changes` reads
//! - **Documents** ([`document`]) - Ordered JSON documents
//! - **Mapping** ([`mapper`]) - Typed properties, schemas and mapper types
//! - **Initialization** ([`client`]) - Wiring a server and its named databases
//! - **Configuration** ([`config`]) - Connection settings
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use loveseat::{prelude::*, memory::InMemoryTransport};
//!
//! let (server, databases) = initialize(
//!     InMemoryTransport::new(),
//!     ServerConfig::default(),
//!     DatabaseSpec::names(["notes"]).create_missing(true),
//! )
//! .await?;
//!
//! let notes = databases.get("notes").unwrap();
//! let mut document: Document = [("title", "hello")].into_iter().collect();
//! notes.put("first", &mut document).await?;
//! assert!(document.rev().is_some());
//! ```

#[allow(unused_extern_crates)]
extern crate self as loveseat_core;

pub mod changes;
pub mod client;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod locator;
pub mod mapper;
pub mod server;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;
