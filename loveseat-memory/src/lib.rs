//! In-memory CouchDB emulation for loveseat.
//!
//! This crate provides [`InMemoryTransport`], a [`Transport`](loveseat_core::transport::Transport)
//! that answers requests from process-local state instead of the network. It is meant
//! for development and testing.
//!
//! # Features
//!
//! - **Databases** - `PUT`, `DELETE`, `HEAD` and `GET /{db}`
//! - **Documents** - `GET`, `HEAD`, `PUT` and `DELETE /{db}/{id}` with revision checks
//! - **Identifiers** - `GET /_uuids?count=N`
//! - **Changes** - `GET /{db}/_changes` in batch and continuous mode, live updates included
//! - **Authentication** - Optional basic-auth credentials
//! - **Request log** - Every received request, for assertions
//!
//! # Quick Start
//!
//! ```ignore
//! use loveseat::{prelude::*, memory::InMemoryTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (server, databases) = initialize(
//!         InMemoryTransport::new(),
//!         ServerConfig::default(),
//!         DatabaseSpec::names(["notes"]).create_missing(true),
//!     )
//!     .await?;
//!
//!     let mut document: Document = [("title", "hello")].into_iter().collect();
//!     databases.get("notes").unwrap().put("first", &mut document).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as loveseat_memory;

mod store;
pub mod transport;

pub use transport::{InMemoryTransport, InMemoryTransportBuilder};
