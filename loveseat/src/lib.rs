//! Main loveseat crate: a CouchDB client with a schema-driven document mapper.
//!
//! This crate is the primary entry point for users of loveseat. It re-exports the core
//! types from the sub-crates, the `Mapper` derive macro and the available transports.
//!
//! # Features
//!
//! - **Raw documents** - Store, fetch and delete JSON documents by id
//! - **Changes feeds** - Read `_changes` as one batch or as a lazy continuous stream
//! - **Typed mapping** - Declare properties once, read and write them with native types
//! - **Identifiers** - Type-prefixed ids allocated from a pooled `_uuids` cache
//! - **Pluggable transports** - In-memory emulation for tests, `reqwest` for real servers
//!
//! # Quick Start
//!
//! ```ignore
//! use loveseat::{prelude::*, memory::InMemoryTransport};
//!
//! #[derive(Mapper)]
//! #[mapper(schema = Person::declare)]
//! pub struct Person(Instance);
//!
//! impl Person {
//!     pub const NAME: Property<Text> = Property::new("name");
//!     pub const AGE: Property<Integer> = Property::new("age");
//!
//!     fn declare(schema: SchemaBuilder) -> SchemaBuilder {
//!         schema
//!             .property(Self::NAME)
//!             .property(Self::AGE.describe().default(0))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (server, databases) = initialize(
//!         InMemoryTransport::new(),
//!         ServerConfig::default(),
//!         DatabaseSpec::new().bind::<Person>("people").create_missing(true),
//!     )
//!     .await?;
//!
//!     let mut alice = Person::new().with(&Person::NAME, "Alice".to_string());
//!     alice.put(&databases).await?;
//!
//!     let id = alice.id(server.uuids()).await?;
//!     let mut loaded = Person::fetch(&databases, &id).await?;
//!     assert_eq!(loaded.get(&Person::AGE)?, Some(0));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Continuous Changes
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let people = databases.get("people").unwrap();
//! let mut feed = people
//!     .continuous_changes(ChangesOptions::new().since("now").heartbeat(30_000))
//!     .await?;
//!
//! while let Some(event) = feed.next().await {
//!     println!("changed: {}", event?["id"]);
//! }
//! ```
//!
//! # Transports
//!
//! - [`memory`] - In-process CouchDB emulation for development and testing
//! - [`reqwest`] - HTTP transport for real servers (requires `reqwest` feature)

#[allow(unused_extern_crates)]
extern crate self as loveseat;

pub mod prelude;

pub use loveseat_core::{
    changes, client, config, database, document, error, locator, mapper, server, transport,
};
pub use loveseat_macros::Mapper;

pub use client::initialize;

// Re-export JSON and date types for convenience
pub use chrono;
pub use serde_json;

/// In-memory transport implementations.
pub mod memory {
    pub use loveseat_memory::{InMemoryTransport, InMemoryTransportBuilder};
}

/// HTTP transport implementations.
///
/// This module is only available when the `reqwest` feature is enabled.
#[cfg(feature = "reqwest")]
pub mod reqwest {
    pub use loveseat_reqwest::{ReqwestTransport, ReqwestTransportBuilder};
}
