//! HTTP transport for loveseat built on `reqwest`.
//!
//! This crate provides [`ReqwestTransport`], the [`Transport`](loveseat_core::transport::Transport)
//! used to talk to a real CouchDB server.
//!
//! To use this transport, include the `reqwest` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! loveseat = { version = "x.y.z", features = ["reqwest"] }
//! ```
//!
//! # Features
//!
//! - **Connection pooling** - One `reqwest::Client` shared by every handle of a server
//! - **Streaming** - Response bodies of continuous feeds are read chunk by chunk
//! - **TLS** - `https` base URLs are served through rustls
//!
//! # Example
//!
//! ```ignore
//! use loveseat::{prelude::*, reqwest::ReqwestTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = ReqwestTransport::builder()
//!         .connect_timeout(std::time::Duration::from_secs(5))
//!         .build()
//!         .await?;
//!     let server = Server::new(transport, &ServerConfig::new("couch.local", 5984))?;
//!     let uuid = server.next_uuid().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as loveseat_reqwest;

pub mod transport;

pub use transport::{ReqwestTransport, ReqwestTransportBuilder};
