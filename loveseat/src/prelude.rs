//! Convenient re-exports of commonly used types from loveseat.
//!
//! ```ignore
//! use loveseat::prelude::*;
//! ```
//!
//! This provides access to the server and database handles, documents, the mapper
//! trait with its property kinds, the transport traits and the error types.

pub use loveseat_core::{
    changes::{Changes, ChangesFeed, ChangesOptions, Feed},
    client::{DatabaseSpec, Databases, initialize},
    config::ServerConfig,
    database::Database,
    document::Document,
    error::{ConversionError, LoveseatError, LoveseatResult},
    locator::{Locator, RequestOptions},
    mapper::{
        Boolean, Date, DateTime, Dict, Float, ID, Identifier, Instance, Integer, List, Mapper,
        Property, PropertyKind, PropertyType, REV, Schema, SchemaBuilder, Text,
    },
    server::{Server, UuidPool},
    transport::{DynTransport, Transport, TransportBuilder},
};
pub use loveseat_macros::Mapper;
