//! Schema-driven mapping between typed values and JSON documents.
//!
//! A mapper type wraps an [`Instance`] and declares a [`Schema`] once. Properties are
//! read and written through typed [`Property`] handles; identifiers are namespaced by
//! the mapper's type name and allocated lazily from the server's UUID pool.
//!
//! # Example
//!
//! ```ignore
//! use loveseat::prelude::*;
//!
//! #[derive(Mapper)]
//! #[mapper(schema = Person::declare)]
//! pub struct Person(Instance);
//!
//! impl Person {
//!     pub const NAME: Property<Text> = Property::new("name");
//!     pub const JOINED: Property<DateTime> = Property::new("joined");
//!
//!     fn declare(schema: SchemaBuilder) -> SchemaBuilder {
//!         schema
//!             .property(Self::NAME)
//!             .property(Self::JOINED.describe().default_with(|| chrono::Utc::now().naive_utc()))
//!     }
//! }
//!
//! let mut person = Person::new().with(&Person::NAME, "Alice".to_string());
//! person.put(&databases).await?;
//!
//! let id = person.id(server.uuids()).await?;
//! let loaded = Person::fetch(&databases, &id).await?;
//! ```

pub mod instance;
pub mod property;
pub mod schema;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{
    client::Databases,
    database::Database,
    document::Document,
    error::{LoveseatError, LoveseatResult},
    server::UuidPool,
};

pub use instance::Instance;
pub use property::{
    Boolean, Date, DateTime, DescriptorBuilder, Dict, Float, Identifier, Integer, List, Property,
    PropertyKind, PropertyType, Text,
};
pub use schema::{DefaultValue, ID, PropertyDescriptor, REV, Schema, SchemaBuilder};

/// A typed document kind.
///
/// Implementors provide the type name, the cached schema and access to the wrapped
/// [`Instance`]; everything else is provided. `#[derive(Mapper)]` generates the
/// required methods for a single-field wrapper struct.
#[async_trait]
pub trait Mapper: Sized + Send + Sync + 'static {
    /// The name used to prefix identifiers, `TypeName:`.
    fn type_name() -> &'static str;

    /// The schema of this type, built once and cached.
    fn schema() -> &'static Schema;

    fn from_instance(instance: Instance) -> Self;

    fn instance(&self) -> &Instance;

    fn instance_mut(&mut self) -> &mut Instance;

    /// Creates an instance over an empty document. No default is realized yet.
    fn new() -> Self {
        Self::from_instance(Instance::new(Self::type_name(), Self::schema()))
    }

    /// Creates an instance from loosely typed fields; see [`Instance::with_fields`].
    fn from_fields(fields: Map<String, Value>) -> LoveseatResult<Self> {
        Instance::with_fields(Self::type_name(), Self::schema(), fields).map(Self::from_instance)
    }

    /// Wraps a fetched document as-is.
    fn from_document(document: Document) -> Self {
        Self::from_instance(Instance::from_document(Self::type_name(), Self::schema(), document))
    }

    /// Sets a property and returns the instance, for chained construction.
    fn with<K: PropertyKind>(mut self, property: &Property<K>, value: K::Native) -> Self {
        self.set(property, value);
        self
    }

    /// Reads a property; see [`Instance::get`].
    ///
    /// An unset identifier reads as `None` here. Use [`Mapper::identifier`] to
    /// allocate one.
    fn get<K: PropertyKind>(
        &mut self,
        property: &Property<K>,
    ) -> LoveseatResult<Option<K::Native>> {
        self.instance_mut().get(property)
    }

    fn set<K: PropertyKind>(&mut self, property: &Property<K>, value: K::Native) {
        self.instance_mut().set(property, value)
    }

    fn document(&self) -> &Document {
        self.instance().document()
    }

    /// The revision of the last stored or fetched version, if any.
    fn rev(&self) -> Option<&str> {
        self.document().rev()
    }

    /// Reads `_id`, allocating one from `uuids` if it is unset.
    async fn id(&mut self, uuids: &UuidPool) -> LoveseatResult<String> {
        self.identifier(&ID, uuids).await
    }

    /// Reads an identifier property, allocating `TypeName:<uuid>` from `uuids` if it
    /// is unset.
    async fn identifier(
        &mut self,
        property: &Property<Identifier>,
        uuids: &UuidPool,
    ) -> LoveseatResult<String> {
        self.instance_mut().identifier(property, uuids).await
    }

    /// Fetches the document `id` from the database configured for this type.
    ///
    /// # Errors
    ///
    /// Returns [`LoveseatError::DatabaseNotResolved`] if neither a binding nor a
    /// single configured database applies, and HTTP 404 if the document is missing.
    async fn fetch(databases: &Databases, id: &str) -> LoveseatResult<Self> {
        let database = databases.resolve::<Self>()?;

        Self::fetch_from(database, id).await
    }

    /// Fetches the document `id` from an explicit database.
    async fn fetch_from(database: &Database, id: &str) -> LoveseatResult<Self> {
        let document = database.get(id).await?;

        Ok(Self::from_document(document))
    }

    /// Stores the instance in the database configured for this type.
    async fn put(&mut self, databases: &Databases) -> LoveseatResult<()> {
        let database = databases.resolve::<Self>()?;

        self.put_to(database).await
    }

    /// Materializes every declared property, then stores the document under its `_id`.
    async fn put_to(&mut self, database: &Database) -> LoveseatResult<()> {
        let instance = self.instance_mut();
        instance.materialize(database.uuids()).await?;

        let id = instance
            .document()
            .id()
            .map(str::to_string)
            .ok_or_else(|| {
                LoveseatError::InvalidResponse("materialized document has no _id".into())
            })?;

        database.put(&id, instance.document_mut()).await
    }
}
