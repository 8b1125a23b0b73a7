//! The typed view over a single document.

use serde_json::{Map, Value};
use std::fmt;

use crate::{
    document::Document,
    error::{LoveseatError, LoveseatResult},
    server::UuidPool,
};

use super::{
    property::{Identifier, Property, PropertyKind, PropertyType},
    schema::{PropertyDescriptor, Schema},
};

/// A document paired with the schema of the mapper type that owns it.
///
/// Reads go through the property's conversion, realizing declared defaults on first
/// access and writing them back so they are never regenerated. Writes convert the
/// native value to JSON and overwrite the stored field.
#[derive(Clone)]
pub struct Instance {
    type_name: &'static str,
    schema: &'static Schema,
    document: Document,
}

impl Instance {
    /// Creates an instance over an empty document.
    pub fn new(type_name: &'static str, schema: &'static Schema) -> Self {
        Self::from_document(type_name, schema, Document::new())
    }

    /// Wraps an existing document without realizing any default.
    pub fn from_document(
        type_name: &'static str,
        schema: &'static Schema,
        document: Document,
    ) -> Self {
        Self {
            type_name,
            schema,
            document,
        }
    }

    /// Creates an instance from loosely typed fields.
    ///
    /// Declared properties are passed through their kind's conversion; any other
    /// field is stored unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LoveseatError::Conversion`] if a declared field has the wrong shape.
    pub fn with_fields(
        type_name: &'static str,
        schema: &'static Schema,
        fields: Map<String, Value>,
    ) -> LoveseatResult<Self> {
        let mut instance = Self::new(type_name, schema);

        for (key, value) in fields {
            match schema.get(&key) {
                Some(descriptor) => {
                    let kind = descriptor.kind();
                    let value = kind
                        .normalize(&value)
                        .map_err(|source| LoveseatError::Conversion {
                            property: key.clone(),
                            source,
                        })?;
                    instance.store(&key, kind, value);
                }
                None => {
                    instance.document.insert(key, value);
                }
            }
        }

        Ok(instance)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// The namespace prepended to identifiers of this type, `TypeName:`.
    pub fn prefix(&self) -> String {
        format!("{}:", self.type_name)
    }

    /// Reads a property.
    ///
    /// Returns the stored value if there is a non-null one, otherwise realizes and
    /// stores the declared default, otherwise `None`.
    pub fn get<K: PropertyKind>(
        &mut self,
        property: &Property<K>,
    ) -> LoveseatResult<Option<K::Native>> {
        if let Some(value) = self.stored(property.name()) {
            return property.convert(value).map(Some);
        }

        let Some(default) = self
            .schema
            .get(property.name())
            .and_then(PropertyDescriptor::default)
        else {
            return Ok(None);
        };

        let native = property.convert(&default.realize())?;
        self.set(property, native.clone());

        Ok(Some(native))
    }

    /// Writes a property, replacing any stored value.
    pub fn set<K: PropertyKind>(&mut self, property: &Property<K>, value: K::Native) {
        self.store(property.name(), K::TYPE, K::to_json(&value));
    }

    /// Removes a property's stored value, so the next read falls back to its default.
    pub fn clear<K: PropertyKind>(&mut self, property: &Property<K>) -> Option<Value> {
        self.document.remove(property.name())
    }

    /// Reads an identifier property, allocating `TypeName:<uuid>` from `uuids` if unset.
    pub async fn identifier(
        &mut self,
        property: &Property<Identifier>,
        uuids: &UuidPool,
    ) -> LoveseatResult<String> {
        if let Some(id) = self.get(property)? {
            return Ok(id);
        }

        let id = format!("{}{}", self.prefix(), uuids.next().await?);
        self.set(property, id.clone());

        Ok(id)
    }

    /// Reads every declared property once, realizing defaults and allocating
    /// identifiers, so the document holds no lazily produced value anymore.
    ///
    /// # Errors
    ///
    /// Returns [`LoveseatError::Conversion`] if a stored value does not fit its
    /// property, or the error of a failed identifier allocation.
    pub async fn materialize(&mut self, uuids: &UuidPool) -> LoveseatResult<()> {
        let schema = self.schema;

        for descriptor in schema.properties() {
            let name = descriptor.name();
            let kind = descriptor.kind();

            if let Some(value) = self.stored(name) {
                kind.normalize(value).map_err(|source| LoveseatError::Conversion {
                    property: name.to_string(),
                    source,
                })?;
                continue;
            }

            if kind == PropertyType::Identifier {
                let id = format!("{}{}", self.prefix(), uuids.next().await?);
                self.store(name, kind, Value::String(id));
            } else if let Some(default) = descriptor.default() {
                let value = kind
                    .normalize(&default.realize())
                    .map_err(|source| LoveseatError::Conversion {
                        property: name.to_string(),
                        source,
                    })?;
                self.store(name, kind, value);
            }
        }

        Ok(())
    }

    fn stored(&self, name: &str) -> Option<&Value> {
        self.document.get(name).filter(|value| !value.is_null())
    }

    fn store(&mut self, name: &str, kind: PropertyType, value: Value) {
        let value = match (kind, value) {
            (PropertyType::Identifier, Value::String(id)) => {
                let prefix = self.prefix();
                if id.starts_with(&prefix) {
                    Value::String(id)
                } else {
                    Value::String(prefix + &id)
                }
            }
            (_, value) => value,
        };

        self.document.insert(name, value);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.type_name, self.document.to_value())
    }
}
