//! Property descriptors and schemas.
//!
//! A [`Schema`] is the ordered list of properties a mapper type declares, parent
//! properties included. Schemas are assembled with a [`SchemaBuilder`] that layers a
//! child's declarations over a copy of its parent: a property with the same name
//! replaces the parent's entry in place, new properties are appended.

use serde_json::Value;
use std::{fmt, sync::Arc};

use super::property::{Identifier, Property, PropertyType, Text};

/// The `_id` property every schema starts with.
pub const ID: Property<Identifier> = Property::new(crate::document::ID_FIELD);
/// The `_rev` property every schema starts with.
pub const REV: Property<Text> = Property::new(crate::document::REV_FIELD);

/// The value a property takes when read before being set.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value, already in JSON form.
    Value(Value),
    /// A zero-argument generator producing the JSON form.
    Generator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Produces the default, calling the generator if there is one.
    pub fn realize(&self) -> Value {
        match self {
            DefaultValue::Value(value) => value.clone(),
            DefaultValue::Generator(generator) => generator(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            DefaultValue::Generator(_) => f.write_str("Generator"),
        }
    }
}

/// The declaration of one property: its name, kind and optional default.
#[derive(Clone, Debug)]
pub struct PropertyDescriptor {
    name: String,
    kind: PropertyType,
    default: Option<DefaultValue>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, kind: PropertyType, default: Option<DefaultValue>) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyType {
        self.kind
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }
}

/// The ordered, immutable set of properties of a mapper type.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    properties: Vec<PropertyDescriptor>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Looks up a property by name.
    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over properties in declaration order, inherited ones first.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Layers property declarations over a base schema.
#[derive(Clone, Debug)]
pub struct SchemaBuilder {
    properties: Vec<PropertyDescriptor>,
}

impl SchemaBuilder {
    /// Starts from the base schema holding `_id` and `_rev`.
    pub fn new() -> Self {
        Self {
            properties: vec![ID.into(), REV.into()],
        }
    }

    /// Starts from a copy of `parent`.
    pub fn extending(parent: &Schema) -> Self {
        Self {
            properties: parent.properties.clone(),
        }
    }

    /// Declares a property, replacing an inherited one with the same name.
    pub fn property(mut self, descriptor: impl Into<PropertyDescriptor>) -> Self {
        let descriptor = descriptor.into();

        match self.properties.iter_mut().find(|p| p.name == descriptor.name) {
            Some(existing) => *existing = descriptor,
            None => self.properties.push(descriptor),
        }

        self
    }

    pub fn build(self) -> Schema {
        Schema {
            properties: self.properties,
        }
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::property::{Integer, List};
    use serde_json::json;

    const NAME: Property<Text> = Property::new("name");
    const AGE: Property<Integer> = Property::new("age");
    const TAGS: Property<List> = Property::new("tags");

    #[test]
    fn base_schema_has_reserved_fields() {
        let schema = SchemaBuilder::new().build();

        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["_id", "_rev"]);
        assert_eq!(schema.get("_id").map(|p| p.kind()), Some(PropertyType::Identifier));
    }

    #[test]
    fn child_overrides_in_place_and_appends() {
        let parent = Schema::builder()
            .property(NAME.describe().default("anonymous".to_string()))
            .property(AGE)
            .build();
        let child = SchemaBuilder::extending(&parent)
            .property(NAME.describe().default("child".to_string()))
            .property(TAGS)
            .build();

        assert_eq!(child.names().collect::<Vec<_>>(), vec!["_id", "_rev", "name", "age", "tags"]);
        let default_name = |schema: &Schema| {
            schema.get("name").and_then(|p| p.default()).map(|d| d.realize())
        };
        assert_eq!(default_name(&child), Some(json!("child")));
        assert_eq!(default_name(&parent), Some(json!("anonymous")));
        assert!(!parent.contains("tags"));
    }
}
