//! Property kinds and typed property accessors.
//!
//! Each kind fixes how a native Rust value is written into a document (`to_json`)
//! and read back out (`to_native`). A [`Property`] is a named, typed handle used with
//! [`Instance::get`](super::Instance::get) and [`Instance::set`](super::Instance::set).

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde_json::{Map, Value};
use std::{fmt, marker::PhantomData, sync::Arc};

use crate::error::{ConversionError, LoveseatResult, LoveseatError};

use super::schema::{DefaultValue, PropertyDescriptor};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The kind of a declared property, used when a schema is walked without static types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Dict,
    List,
    Identifier,
}

impl PropertyType {
    /// Converts a JSON value to the kind's native type and back, yielding the value
    /// that `set` would store.
    pub fn normalize(self, value: &Value) -> Result<Value, ConversionError> {
        fn round_trip<K: PropertyKind>(value: &Value) -> Result<Value, ConversionError> {
            Ok(K::to_json(&K::to_native(value)?))
        }

        match self {
            PropertyType::String => round_trip::<Text>(value),
            PropertyType::Integer => round_trip::<Integer>(value),
            PropertyType::Float => round_trip::<Float>(value),
            PropertyType::Boolean => round_trip::<Boolean>(value),
            PropertyType::Date => round_trip::<Date>(value),
            PropertyType::DateTime => round_trip::<DateTime>(value),
            PropertyType::Dict => round_trip::<Dict>(value),
            PropertyType::List => round_trip::<List>(value),
            PropertyType::Identifier => round_trip::<Identifier>(value),
        }
    }

    /// The default every property of this kind gets unless one is declared.
    pub(crate) fn implicit_default(self) -> Option<DefaultValue> {
        match self {
            PropertyType::Dict => Some(DefaultValue::Value(Value::Object(Map::new()))),
            PropertyType::List => Some(DefaultValue::Value(Value::Array(Vec::new()))),
            _ => None,
        }
    }
}

/// Conversion between a native type and its JSON form.
pub trait PropertyKind: Send + Sync + 'static {
    type Native: Clone + Send + Sync + 'static;

    const TYPE: PropertyType;

    fn to_native(value: &Value) -> Result<Self::Native, ConversionError>;

    fn to_json(value: &Self::Native) -> Value;
}

/// Free-form text. Non-string JSON values read as their JSON rendering.
pub struct Text;

impl PropertyKind for Text {
    type Native = String;

    const TYPE: PropertyType = PropertyType::String;

    fn to_native(value: &Value) -> Result<String, ConversionError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Null => Err(ConversionError::new("a string", value)),
            other => Ok(other.to_string()),
        }
    }

    fn to_json(value: &String) -> Value {
        Value::String(value.clone())
    }
}

/// A 64-bit signed integer. Floats truncate toward zero, numeric strings parse.
pub struct Integer;

impl PropertyKind for Integer {
    type Native = i64;

    const TYPE: PropertyType = PropertyType::Integer;

    fn to_native(value: &Value) -> Result<i64, ConversionError> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .ok_or_else(|| ConversionError::new("an integer", value)),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| ConversionError::new("an integer", value)),
            Value::Bool(b) => Ok(i64::from(*b)),
            _ => Err(ConversionError::new("an integer", value)),
        }
    }

    fn to_json(value: &i64) -> Value {
        Value::from(*value)
    }
}

/// A double-precision float. Non-finite values are stored as `null`.
pub struct Float;

impl PropertyKind for Float {
    type Native = f64;

    const TYPE: PropertyType = PropertyType::Float;

    fn to_native(value: &Value) -> Result<f64, ConversionError> {
        match value {
            Value::Number(n) => n.as_f64().ok_or_else(|| ConversionError::new("a float", value)),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| ConversionError::new("a float", value)),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            _ => Err(ConversionError::new("a float", value)),
        }
    }

    fn to_json(value: &f64) -> Value {
        Value::from(*value)
    }
}

pub struct Boolean;

impl PropertyKind for Boolean {
    type Native = bool;

    const TYPE: PropertyType = PropertyType::Boolean;

    fn to_native(value: &Value) -> Result<bool, ConversionError> {
        value.as_bool().ok_or_else(|| ConversionError::new("a boolean", value))
    }

    fn to_json(value: &bool) -> Value {
        Value::Bool(*value)
    }
}

/// A calendar date stored as `YYYY-MM-DD`.
pub struct Date;

impl PropertyKind for Date {
    type Native = NaiveDate;

    const TYPE: PropertyType = PropertyType::Date;

    fn to_native(value: &Value) -> Result<NaiveDate, ConversionError> {
        value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
            .ok_or_else(|| ConversionError::new("a YYYY-MM-DD date", value))
    }

    fn to_json(value: &NaiveDate) -> Value {
        Value::String(value.format(DATE_FORMAT).to_string())
    }
}

/// A naive timestamp stored as `YYYY-MM-DDTHH:MM:SS`; sub-second precision is dropped.
pub struct DateTime;

impl PropertyKind for DateTime {
    type Native = NaiveDateTime;

    const TYPE: PropertyType = PropertyType::DateTime;

    fn to_native(value: &Value) -> Result<NaiveDateTime, ConversionError> {
        value
            .as_str()
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
            .map(|dt| dt.with_nanosecond(0).unwrap_or(dt))
            .ok_or_else(|| ConversionError::new("a YYYY-MM-DDTHH:MM:SS timestamp", value))
    }

    fn to_json(value: &NaiveDateTime) -> Value {
        Value::String(value.format(DATE_TIME_FORMAT).to_string())
    }
}

/// A JSON object, kept as-is. Defaults to `{}`.
pub struct Dict;

impl PropertyKind for Dict {
    type Native = Map<String, Value>;

    const TYPE: PropertyType = PropertyType::Dict;

    fn to_native(value: &Value) -> Result<Map<String, Value>, ConversionError> {
        value
            .as_object()
            .cloned()
            .ok_or_else(|| ConversionError::new("an object", value))
    }

    fn to_json(value: &Map<String, Value>) -> Value {
        Value::Object(value.clone())
    }
}

/// A JSON array, kept as-is. Defaults to `[]`.
pub struct List;

impl PropertyKind for List {
    type Native = Vec<Value>;

    const TYPE: PropertyType = PropertyType::List;

    fn to_native(value: &Value) -> Result<Vec<Value>, ConversionError> {
        value
            .as_array()
            .cloned()
            .ok_or_else(|| ConversionError::new("an array", value))
    }

    fn to_json(value: &Vec<Value>) -> Value {
        Value::Array(value.clone())
    }
}

/// A document identifier, namespaced by the owning mapper type as `TypeName:value`.
///
/// The prefix is applied by the [`Instance`](super::Instance) on write; unset
/// identifiers are allocated from the server's UUID pool on first read.
pub struct Identifier;

impl PropertyKind for Identifier {
    type Native = String;

    const TYPE: PropertyType = PropertyType::Identifier;

    fn to_native(value: &Value) -> Result<String, ConversionError> {
        Text::to_native(value)
    }

    fn to_json(value: &String) -> Value {
        Value::String(value.clone())
    }
}

/// A named, typed handle to a property.
///
/// Usually declared as an associated constant of the mapper type:
///
/// ```ignore
/// impl Person {
///     pub const NAME: Property<Text> = Property::new("name");
///     pub const BORN: Property<Date> = Property::new("born");
/// }
/// ```
pub struct Property<K: PropertyKind> {
    name: &'static str,
    kind: PhantomData<fn() -> K>,
}

impl<K: PropertyKind> Property<K> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            kind: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Starts a schema declaration for this property.
    pub fn describe(&self) -> DescriptorBuilder<K> {
        DescriptorBuilder {
            name: self.name,
            default: K::TYPE.implicit_default(),
            kind: PhantomData,
        }
    }

    pub(crate) fn convert(&self, value: &Value) -> LoveseatResult<K::Native> {
        K::to_native(value).map_err(|source| LoveseatError::Conversion {
            property: self.name.to_string(),
            source,
        })
    }
}

impl<K: PropertyKind> Clone for Property<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: PropertyKind> Copy for Property<K> {}

impl<K: PropertyKind> fmt::Debug for Property<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("kind", &K::TYPE)
            .finish()
    }
}

/// Typed builder for a [`PropertyDescriptor`].
pub struct DescriptorBuilder<K: PropertyKind> {
    name: &'static str,
    default: Option<DefaultValue>,
    kind: PhantomData<fn() -> K>,
}

impl<K: PropertyKind> DescriptorBuilder<K> {
    /// Uses a fixed value when the property is read before being set.
    pub fn default(mut self, value: K::Native) -> Self {
        self.default = Some(DefaultValue::Value(K::to_json(&value)));
        self
    }

    /// Calls `generator` when the property is read before being set. The generated
    /// value is written back, so it is produced at most once per instance.
    pub fn default_with<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> K::Native + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Generator(Arc::new(move || K::to_json(&generator()))));
        self
    }

    /// Removes any default, including the implicit one of `Dict` and `List`.
    pub fn no_default(mut self) -> Self {
        self.default = None;
        self
    }

    pub fn build(self) -> PropertyDescriptor {
        PropertyDescriptor::new(self.name, K::TYPE, self.default)
    }
}

impl<K: PropertyKind> From<DescriptorBuilder<K>> for PropertyDescriptor {
    fn from(builder: DescriptorBuilder<K>) -> Self {
        builder.build()
    }
}

impl<K: PropertyKind> From<Property<K>> for PropertyDescriptor {
    fn from(property: Property<K>) -> Self {
        property.describe().build()
    }
}
