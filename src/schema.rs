//! Statically declared property tables.
//!
//! Every settings type describes its properties once, up front. The resulting
//! [`Schema`] is the single source of truth for which names are settable,
//! which value types they take, and what their defaults are. Revert and load
//! both resolve names through it.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use crate::error::SettingsError;
use crate::value::{PropertyType, Value};

/// A typed property key.
///
/// ```ignore
/// const YEAR: Property<i64> = Property::new("year");
/// settings.set(YEAR, 2024)?;
/// let year = settings.get(YEAR);
/// ```
pub struct Property<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> Property<T> {
    pub const fn new(name: &'static str) -> Self {
        Property {
            name,
            _type: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Property<T> {}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Property").field(&self.name).finish()
    }
}

/// One row of the property table.
#[derive(Clone)]
pub struct PropertyDef {
    name: &'static str,
    kind: &'static str,
    default: Value,
    accepts: fn(&Value) -> bool,
}

impl PropertyDef {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn accepts(&self, value: &Value) -> bool {
        (self.accepts)(value)
    }
}

impl fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    type_name: &'static str,
    properties: Vec<PropertyDef>,
    index: HashMap<&'static str, usize>,
}

impl Schema {
    pub fn builder(type_name: &'static str) -> SchemaBuilder {
        SchemaBuilder {
            type_name,
            properties: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDef> {
        self.index.get(name).map(|&i| &self.properties[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declared properties in declaration order.
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Resolve `name` and verify `value` fits its declared type.
    pub fn check(&self, name: &str, value: &Value) -> Result<&PropertyDef, SettingsError> {
        let def = self
            .get(name)
            .ok_or_else(|| SettingsError::UnknownProperty {
                type_name: self.type_name,
                name: name.to_string(),
            })?;
        if !def.accepts(value) {
            return Err(SettingsError::TypeMismatch {
                name: name.to_string(),
                expected: def.kind,
                found: value.kind(),
            });
        }
        if !value.is_finite() {
            return Err(SettingsError::NonFiniteFloat {
                name: name.to_string(),
            });
        }
        Ok(def)
    }
}

pub struct SchemaBuilder {
    type_name: &'static str,
    properties: Vec<PropertyDef>,
}

impl SchemaBuilder {
    /// Declare a property with its default. Redeclaring a name replaces the
    /// earlier row in place.
    pub fn property<T: PropertyType>(mut self, property: Property<T>, default: T) -> Self {
        let def = PropertyDef {
            name: property.name,
            kind: T::KIND,
            default: default.into_value(),
            accepts: T::accepts,
        };
        match self.properties.iter_mut().find(|d| d.name == def.name) {
            Some(existing) => *existing = def,
            None => self.properties.push(def),
        }
        self
    }

    pub fn build(self) -> Schema {
        let index = self
            .properties
            .iter()
            .enumerate()
            .map(|(i, def)| (def.name, i))
            .collect();
        Schema {
            type_name: self.type_name,
            properties: self.properties,
            index,
        }
    }
}
