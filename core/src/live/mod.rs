//! Capability traits for the live document graph.
//!
//! The animation engine is an opaque, partially unreliable object graph. Every
//! accessor here returns [`Access`], and every capability that an engine
//! binding may or may not expose has a default body returning
//! [`AccessError::Missing`], so callers can tell "this object has no such
//! accessor" apart from "the accessor exists but failed".
//!
//! Handles are `Rc` because the whole inspector runs on one thread, driven
//! by engine callbacks and host-pumped timers.

pub mod memory;

use std::rc::Rc;

use vmscope_shared::{ArtboardInfo, AssetInfo, EnumDef, PropertyType, PropertyValue};

/// Result of calling into the live graph
pub type Access<T> = Result<T, AccessError>;

/// Failure of a single live accessor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// The object does not expose this capability
    #[error("`{0}` accessor is not available")]
    Missing(&'static str),

    /// The accessor exists but failed
    #[error("{0}")]
    Failed(String),
}

impl AccessError {
    pub fn failed(message: impl Into<String>) -> Self {
        AccessError::Failed(message.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, AccessError::Missing(_))
    }
}

/// Kind of a property as reported by the engine's property listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Boolean,
    Number,
    String,
    Color,
    Enum,
    Trigger,
    /// Nested view-model instance
    Instance,
    List,
    Image,
    /// Anything the binding reports that we don't know about
    Other(String),
}

impl PropertyKind {
    /// Leaf property type, or `None` for nested instances and unsupported kinds
    pub fn leaf_type(&self) -> Option<PropertyType> {
        match self {
            PropertyKind::Boolean => Some(PropertyType::Boolean),
            PropertyKind::Number => Some(PropertyType::Number),
            PropertyKind::String => Some(PropertyType::String),
            PropertyKind::Color => Some(PropertyType::Color),
            PropertyKind::Enum => Some(PropertyType::Enum),
            PropertyKind::Trigger => Some(PropertyType::Trigger),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PropertyKind::Boolean => "boolean",
            PropertyKind::Number => "number",
            PropertyKind::String => "string",
            PropertyKind::Color => "color",
            PropertyKind::Enum => "enum",
            PropertyKind::Trigger => "trigger",
            PropertyKind::Instance => "viewModel",
            PropertyKind::List => "list",
            PropertyKind::Image => "image",
            PropertyKind::Other(name) => name,
        }
    }

    /// Parse an engine kind name; unknown names become [`PropertyKind::Other`]
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => PropertyKind::Boolean,
            "number" => PropertyKind::Number,
            "string" => PropertyKind::String,
            "color" => PropertyKind::Color,
            "enum" | "enumtype" => PropertyKind::Enum,
            "trigger" => PropertyKind::Trigger,
            "viewmodel" | "instance" => PropertyKind::Instance,
            "list" => PropertyKind::List,
            "image" | "asset" => PropertyKind::Image,
            _ => PropertyKind::Other(name.to_string()),
        }
    }
}

/// Entry of an instance's property listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: String,
    pub kind: PropertyKind,
}

impl PropertyInfo {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Root of a loaded document
pub trait LiveGraph {
    /// Number of view-model definitions. Failure here is the only failure
    /// that aborts introspection.
    fn definition_count(&self) -> Access<usize>;

    fn definition_at(&self, index: usize) -> Access<Rc<dyn LiveDefinition>>;

    /// Look a definition up by name
    fn definition_by_name(&self, name: &str) -> Access<Option<Rc<dyn LiveDefinition>>> {
        for index in 0..self.definition_count()? {
            let def = self.definition_at(index)?;
            if def.name().ok().as_deref() == Some(name) {
                return Ok(Some(def));
            }
        }
        Ok(None)
    }

    /// Global enumeration definitions
    fn enums(&self) -> Access<Vec<EnumDef>> {
        Err(AccessError::Missing("enums"))
    }

    /// Artboards with their animations and state machines
    fn artboards(&self) -> Access<Vec<ArtboardInfo>> {
        Err(AccessError::Missing("artboards"))
    }

    fn assets(&self) -> Access<Vec<AssetInfo>> {
        Err(AccessError::Missing("assets"))
    }

    /// Instance the engine bound as default, if any
    fn default_instance(&self) -> Access<Option<Rc<dyn LiveInstance>>> {
        Err(AccessError::Missing("default_instance"))
    }

    /// Input of a running state machine
    fn state_machine_input(
        &self,
        _state_machine: &str,
        _input: &str,
    ) -> Access<Option<Rc<dyn LiveProperty>>> {
        Err(AccessError::Missing("state_machine_input"))
    }
}

/// A view-model definition (blueprint)
pub trait LiveDefinition {
    fn name(&self) -> Access<String>;

    fn instance_count(&self) -> Access<usize>;

    fn instance_at(&self, index: usize) -> Access<Rc<dyn LiveInstance>>;

    fn instance_by_name(&self, name: &str) -> Access<Option<Rc<dyn LiveInstance>>> {
        for index in 0..self.instance_count()? {
            let instance = self.instance_at(index)?;
            if instance.name().ok().as_deref() == Some(name) {
                return Ok(Some(instance));
            }
        }
        Ok(None)
    }
}

/// A concrete view-model instance
pub trait LiveInstance {
    fn name(&self) -> Access<String>;

    /// Name of the definition this instance conforms to
    fn type_name(&self) -> Access<Option<String>> {
        Err(AccessError::Missing("type_name"))
    }

    /// Property listing exposed as a direct collection
    fn properties(&self) -> Access<Vec<PropertyInfo>> {
        Err(AccessError::Missing("properties"))
    }

    /// Property listing exposed through an accessor call
    fn property_list(&self) -> Access<Vec<PropertyInfo>> {
        Err(AccessError::Missing("property_list"))
    }

    fn boolean(&self, _name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        Err(AccessError::Missing("boolean"))
    }

    fn number(&self, _name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        Err(AccessError::Missing("number"))
    }

    fn string(&self, _name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        Err(AccessError::Missing("string"))
    }

    fn color(&self, _name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        Err(AccessError::Missing("color"))
    }

    fn enumeration(&self, _name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        Err(AccessError::Missing("enum"))
    }

    fn trigger(&self, _name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        Err(AccessError::Missing("trigger"))
    }

    /// Nested instance held by a view-model property
    fn instance(&self, _name: &str) -> Access<Option<Rc<dyn LiveInstance>>> {
        Err(AccessError::Missing("instance"))
    }
}

/// Dispatch to the typed accessor for `ty`
pub fn typed_accessor(
    instance: &dyn LiveInstance,
    ty: PropertyType,
    name: &str,
) -> Access<Option<Rc<dyn LiveProperty>>> {
    match ty {
        PropertyType::Boolean => instance.boolean(name),
        PropertyType::Number => instance.number(name),
        PropertyType::String => instance.string(name),
        PropertyType::Color => instance.color(name),
        PropertyType::Enum => instance.enumeration(name),
        PropertyType::Trigger => instance.trigger(name),
        PropertyType::Unsupported => Err(AccessError::Missing("unsupported")),
    }
}

/// A typed leaf property handle
pub trait LiveProperty {
    /// Current value; `Ok(None)` when the engine reports null/undefined
    fn value(&self) -> Access<Option<PropertyValue>>;

    fn set_value(&self, _value: &PropertyValue) -> Access<()> {
        Err(AccessError::Missing("set_value"))
    }

    /// Enum type name the property reports about itself
    fn enum_type(&self) -> Access<Option<String>> {
        Err(AccessError::Missing("enum_type"))
    }

    /// Fire a trigger
    fn fire(&self) -> Access<()> {
        Err(AccessError::Missing("fire"))
    }

    /// Drive a trigger's raw pulse state
    fn pulse(&self, _active: bool) -> Access<()> {
        Err(AccessError::Missing("pulse"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_roundtrip() {
        for kind in [
            PropertyKind::Boolean,
            PropertyKind::Number,
            PropertyKind::String,
            PropertyKind::Color,
            PropertyKind::Enum,
            PropertyKind::Trigger,
            PropertyKind::Instance,
            PropertyKind::List,
            PropertyKind::Image,
        ] {
            assert_eq!(PropertyKind::from_name(kind.name()), kind);
        }
        assert_eq!(
            PropertyKind::from_name("artboard"),
            PropertyKind::Other("artboard".into())
        );
    }

    #[test]
    fn leaf_types() {
        assert_eq!(PropertyKind::Enum.leaf_type(), Some(PropertyType::Enum));
        assert_eq!(PropertyKind::Instance.leaf_type(), None);
        assert_eq!(PropertyKind::List.leaf_type(), None);
    }

    #[test]
    fn missing_is_distinct_from_failed() {
        assert!(AccessError::Missing("enum").is_missing());
        assert!(!AccessError::failed("threw").is_missing());
        assert_eq!(
            AccessError::Missing("enum").to_string(),
            "`enum` accessor is not available"
        );
    }
}
