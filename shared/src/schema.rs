//! Plain-data schema tree produced by introspecting a live document.
//!
//! Nothing in here references the live graph; a [`SchemaTree`] can be
//! serialized, diffed, or shipped to a tree viewer as-is.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Declared type of a leaf property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Boolean,
    Number,
    String,
    Color,
    Enum,
    Trigger,
    /// A property kind the control surface cannot represent (lists, images,
    /// unknown kinds). Always carries an access error.
    Unsupported,
}

impl PropertyType {
    /// Human-readable type name
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyType::Boolean => "boolean",
            PropertyType::Number => "number",
            PropertyType::String => "string",
            PropertyType::Color => "color",
            PropertyType::Enum => "enum",
            PropertyType::Trigger => "trigger",
            PropertyType::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// RGBA color, 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Unpack from 0xAARRGGBB
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    /// Pack to 0xAARRGGBB
    pub const fn to_argb(self) -> u32 {
        ((self.a as u32) << 24) | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// `#rrggbb` for opaque colors, `#rrggbbaa` otherwise
    pub fn to_hex(self) -> String {
        if self.a == 0xFF {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional)
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 16 + v;
                }
                Some(Self::new(out[0], out[1], out[2], 0xFF))
            }
            6 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, 0xFF)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

/// Value of a leaf property.
///
/// Serialized untagged; the owning node's [`PropertyType`] says how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Number(f64),
    String(String),
    Color(Color),
}

impl PropertyValue {
    /// Whether this value is acceptable for a property of the given type
    pub fn matches(&self, ty: PropertyType) -> bool {
        matches!(
            (self, ty),
            (PropertyValue::Boolean(_), PropertyType::Boolean)
                | (PropertyValue::Number(_), PropertyType::Number)
                | (PropertyValue::String(_), PropertyType::String)
                | (PropertyValue::String(_), PropertyType::Enum)
                | (PropertyValue::Color(_), PropertyType::Color)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            PropertyValue::Color(v) => Some(*v),
            _ => None,
        }
    }
}

/// Outcome of one accessor strategy tried while reading a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "lowercase")]
pub enum AttemptOutcome {
    /// The accessor exists and returned a value
    Ok,
    /// The accessor does not exist on this object
    Missing,
    /// The accessor exists but failed
    Failed(String),
}

/// Record of an accessor strategy and how it went
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAttempt {
    pub strategy: String,
    pub outcome: AttemptOutcome,
}

/// A typed leaf property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyNode {
    pub address: Address,
    pub name: String,
    pub declared_type: PropertyType,
    pub value: Option<PropertyValue>,
    /// Enum type names reported during introspection, best first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_type_candidates: Vec<String>,
    pub access_error: Option<String>,
    /// Accessor strategies tried, in order (only recorded when more than the
    /// canonical accessor was needed)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AccessAttempt>,
}

/// A nameable object in the live graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceNode {
    pub address: Address,
    pub instance_name: String,
    pub declared_type_name: Option<String>,
    /// Definition this instance was enumerated from (top-level instances only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_name: Option<String>,
    /// Enumeration index within the definition (top-level instances only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Property of the parent holding this instance (nested instances only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    pub children: Vec<SchemaNode>,
    pub parse_error: Option<String>,
}

/// Node in the instance/property tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SchemaNode {
    Instance(InstanceNode),
    Property(PropertyNode),
}

impl SchemaNode {
    pub fn address(&self) -> &Address {
        match self {
            SchemaNode::Instance(node) => &node.address,
            SchemaNode::Property(node) => &node.address,
        }
    }

    /// Error recorded on this node, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            SchemaNode::Instance(node) => node.parse_error.as_deref(),
            SchemaNode::Property(node) => node.access_error.as_deref(),
        }
    }
}

/// A view-model definition and the instances enumerated from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionNode {
    pub name: String,
    pub instances: Vec<InstanceNode>,
    pub parse_error: Option<String>,
}

/// Global enumeration definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Kind of a state machine input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Boolean,
    Number,
    Trigger,
}

impl InputKind {
    /// Property type used for the input's control
    pub fn property_type(&self) -> PropertyType {
        match self {
            InputKind::Boolean => PropertyType::Boolean,
            InputKind::Number => PropertyType::Number,
            InputKind::Trigger => PropertyType::Trigger,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputInfo {
    pub name: String,
    pub kind: InputKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineInfo {
    pub name: String,
    pub inputs: Vec<InputInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtboardInfo {
    pub name: String,
    pub animations: Vec<String>,
    pub state_machines: Vec<StateMachineInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub name: String,
    pub kind: String,
}

/// Borrowed view of a node while walking a [`SchemaTree`]
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Instance(&'a InstanceNode),
    Property(&'a PropertyNode),
}

impl<'a> NodeRef<'a> {
    pub fn address(&self) -> &'a Address {
        match self {
            NodeRef::Instance(node) => &node.address,
            NodeRef::Property(node) => &node.address,
        }
    }

    pub fn error(&self) -> Option<&'a str> {
        match self {
            NodeRef::Instance(node) => node.parse_error.as_deref(),
            NodeRef::Property(node) => node.access_error.as_deref(),
        }
    }
}

/// Counts gathered from a schema tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchemaStats {
    pub instances: usize,
    pub properties: usize,
    pub errors: usize,
}

/// Result of introspecting a live document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTree {
    pub definitions: Vec<DefinitionNode>,
    pub enums: Vec<EnumDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enums_error: Option<String>,
    pub artboards: Vec<ArtboardInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artboards_error: Option<String>,
    pub assets: Vec<AssetInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets_error: Option<String>,
    pub default_instance: Option<Address>,
}

fn walk_instance<'a>(node: &'a InstanceNode, visit: &mut dyn FnMut(NodeRef<'a>)) {
    visit(NodeRef::Instance(node));
    for child in &node.children {
        match child {
            SchemaNode::Instance(inner) => walk_instance(inner, visit),
            SchemaNode::Property(prop) => visit(NodeRef::Property(prop)),
        }
    }
}

impl SchemaTree {
    /// Serialize to a JSON value
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Visit every instance and property node depth-first, in walk order
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(NodeRef<'a>)) {
        for def in &self.definitions {
            for instance in &def.instances {
                walk_instance(instance, &mut visit);
            }
        }
    }

    /// Find a node by address
    pub fn find(&self, address: &Address) -> Option<NodeRef<'_>> {
        let mut found = None;
        self.walk(|node| {
            if found.is_none() && node.address() == address {
                found = Some(node);
            }
        });
        found
    }

    /// Count instances, properties and error markers
    pub fn stats(&self) -> SchemaStats {
        let mut stats = SchemaStats::default();
        stats.errors += self
            .definitions
            .iter()
            .filter(|def| def.parse_error.is_some())
            .count();
        self.walk(|node| {
            match node {
                NodeRef::Instance(_) => stats.instances += 1,
                NodeRef::Property(_) => stats.properties += 1,
            }
            if node.error().is_some() {
                stats.errors += 1;
            }
        });
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> SchemaTree {
        let root = Address::root("Root").unwrap();
        SchemaTree {
            definitions: vec![DefinitionNode {
                name: "Player".into(),
                instances: vec![InstanceNode {
                    address: root.clone(),
                    instance_name: "Root".into(),
                    declared_type_name: Some("Player".into()),
                    definition_name: Some("Player".into()),
                    index: Some(0),
                    property_name: None,
                    children: vec![
                        SchemaNode::Property(PropertyNode {
                            address: root.child("Volume").unwrap(),
                            name: "Volume".into(),
                            declared_type: PropertyType::Number,
                            value: Some(PropertyValue::Number(0.5)),
                            enum_type_candidates: vec![],
                            access_error: None,
                            attempts: vec![],
                        }),
                        SchemaNode::Property(PropertyNode {
                            address: root.child("Broken").unwrap(),
                            name: "Broken".into(),
                            declared_type: PropertyType::String,
                            value: None,
                            enum_type_candidates: vec![],
                            access_error: Some("boom".into()),
                            attempts: vec![],
                        }),
                    ],
                    parse_error: None,
                }],
                parse_error: None,
            }],
            default_instance: Some(root),
            ..Default::default()
        }
    }

    #[test]
    fn color_hex_roundtrip() {
        let c = Color::from_argb(0xFF336699);
        assert_eq!(c, Color::new(0x33, 0x66, 0x99, 0xFF));
        assert_eq!(c.to_hex(), "#336699");
        assert_eq!(c.to_argb(), 0xFF336699);
        assert_eq!(Color::from_hex("#336699"), Some(c));
        assert_eq!(Color::from_hex("#33669980").map(|c| c.a), Some(0x80));
        assert_eq!(Color::from_hex("#fff"), Some(Color::new(255, 255, 255, 255)));
        assert_eq!(Color::from_hex("nope"), None);
    }

    #[test]
    fn value_matches_type() {
        assert!(PropertyValue::Number(1.0).matches(PropertyType::Number));
        assert!(PropertyValue::String("a".into()).matches(PropertyType::Enum));
        assert!(!PropertyValue::Boolean(true).matches(PropertyType::Number));
        assert!(!PropertyValue::Number(1.0).matches(PropertyType::Trigger));
    }

    #[test]
    fn tree_serializes_to_plain_json() {
        let json = sample_tree().to_json().unwrap();
        let instance = &json["definitions"][0]["instances"][0];
        assert_eq!(instance["address"], serde_json::json!(["Root"]));
        let volume = &instance["children"][0];
        assert_eq!(volume["kind"], "property");
        assert_eq!(volume["declaredType"], "number");
        assert_eq!(volume["value"], 0.5);
        assert_eq!(volume["address"], serde_json::json!(["Root", "Volume"]));
    }

    #[test]
    fn tree_json_roundtrip_preserves_structure() {
        let tree = sample_tree();
        let text = serde_json::to_string(&tree).unwrap();
        let back: SchemaTree = serde_json::from_str(&text).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn stats_and_find() {
        let tree = sample_tree();
        let stats = tree.stats();
        assert_eq!(stats.instances, 1);
        assert_eq!(stats.properties, 2);
        assert_eq!(stats.errors, 1);

        let addr = Address::from_segments(["Root", "Volume"]).unwrap();
        match tree.find(&addr) {
            Some(NodeRef::Property(p)) => assert_eq!(p.value, Some(PropertyValue::Number(0.5))),
            other => panic!("unexpected {:?}", other),
        }
    }
}
