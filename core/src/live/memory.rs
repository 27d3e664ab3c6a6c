//! In-memory live graph built from a serializable document snapshot.
//!
//! Used by the CLI to inspect exported documents and by tests to drive the
//! inspector. Every accessor can be made to fail (or to disappear) through
//! fault injection, keyed by node path and accessor name.
//!
//! Paths mirror address display strings: a top-level instance is addressed
//! by its name (`Definition#index` when unnamed), nested nodes append
//! `/<property>`. State machine inputs live under `@sm/<machine>/<input>`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use vmscope_shared::{
    ArtboardInfo, AssetInfo, Color, EnumDef, InputInfo, InputKind, PropertyValue,
    StateMachineInfo,
};

use super::{
    Access, AccessError, LiveDefinition, LiveGraph, LiveInstance, LiveProperty, PropertyInfo,
    PropertyKind,
};

/// Path used for graph-level accessors in fault keys
pub const GRAPH_PATH: &str = "";

// =============================================================================
// Snapshot format
// =============================================================================

/// Serializable description of a loaded document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    #[serde(default)]
    pub definitions: Vec<DefinitionSnapshot>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
    #[serde(default)]
    pub artboards: Vec<ArtboardSnapshot>,
    #[serde(default)]
    pub assets: Vec<AssetInfo>,
    /// Name of the instance the engine binds by default
    #[serde(default)]
    pub default_instance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionSnapshot {
    pub name: String,
    #[serde(default)]
    pub instances: Vec<InstanceSnapshot>,
}

impl DefinitionSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: Vec::new(),
        }
    }

    pub fn with_instance(mut self, instance: InstanceSnapshot) -> Self {
        self.instances.push(instance);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertySnapshot>,
}

impl InstanceSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            properties: Vec::new(),
        }
    }

    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with(mut self, property: PropertySnapshot) -> Self {
        self.properties.push(property);
        self
    }
}

/// A property and its initial value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PropertySnapshot {
    Boolean {
        name: String,
        #[serde(default)]
        value: bool,
    },
    Number {
        name: String,
        #[serde(default)]
        value: f64,
    },
    #[serde(rename = "string")]
    Text {
        name: String,
        #[serde(default)]
        value: String,
    },
    /// Hex color (`#rrggbb` / `#rrggbbaa`)
    Color { name: String, value: String },
    #[serde(rename_all = "camelCase")]
    Enum {
        name: String,
        #[serde(default)]
        value: String,
        #[serde(default)]
        enum_type: Option<String>,
    },
    Trigger { name: String },
    ViewModel {
        name: String,
        instance: InstanceSnapshot,
    },
    List { name: String },
}

impl PropertySnapshot {
    pub fn boolean(name: &str, value: bool) -> Self {
        PropertySnapshot::Boolean {
            name: name.into(),
            value,
        }
    }

    pub fn number(name: &str, value: f64) -> Self {
        PropertySnapshot::Number {
            name: name.into(),
            value,
        }
    }

    pub fn text(name: &str, value: &str) -> Self {
        PropertySnapshot::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn color(name: &str, hex: &str) -> Self {
        PropertySnapshot::Color {
            name: name.into(),
            value: hex.into(),
        }
    }

    pub fn enumeration(name: &str, value: &str, enum_type: Option<&str>) -> Self {
        PropertySnapshot::Enum {
            name: name.into(),
            value: value.into(),
            enum_type: enum_type.map(Into::into),
        }
    }

    pub fn trigger(name: &str) -> Self {
        PropertySnapshot::Trigger { name: name.into() }
    }

    pub fn view_model(name: &str, instance: InstanceSnapshot) -> Self {
        PropertySnapshot::ViewModel {
            name: name.into(),
            instance,
        }
    }

    pub fn list(name: &str) -> Self {
        PropertySnapshot::List { name: name.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            PropertySnapshot::Boolean { name, .. }
            | PropertySnapshot::Number { name, .. }
            | PropertySnapshot::Text { name, .. }
            | PropertySnapshot::Color { name, .. }
            | PropertySnapshot::Enum { name, .. }
            | PropertySnapshot::Trigger { name }
            | PropertySnapshot::ViewModel { name, .. }
            | PropertySnapshot::List { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtboardSnapshot {
    pub name: String,
    #[serde(default)]
    pub animations: Vec<String>,
    #[serde(default)]
    pub state_machines: Vec<StateMachineSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMachineSnapshot {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<InputSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub name: String,
    pub kind: InputKind,
    #[serde(default)]
    pub value: Option<PropertyValue>,
}

// =============================================================================
// Shared state: faults, disposal, write log
// =============================================================================

/// Mutation applied to the graph through a live handle
#[derive(Debug, Clone, PartialEq)]
pub enum WriteAction {
    Set(PropertyValue),
    Fire,
    Pulse(bool),
}

/// Entry in the graph's write log
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub path: String,
    pub action: WriteAction,
}

#[derive(Debug, Default)]
struct GraphState {
    /// `path#accessor` keys that fail
    faults: RefCell<HashSet<String>>,
    /// `path#accessor` keys that are absent
    missing: RefCell<HashSet<String>>,
    disposed: Cell<bool>,
    writes: RefCell<Vec<WriteRecord>>,
}

fn fault_key(path: &str, accessor: &str) -> String {
    format!("{}#{}", path, accessor)
}

impl GraphState {
    fn check(&self, path: &str, accessor: &'static str) -> Access<()> {
        if self.disposed.get() {
            return Err(AccessError::failed("document has been disposed"));
        }
        let key = fault_key(path, accessor);
        if self.missing.borrow().contains(&key) {
            return Err(AccessError::Missing(accessor));
        }
        if self.faults.borrow().contains(&key) || self.faults.borrow().contains(&fault_key(path, "*")) {
            return Err(AccessError::Failed(format!(
                "{} accessor threw for `{}`",
                accessor, path
            )));
        }
        Ok(())
    }

    fn record(&self, path: &str, action: WriteAction) {
        self.writes.borrow_mut().push(WriteRecord {
            path: path.to_string(),
            action,
        });
    }
}

// =============================================================================
// Live objects
// =============================================================================

/// Leaf property handle
#[derive(Debug)]
pub struct MemoryProperty {
    state: Rc<GraphState>,
    path: String,
    kind: PropertyKind,
    value: RefCell<Option<PropertyValue>>,
    enum_type: Option<String>,
    fires: Cell<u32>,
}

impl MemoryProperty {
    fn new(
        state: &Rc<GraphState>,
        path: String,
        kind: PropertyKind,
        value: Option<PropertyValue>,
        enum_type: Option<String>,
    ) -> Rc<Self> {
        Rc::new(Self {
            state: state.clone(),
            path,
            kind,
            value: RefCell::new(value),
            enum_type,
            fires: Cell::new(0),
        })
    }
}

impl LiveProperty for MemoryProperty {
    fn value(&self) -> Access<Option<PropertyValue>> {
        self.state.check(&self.path, "read")?;
        Ok(self.value.borrow().clone())
    }

    fn set_value(&self, value: &PropertyValue) -> Access<()> {
        self.state.check(&self.path, "write")?;
        let accepted = match self.kind.leaf_type() {
            Some(ty) => value.matches(ty),
            None => false,
        };
        if !accepted {
            return Err(AccessError::Failed(format!(
                "cannot assign {:?} to {} property `{}`",
                value,
                self.kind.name(),
                self.path
            )));
        }
        *self.value.borrow_mut() = Some(value.clone());
        self.state.record(&self.path, WriteAction::Set(value.clone()));
        Ok(())
    }

    fn enum_type(&self) -> Access<Option<String>> {
        if self.kind != PropertyKind::Enum {
            return Err(AccessError::Missing("enum_type"));
        }
        self.state.check(&self.path, "enum_type")?;
        Ok(self.enum_type.clone())
    }

    fn fire(&self) -> Access<()> {
        if self.kind != PropertyKind::Trigger {
            return Err(AccessError::Missing("fire"));
        }
        self.state.check(&self.path, "fire")?;
        self.fires.set(self.fires.get() + 1);
        self.state.record(&self.path, WriteAction::Fire);
        Ok(())
    }

    fn pulse(&self, active: bool) -> Access<()> {
        if self.kind != PropertyKind::Trigger {
            return Err(AccessError::Missing("pulse"));
        }
        self.state.check(&self.path, "pulse")?;
        self.state.record(&self.path, WriteAction::Pulse(active));
        Ok(())
    }
}

#[derive(Debug)]
enum Slot {
    Leaf(Rc<MemoryProperty>),
    Nested(Rc<MemoryInstance>),
    Opaque,
}

/// View-model instance
#[derive(Debug)]
pub struct MemoryInstance {
    state: Rc<GraphState>,
    path: String,
    name: String,
    type_name: Option<String>,
    slots: Vec<(PropertyInfo, Slot)>,
}

impl MemoryInstance {
    fn leaf(
        &self,
        name: &str,
        accessor: &'static str,
        kinds: &[PropertyKind],
    ) -> Access<Option<Rc<dyn LiveProperty>>> {
        self.state.check(&format!("{}/{}", self.path, name), accessor)?;
        Ok(self.slots.iter().find_map(|(info, slot)| match slot {
            Slot::Leaf(prop) if info.name == name && kinds.contains(&info.kind) => {
                Some(prop.clone() as Rc<dyn LiveProperty>)
            }
            _ => None,
        }))
    }

    fn listing(&self) -> Vec<PropertyInfo> {
        self.slots.iter().map(|(info, _)| info.clone()).collect()
    }
}

impl LiveInstance for MemoryInstance {
    fn name(&self) -> Access<String> {
        self.state.check(&self.path, "name")?;
        Ok(self.name.clone())
    }

    fn type_name(&self) -> Access<Option<String>> {
        self.state.check(&self.path, "type_name")?;
        Ok(self.type_name.clone())
    }

    fn properties(&self) -> Access<Vec<PropertyInfo>> {
        self.state.check(&self.path, "properties")?;
        Ok(self.listing())
    }

    fn property_list(&self) -> Access<Vec<PropertyInfo>> {
        self.state.check(&self.path, "property_list")?;
        Ok(self.listing())
    }

    fn boolean(&self, name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        self.leaf(name, "boolean", &[PropertyKind::Boolean])
    }

    fn number(&self, name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        self.leaf(name, "number", &[PropertyKind::Number])
    }

    fn string(&self, name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        // Enum values read fine through the string accessor
        self.leaf(name, "string", &[PropertyKind::String, PropertyKind::Enum])
    }

    fn color(&self, name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        self.leaf(name, "color", &[PropertyKind::Color])
    }

    fn enumeration(&self, name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        self.leaf(name, "enum", &[PropertyKind::Enum])
    }

    fn trigger(&self, name: &str) -> Access<Option<Rc<dyn LiveProperty>>> {
        self.leaf(name, "trigger", &[PropertyKind::Trigger])
    }

    fn instance(&self, name: &str) -> Access<Option<Rc<dyn LiveInstance>>> {
        self.state
            .check(&format!("{}/{}", self.path, name), "instance")?;
        Ok(self.slots.iter().find_map(|(info, slot)| match slot {
            Slot::Nested(inner) if info.name == name => Some(inner.clone() as Rc<dyn LiveInstance>),
            _ => None,
        }))
    }
}

/// View-model definition
#[derive(Debug)]
pub struct MemoryDefinition {
    state: Rc<GraphState>,
    name: String,
    instances: Vec<Rc<MemoryInstance>>,
}

impl MemoryDefinition {
    fn path(&self) -> String {
        format!("def:{}", self.name)
    }
}

impl LiveDefinition for MemoryDefinition {
    fn name(&self) -> Access<String> {
        self.state.check(&self.path(), "name")?;
        Ok(self.name.clone())
    }

    fn instance_count(&self) -> Access<usize> {
        self.state.check(&self.path(), "instances")?;
        Ok(self.instances.len())
    }

    fn instance_at(&self, index: usize) -> Access<Rc<dyn LiveInstance>> {
        self.state.check(&self.path(), "instances")?;
        self.instances
            .get(index)
            .map(|instance| instance.clone() as Rc<dyn LiveInstance>)
            .ok_or_else(|| AccessError::Failed(format!("instance index {} out of range", index)))
    }
}

// =============================================================================
// Graph
// =============================================================================

/// Document graph held entirely in memory
#[derive(Debug)]
pub struct MemoryGraph {
    state: Rc<GraphState>,
    definitions: Vec<Rc<MemoryDefinition>>,
    enums: Vec<EnumDef>,
    artboards: Vec<ArtboardInfo>,
    assets: Vec<AssetInfo>,
    default_instance: Option<Rc<MemoryInstance>>,
    leaves: HashMap<String, Rc<MemoryProperty>>,
    inputs: HashMap<(String, String), Rc<MemoryProperty>>,
}

struct GraphBuilder {
    state: Rc<GraphState>,
    leaves: HashMap<String, Rc<MemoryProperty>>,
}

impl GraphBuilder {
    fn instance(&mut self, path: String, snapshot: &InstanceSnapshot) -> Rc<MemoryInstance> {
        let mut slots = Vec::with_capacity(snapshot.properties.len());
        for prop in &snapshot.properties {
            let prop_path = format!("{}/{}", path, prop.name());
            let (kind, slot) = match prop {
                PropertySnapshot::Boolean { value, .. } => (
                    PropertyKind::Boolean,
                    self.leaf(prop_path, PropertyKind::Boolean, Some(PropertyValue::Boolean(*value)), None),
                ),
                PropertySnapshot::Number { value, .. } => (
                    PropertyKind::Number,
                    self.leaf(prop_path, PropertyKind::Number, Some(PropertyValue::Number(*value)), None),
                ),
                PropertySnapshot::Text { value, .. } => (
                    PropertyKind::String,
                    self.leaf(
                        prop_path,
                        PropertyKind::String,
                        Some(PropertyValue::String(value.clone())),
                        None,
                    ),
                ),
                PropertySnapshot::Color { value, .. } => (
                    PropertyKind::Color,
                    self.leaf(
                        prop_path,
                        PropertyKind::Color,
                        Color::from_hex(value).map(PropertyValue::Color),
                        None,
                    ),
                ),
                PropertySnapshot::Enum {
                    value, enum_type, ..
                } => (
                    PropertyKind::Enum,
                    self.leaf(
                        prop_path,
                        PropertyKind::Enum,
                        Some(PropertyValue::String(value.clone())),
                        enum_type.clone(),
                    ),
                ),
                PropertySnapshot::Trigger { .. } => (
                    PropertyKind::Trigger,
                    self.leaf(prop_path, PropertyKind::Trigger, None, None),
                ),
                PropertySnapshot::ViewModel { instance, .. } => (
                    PropertyKind::Instance,
                    Slot::Nested(self.instance(prop_path, instance)),
                ),
                PropertySnapshot::List { .. } => (PropertyKind::List, Slot::Opaque),
            };
            slots.push((PropertyInfo::new(prop.name(), kind), slot));
        }

        Rc::new(MemoryInstance {
            state: self.state.clone(),
            path,
            name: snapshot.name.clone(),
            type_name: snapshot.type_name.clone(),
            slots,
        })
    }

    fn leaf(
        &mut self,
        path: String,
        kind: PropertyKind,
        value: Option<PropertyValue>,
        enum_type: Option<String>,
    ) -> Slot {
        let prop = MemoryProperty::new(&self.state, path.clone(), kind, value, enum_type);
        self.leaves.insert(path, prop.clone());
        Slot::Leaf(prop)
    }
}

impl MemoryGraph {
    /// Build a graph from a snapshot
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Self {
        let state = Rc::new(GraphState::default());
        let mut builder = GraphBuilder {
            state: state.clone(),
            leaves: HashMap::new(),
        };

        let mut default_instance = None;
        let mut definitions = Vec::with_capacity(snapshot.definitions.len());
        for def in &snapshot.definitions {
            let mut instances = Vec::with_capacity(def.instances.len());
            for (index, inst) in def.instances.iter().enumerate() {
                let path = if inst.name.is_empty() {
                    format!("{}#{}", def.name, index)
                } else {
                    inst.name.clone()
                };
                let instance = builder.instance(path, inst);
                if default_instance.is_none()
                    && !inst.name.is_empty()
                    && snapshot.default_instance.as_deref() == Some(inst.name.as_str())
                {
                    default_instance = Some(instance.clone());
                }
                instances.push(instance);
            }
            definitions.push(Rc::new(MemoryDefinition {
                state: state.clone(),
                name: def.name.clone(),
                instances,
            }));
        }

        let mut inputs = HashMap::new();
        let mut artboards = Vec::with_capacity(snapshot.artboards.len());
        for board in &snapshot.artboards {
            let mut machines = Vec::with_capacity(board.state_machines.len());
            for machine in &board.state_machines {
                for input in &machine.inputs {
                    let kind = match input.kind {
                        InputKind::Boolean => PropertyKind::Boolean,
                        InputKind::Number => PropertyKind::Number,
                        InputKind::Trigger => PropertyKind::Trigger,
                    };
                    let value = input.value.clone().or(match input.kind {
                        InputKind::Boolean => Some(PropertyValue::Boolean(false)),
                        InputKind::Number => Some(PropertyValue::Number(0.0)),
                        InputKind::Trigger => None,
                    });
                    let path = format!("@sm/{}/{}", machine.name, input.name);
                    let prop = MemoryProperty::new(&state, path, kind, value, None);
                    inputs.insert((machine.name.clone(), input.name.clone()), prop);
                }
                machines.push(StateMachineInfo {
                    name: machine.name.clone(),
                    inputs: machine
                        .inputs
                        .iter()
                        .map(|input| InputInfo {
                            name: input.name.clone(),
                            kind: input.kind,
                        })
                        .collect(),
                });
            }
            artboards.push(ArtboardInfo {
                name: board.name.clone(),
                animations: board.animations.clone(),
                state_machines: machines,
            });
        }

        Self {
            state,
            definitions,
            enums: snapshot.enums.clone(),
            artboards,
            assets: snapshot.assets.clone(),
            default_instance,
            leaves: builder.leaves,
            inputs,
        }
    }

    /// Parse a JSON snapshot and build a graph from it
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let snapshot: DocumentSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(&snapshot))
    }

    /// Make `accessor` fail on the node at `path`. `*` fails every accessor.
    pub fn inject_fault(&self, path: &str, accessor: &str) {
        self.state
            .faults
            .borrow_mut()
            .insert(fault_key(path, accessor));
    }

    /// Make `accessor` absent on the node at `path`
    pub fn remove_capability(&self, path: &str, accessor: &str) {
        self.state
            .missing
            .borrow_mut()
            .insert(fault_key(path, accessor));
    }

    pub fn clear_faults(&self) {
        self.state.faults.borrow_mut().clear();
        self.state.missing.borrow_mut().clear();
    }

    /// Make top-level definition enumeration fail
    pub fn fail_definitions(&self) {
        self.inject_fault(GRAPH_PATH, "definitions");
    }

    /// Make both property listing strategies fail for an instance
    pub fn fail_listing(&self, instance_path: &str) {
        self.inject_fault(instance_path, "properties");
        self.inject_fault(instance_path, "property_list");
    }

    /// Change a leaf value as the engine would, bypassing faults and the write log
    pub fn set_value(&self, path: &str, value: PropertyValue) -> bool {
        match self.leaves.get(path) {
            Some(prop) => {
                *prop.value.borrow_mut() = Some(value);
                true
            }
            None => false,
        }
    }

    /// Current value of a leaf, bypassing faults
    pub fn value(&self, path: &str) -> Option<PropertyValue> {
        self.leaves
            .get(path)
            .and_then(|prop| prop.value.borrow().clone())
    }

    /// Current value of a state machine input, bypassing faults
    pub fn input_value(&self, state_machine: &str, input: &str) -> Option<PropertyValue> {
        self.inputs
            .get(&(state_machine.to_string(), input.to_string()))
            .and_then(|prop| prop.value.borrow().clone())
    }

    pub fn set_input_value(&self, state_machine: &str, input: &str, value: PropertyValue) -> bool {
        match self
            .inputs
            .get(&(state_machine.to_string(), input.to_string()))
        {
            Some(prop) => {
                *prop.value.borrow_mut() = Some(value);
                true
            }
            None => false,
        }
    }

    /// Number of times a trigger has been fired
    pub fn fire_count(&self, path: &str) -> u32 {
        self.leaves.get(path).map(|prop| prop.fires.get()).unwrap_or(0)
    }

    /// Every mutation applied through live handles, oldest first
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.writes.borrow().clone()
    }

    /// Paths of every leaf property
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.leaves.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Invalidate every handle; subsequent access fails
    pub fn dispose(&self) {
        self.state.disposed.set(true);
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.get()
    }
}

impl LiveGraph for MemoryGraph {
    fn definition_count(&self) -> Access<usize> {
        self.state.check(GRAPH_PATH, "definitions")?;
        Ok(self.definitions.len())
    }

    fn definition_at(&self, index: usize) -> Access<Rc<dyn LiveDefinition>> {
        self.state.check(GRAPH_PATH, "definitions")?;
        self.definitions
            .get(index)
            .map(|def| def.clone() as Rc<dyn LiveDefinition>)
            .ok_or_else(|| AccessError::Failed(format!("definition index {} out of range", index)))
    }

    fn enums(&self) -> Access<Vec<EnumDef>> {
        self.state.check(GRAPH_PATH, "enums")?;
        Ok(self.enums.clone())
    }

    fn artboards(&self) -> Access<Vec<ArtboardInfo>> {
        self.state.check(GRAPH_PATH, "artboards")?;
        Ok(self.artboards.clone())
    }

    fn assets(&self) -> Access<Vec<AssetInfo>> {
        self.state.check(GRAPH_PATH, "assets")?;
        Ok(self.assets.clone())
    }

    fn default_instance(&self) -> Access<Option<Rc<dyn LiveInstance>>> {
        self.state.check(GRAPH_PATH, "default_instance")?;
        Ok(self
            .default_instance
            .clone()
            .map(|instance| instance as Rc<dyn LiveInstance>))
    }

    fn state_machine_input(
        &self,
        state_machine: &str,
        input: &str,
    ) -> Access<Option<Rc<dyn LiveProperty>>> {
        self.state
            .check(&format!("@sm/{}/{}", state_machine, input), "input")?;
        Ok(self
            .inputs
            .get(&(state_machine.to_string(), input.to_string()))
            .map(|prop| prop.clone() as Rc<dyn LiveProperty>))
    }
}
