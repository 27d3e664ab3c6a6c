//! Control schema: one bindable control per leaf property and state machine input.
//!
//! The control schema is built from the schema tree, but every live handle is
//! looked up again by name against the live graph. Introspection and binding
//! are separate passes, and the document may have changed in between.
//! Anything that cannot be re-resolved becomes a read-only placeholder that
//! keeps the last known value.

use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use serde::Serialize;
use vmscope_shared::{
    Address, InputKind, InstanceNode, PropertyNode, PropertyType, PropertyValue, SchemaNode,
    SchemaTree,
};

use crate::enums::EnumResolver;
use crate::live::{LiveGraph, LiveInstance, LiveProperty, typed_accessor};
use crate::session::Generation;

/// Where an enum control's choices came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "name", rename_all = "camelCase")]
pub enum EnumSource {
    /// Not an enum control
    NotEnum,
    /// Choices taken from the named enum definition
    Resolved(String),
    /// No definition matched; the UI shows "no values available"
    Unavailable,
}

/// Identity of a control within one schema generation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKey {
    Property(Address),
    Input { state_machine: String, input: String },
}

impl ControlKey {
    pub fn input(state_machine: impl Into<String>, input: impl Into<String>) -> Self {
        ControlKey::Input {
            state_machine: state_machine.into(),
            input: input.into(),
        }
    }
}

impl From<Address> for ControlKey {
    fn from(address: Address) -> Self {
        ControlKey::Property(address)
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlKey::Property(address) => write!(f, "{}", address),
            ControlKey::Input {
                state_machine,
                input,
            } => write!(f, "@{}/{}", state_machine, input),
        }
    }
}

/// Control bound to a leaf property
pub struct ControlNode {
    pub address: Address,
    pub declared_type: PropertyType,
    pub current_value: Option<PropertyValue>,
    /// `None` marks a placeholder
    pub live_ref: Option<Rc<dyn LiveProperty>>,
    pub enum_choices: Vec<String>,
    pub enum_source: EnumSource,
    pub error: Option<String>,
}

impl ControlNode {
    pub fn is_placeholder(&self) -> bool {
        self.live_ref.is_none()
    }
}

impl fmt::Debug for ControlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlNode")
            .field("address", &self.address)
            .field("declared_type", &self.declared_type)
            .field("current_value", &self.current_value)
            .field("bound", &self.live_ref.is_some())
            .field("enum_source", &self.enum_source)
            .field("error", &self.error)
            .finish()
    }
}

/// Control bound to a state machine input
pub struct InputControl {
    pub state_machine: String,
    pub input: String,
    pub kind: InputKind,
    pub current_value: Option<PropertyValue>,
    pub live_ref: Option<Rc<dyn LiveProperty>>,
    pub error: Option<String>,
}

impl fmt::Debug for InputControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputControl")
            .field("state_machine", &self.state_machine)
            .field("input", &self.input)
            .field("kind", &self.kind)
            .field("current_value", &self.current_value)
            .field("bound", &self.live_ref.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// What the rendering layer receives for one control
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlDescriptor {
    pub key: ControlKey,
    pub label: String,
    pub declared_type: PropertyType,
    pub current_value: Option<PropertyValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_choices: Vec<String>,
    pub enum_source: EnumSource,
    pub read_only: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Property(usize),
    Input(usize),
}

/// Borrowed view of the bits of a control the synchronizer needs
pub(crate) struct Binding<'a> {
    pub declared_type: PropertyType,
    pub live_ref: Option<&'a Rc<dyn LiveProperty>>,
    pub current_value: Option<&'a PropertyValue>,
}

/// All controls of one schema generation
#[derive(Debug)]
pub struct ControlSchema {
    generation: Generation,
    controls: Vec<ControlNode>,
    inputs: Vec<InputControl>,
    index: HashMap<ControlKey, Slot>,
}

impl ControlSchema {
    fn new(generation: Generation, controls: Vec<ControlNode>, inputs: Vec<InputControl>) -> Self {
        let mut index = HashMap::with_capacity(controls.len() + inputs.len());
        for (i, control) in controls.iter().enumerate() {
            index.insert(ControlKey::Property(control.address.clone()), Slot::Property(i));
        }
        for (i, input) in inputs.iter().enumerate() {
            index
                .entry(ControlKey::input(&input.state_machine, &input.input))
                .or_insert(Slot::Input(i));
        }
        Self {
            generation,
            controls,
            inputs,
            index,
        }
    }

    /// Empty schema, used before the first document is loaded
    pub fn empty(generation: Generation) -> Self {
        Self::new(generation, Vec::new(), Vec::new())
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn controls(&self) -> &[ControlNode] {
        &self.controls
    }

    pub fn inputs(&self) -> &[InputControl] {
        &self.inputs
    }

    pub fn len(&self) -> usize {
        self.controls.len() + self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn control(&self, address: &Address) -> Option<&ControlNode> {
        match self.index.get(&ControlKey::Property(address.clone()))? {
            Slot::Property(i) => self.controls.get(*i),
            Slot::Input(_) => None,
        }
    }

    pub fn input(&self, state_machine: &str, input: &str) -> Option<&InputControl> {
        match self.index.get(&ControlKey::input(state_machine, input))? {
            Slot::Input(i) => self.inputs.get(*i),
            Slot::Property(_) => None,
        }
    }

    /// Keys of every control, properties first, in build order
    pub fn keys(&self) -> Vec<ControlKey> {
        self.controls
            .iter()
            .map(|c| ControlKey::Property(c.address.clone()))
            .chain(
                self.inputs
                    .iter()
                    .map(|i| ControlKey::input(&i.state_machine, &i.input)),
            )
            .collect()
    }

    pub fn contains(&self, key: &ControlKey) -> bool {
        self.index.contains_key(key)
    }

    pub(crate) fn binding(&self, key: &ControlKey) -> Option<Binding<'_>> {
        match *self.index.get(key)? {
            Slot::Property(i) => {
                let control = &self.controls[i];
                Some(Binding {
                    declared_type: control.declared_type,
                    live_ref: control.live_ref.as_ref(),
                    current_value: control.current_value.as_ref(),
                })
            }
            Slot::Input(i) => {
                let input = &self.inputs[i];
                Some(Binding {
                    declared_type: input.kind.property_type(),
                    live_ref: input.live_ref.as_ref(),
                    current_value: input.current_value.as_ref(),
                })
            }
        }
    }

    /// Only the current value of a control changes after the build
    pub(crate) fn set_current_value(&mut self, key: &ControlKey, value: Option<PropertyValue>) {
        match self.index.get(key) {
            Some(Slot::Property(i)) => self.controls[*i].current_value = value,
            Some(Slot::Input(i)) => self.inputs[*i].current_value = value,
            None => {}
        }
    }

    pub fn descriptor(&self, key: &ControlKey) -> Option<ControlDescriptor> {
        match *self.index.get(key)? {
            Slot::Property(i) => {
                let control = &self.controls[i];
                Some(ControlDescriptor {
                    key: key.clone(),
                    label: control.address.leaf().to_string(),
                    declared_type: control.declared_type,
                    current_value: control.current_value.clone(),
                    enum_choices: control.enum_choices.clone(),
                    enum_source: control.enum_source.clone(),
                    read_only: control.is_placeholder(),
                    error: control.error.clone(),
                })
            }
            Slot::Input(i) => {
                let input = &self.inputs[i];
                Some(ControlDescriptor {
                    key: key.clone(),
                    label: input.input.clone(),
                    declared_type: input.kind.property_type(),
                    current_value: input.current_value.clone(),
                    enum_choices: Vec::new(),
                    enum_source: EnumSource::NotEnum,
                    read_only: input.live_ref.is_none(),
                    error: input.error.clone(),
                })
            }
        }
    }

    pub fn descriptors(&self) -> Vec<ControlDescriptor> {
        self.keys()
            .iter()
            .filter_map(|key| self.descriptor(key))
            .collect()
    }

    /// Number of read-only placeholder controls
    pub fn placeholder_count(&self) -> usize {
        self.controls.iter().filter(|c| c.is_placeholder()).count()
            + self.inputs.iter().filter(|i| i.live_ref.is_none()).count()
    }
}

/// Build the control schema for `tree`, re-resolving every handle in `graph`
pub fn build(
    tree: &SchemaTree,
    graph: &dyn LiveGraph,
    resolver: &EnumResolver,
    generation: Generation,
) -> ControlSchema {
    let mut builder = Builder {
        tree,
        resolver,
        controls: Vec::new(),
    };

    for def in &tree.definitions {
        for instance in &def.instances {
            let live = resolve_top_level(graph, instance);
            builder.collect(instance, live);
        }
    }

    let inputs = build_inputs(tree, graph);
    let schema = ControlSchema::new(generation, builder.controls, inputs);
    tracing::info!(
        "Built control schema (generation {}): {} controls, {} inputs, {} placeholders",
        generation,
        schema.controls.len(),
        schema.inputs.len(),
        schema.placeholder_count()
    );
    schema
}

type LiveLookup = Result<Rc<dyn LiveInstance>, String>;

fn describe_missing(what: &str, name: &str) -> String {
    format!("{} `{}` no longer exists", what, name)
}

/// Definition by name, then instance by index (checked against its name),
/// falling back to instance by name
fn resolve_top_level(graph: &dyn LiveGraph, node: &InstanceNode) -> LiveLookup {
    let def_name = node
        .definition_name
        .as_deref()
        .ok_or_else(|| "instance has no definition".to_string())?;
    let def = graph
        .definition_by_name(def_name)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| describe_missing("definition", def_name))?;

    if let Some(index) = node.index {
        if let Ok(instance) = def.instance_at(index) {
            if instance.name().is_ok_and(|name| name == node.instance_name) {
                return Ok(instance);
            }
        }
    }

    if node.instance_name.is_empty() {
        return Err(describe_missing("instance", &node.address.to_string()));
    }
    def.instance_by_name(&node.instance_name)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| describe_missing("instance", &node.instance_name))
}

struct Builder<'a> {
    tree: &'a SchemaTree,
    resolver: &'a EnumResolver,
    controls: Vec<ControlNode>,
}

impl Builder<'_> {
    fn collect(&mut self, node: &InstanceNode, live: LiveLookup) {
        let live = match (&node.parse_error, live) {
            (Some(error), _) => Err(error.clone()),
            (None, live) => live,
        };

        for child in &node.children {
            match child {
                SchemaNode::Instance(inner) => {
                    let property = inner
                        .property_name
                        .as_deref()
                        .unwrap_or_else(|| inner.address.leaf());
                    let nested = match &live {
                        Ok(instance) => match instance.instance(property) {
                            Ok(Some(nested)) => Ok(nested),
                            Ok(None) => Err(describe_missing("nested instance", property)),
                            Err(err) => Err(err.to_string()),
                        },
                        Err(reason) => Err(reason.clone()),
                    };
                    self.collect(inner, nested);
                }
                SchemaNode::Property(prop) => {
                    let control = self.property_control(prop, &live);
                    self.controls.push(control);
                }
            }
        }
    }

    fn property_control(&self, prop: &PropertyNode, live: &LiveLookup) -> ControlNode {
        let mut control = ControlNode {
            address: prop.address.clone(),
            declared_type: prop.declared_type,
            current_value: prop.value.clone(),
            live_ref: None,
            enum_choices: Vec::new(),
            enum_source: if prop.declared_type == PropertyType::Enum {
                EnumSource::Unavailable
            } else {
                EnumSource::NotEnum
            },
            error: prop.access_error.clone(),
        };

        if prop.declared_type == PropertyType::Unsupported {
            if control.error.is_none() {
                control.error = Some("unsupported property type".to_string());
            }
            return control;
        }

        if control.error.is_none() {
            match live {
                Ok(instance) => match lookup_property(instance.as_ref(), prop) {
                    Ok(handle) => control.live_ref = Some(handle),
                    Err(reason) => control.error = Some(reason),
                },
                Err(reason) => control.error = Some(reason.clone()),
            }
        }

        if let Some(handle) = &control.live_ref {
            if prop.declared_type != PropertyType::Trigger {
                if let Ok(Some(value)) = handle.value() {
                    if value.matches(prop.declared_type) {
                        control.current_value = Some(value);
                    }
                }
            }
        } else if let Some(reason) = &control.error {
            tracing::debug!("control: `{}` is a placeholder: {}", prop.address, reason);
        }

        if prop.declared_type == PropertyType::Enum {
            self.resolve_enum(&mut control, prop);
        }

        control
    }

    fn resolve_enum(&self, control: &mut ControlNode, prop: &PropertyNode) {
        let mut candidates: Vec<String> = Vec::new();
        if let Some(handle) = &control.live_ref {
            if let Ok(Some(type_name)) = handle.enum_type() {
                candidates.push(type_name);
            }
        }
        candidates.extend(prop.enum_type_candidates.iter().cloned());
        candidates.push(prop.name.clone());
        candidates.dedup();

        match self.resolver.resolve(&candidates, &self.tree.enums) {
            Some(def) => {
                control.enum_source = EnumSource::Resolved(def.name.clone());
                control.enum_choices = def.values.clone();
            }
            None => {
                tracing::debug!(
                    "control: no enum definition for `{}` (candidates {:?})",
                    prop.address,
                    candidates
                );
                control.enum_source = EnumSource::Unavailable;
            }
        }
    }
}

/// Look a property up by name and kind. Enum properties fall back to the
/// string accessor, as introspection does.
fn lookup_property(instance: &dyn LiveInstance, prop: &PropertyNode) -> Result<Rc<dyn LiveProperty>, String> {
    let reason = match typed_accessor(instance, prop.declared_type, &prop.name) {
        Ok(Some(handle)) => return Ok(handle),
        Ok(None) => describe_missing("property", &prop.name),
        Err(err) => err.to_string(),
    };
    if prop.declared_type == PropertyType::Enum {
        if let Ok(Some(handle)) = instance.string(&prop.name) {
            return Ok(handle);
        }
    }
    Err(reason)
}

fn build_inputs(tree: &SchemaTree, graph: &dyn LiveGraph) -> Vec<InputControl> {
    let mut inputs: Vec<InputControl> = Vec::new();
    for artboard in &tree.artboards {
        for machine in &artboard.state_machines {
            for info in &machine.inputs {
                if inputs
                    .iter()
                    .any(|i| i.state_machine == machine.name && i.input == info.name)
                {
                    tracing::debug!(
                        "control: duplicate input `{}/{}` on artboard `{}` skipped",
                        machine.name,
                        info.name,
                        artboard.name
                    );
                    continue;
                }

                let mut control = InputControl {
                    state_machine: machine.name.clone(),
                    input: info.name.clone(),
                    kind: info.kind,
                    current_value: None,
                    live_ref: None,
                    error: None,
                };
                match graph.state_machine_input(&machine.name, &info.name) {
                    Ok(Some(handle)) => {
                        if info.kind != InputKind::Trigger {
                            control.current_value = handle.value().ok().flatten();
                        }
                        control.live_ref = Some(handle);
                    }
                    Ok(None) => control.error = Some(describe_missing("input", &info.name)),
                    Err(err) => control.error = Some(err.to_string()),
                }
                inputs.push(control);
            }
        }
    }
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::introspect;
    use crate::live::memory::{
        ArtboardSnapshot, DefinitionSnapshot, DocumentSnapshot, InputSnapshot, InstanceSnapshot,
        MemoryGraph, PropertySnapshot, StateMachineSnapshot,
    };
    use vmscope_shared::EnumDef;

    fn document() -> DocumentSnapshot {
        DocumentSnapshot {
            definitions: vec![DefinitionSnapshot::new("Face").with_instance(
                InstanceSnapshot::new("Main")
                    .with(PropertySnapshot::number("Size", 2.0))
                    .with(PropertySnapshot::enumeration("CTRL>Eye Picker", "blue", None))
                    .with(PropertySnapshot::enumeration("Hat", "cap", Some("Headwear")))
                    .with(PropertySnapshot::enumeration("Mystery", "x", None))
                    .with(PropertySnapshot::list("Items"))
                    .with(PropertySnapshot::view_model(
                        "Mouth",
                        InstanceSnapshot::new("Mouth").with(PropertySnapshot::boolean("Open", true)),
                    )),
            )],
            enums: vec![
                EnumDef::new("EyeColor", ["blue", "green"]),
                EnumDef::new("HairColor", ["red", "black"]),
                EnumDef::new("Headwear", ["cap", "crown"]),
            ],
            artboards: vec![ArtboardSnapshot {
                name: "Board".into(),
                animations: vec![],
                state_machines: vec![StateMachineSnapshot {
                    name: "SM".into(),
                    inputs: vec![
                        InputSnapshot {
                            name: "speed".into(),
                            kind: InputKind::Number,
                            value: Some(PropertyValue::Number(4.0)),
                        },
                        InputSnapshot {
                            name: "go".into(),
                            kind: InputKind::Trigger,
                            value: None,
                        },
                    ],
                }],
            }],
            ..Default::default()
        }
    }

    fn addr(path: &str) -> Address {
        path.parse().unwrap()
    }

    fn build_for(graph: &MemoryGraph) -> ControlSchema {
        let tree = introspect(graph).unwrap();
        build(&tree, graph, &EnumResolver::default(), Generation::default().next())
    }

    #[test]
    fn test_controls_bound_by_name() {
        let graph = MemoryGraph::from_snapshot(&document());
        let schema = build_for(&graph);

        let size = schema.control(&addr("Main/Size")).unwrap();
        assert!(!size.is_placeholder());
        assert_eq!(size.current_value, Some(PropertyValue::Number(2.0)));

        let open = schema.control(&addr("Main/Mouth/Open")).unwrap();
        assert!(!open.is_placeholder());

        let items = schema.control(&addr("Main/Items")).unwrap();
        assert!(items.is_placeholder());
        assert!(items.error.is_some());
    }

    #[test]
    fn test_enum_resolution() {
        let graph = MemoryGraph::from_snapshot(&document());
        let schema = build_for(&graph);

        // Property name is the last candidate
        let eye = schema.control(&addr("Main/CTRL>Eye Picker")).unwrap();
        assert_eq!(eye.enum_source, EnumSource::Resolved("EyeColor".into()));
        assert_eq!(eye.enum_choices, vec!["blue".to_string(), "green".to_string()]);

        let hat = schema.control(&addr("Main/Hat")).unwrap();
        assert_eq!(hat.enum_source, EnumSource::Resolved("Headwear".into()));

        let mystery = schema.control(&addr("Main/Mystery")).unwrap();
        assert_eq!(mystery.enum_source, EnumSource::Unavailable);
        assert!(mystery.enum_choices.is_empty());
        // Still writable, only the choices are unknown
        assert!(!mystery.is_placeholder());
    }

    #[test]
    fn test_vanished_instance_yields_placeholders() {
        let graph = MemoryGraph::from_snapshot(&document());
        let tree = introspect(&graph).unwrap();

        // The live graph changes between introspection and build
        let mut doc = document();
        doc.definitions[0].instances[0].name = "Renamed".into();
        let changed = MemoryGraph::from_snapshot(&doc);
        let schema = build(&tree, &changed, &EnumResolver::default(), Generation::default());

        let size = schema.control(&addr("Main/Size")).unwrap();
        assert!(size.is_placeholder());
        assert_eq!(size.current_value, Some(PropertyValue::Number(2.0)));
        assert!(size.error.as_deref().unwrap().contains("Main"));
        assert!(schema.descriptor(&addr("Main/Size").into()).unwrap().read_only);
    }

    #[test]
    fn test_failed_lookup_yields_placeholder() {
        let graph = MemoryGraph::from_snapshot(&document());
        let tree = introspect(&graph).unwrap();
        graph.inject_fault("Main/Size", "number");
        let schema = build(&tree, &graph, &EnumResolver::default(), Generation::default());
        let size = schema.control(&addr("Main/Size")).unwrap();
        assert!(size.is_placeholder());
        // Siblings are still bound
        assert!(!schema.control(&addr("Main/Hat")).unwrap().is_placeholder());
    }

    #[test]
    fn test_input_controls() {
        let graph = MemoryGraph::from_snapshot(&document());
        let schema = build_for(&graph);
        assert_eq!(schema.inputs().len(), 2);

        let speed = schema.input("SM", "speed").unwrap();
        assert_eq!(speed.current_value, Some(PropertyValue::Number(4.0)));
        let go = schema.descriptor(&ControlKey::input("SM", "go")).unwrap();
        assert_eq!(go.declared_type, PropertyType::Trigger);
        assert!(!go.read_only);
        assert_eq!(ControlKey::input("SM", "go").to_string(), "@SM/go");
    }

    #[test]
    fn test_descriptors_cover_every_control() {
        let graph = MemoryGraph::from_snapshot(&document());
        let schema = build_for(&graph);
        let descriptors = schema.descriptors();
        assert_eq!(descriptors.len(), schema.len());
        assert_eq!(descriptors[0].label, "Size");
        let json = serde_json::to_value(&descriptors[0]).unwrap();
        assert_eq!(json["declaredType"], "number");
        assert_eq!(json["enumSource"]["source"], "notEnum");
    }

    #[test]
    fn test_nested_instance_with_duplicate_name_is_bound() {
        let doc = DocumentSnapshot {
            definitions: vec![DefinitionSnapshot::new("Face").with_instance(
                InstanceSnapshot::new("Main")
                    .with(PropertySnapshot::number("Mouth", 1.0))
                    .with(PropertySnapshot::view_model(
                        "Mouth",
                        InstanceSnapshot::new("Lips").with(PropertySnapshot::boolean("Open", true)),
                    )),
            )],
            ..Default::default()
        };
        let graph = MemoryGraph::from_snapshot(&doc);
        let schema = build_for(&graph);

        assert!(!schema.control(&addr("Main/Mouth")).unwrap().is_placeholder());
        let open = schema.control(&addr("Main/Mouth#1/Open")).unwrap();
        assert!(!open.is_placeholder(), "{:?}", open.error);
        assert_eq!(open.current_value, Some(PropertyValue::Boolean(true)));
    }
}
