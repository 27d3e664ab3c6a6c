//! Defensive introspection of a live document into a [`SchemaTree`].
//!
//! The walk is depth-first: definitions, their instances, each instance's
//! properties, and nested instances behind view-model properties. Every
//! accessor call has its own failure boundary. A failing node is recorded in
//! place (`parse_error` / `access_error`) and its siblings are still walked.
//! Only a failure to enumerate the top-level definitions aborts the walk.


use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use vmscope_shared::{
    AccessAttempt, Address, AttemptOutcome, DefinitionNode, InstanceNode, PropertyNode,
    PropertyType, PropertyValue, SchemaNode, SchemaTree,
};

use crate::live::{
    AccessError, LiveGraph, LiveInstance, LiveProperty, PropertyInfo, PropertyKind,
    typed_accessor,
};

/// Maximum nesting of view-model instances before the walk stops descending
pub const MAX_DEPTH: usize = 32;

/// Introspection failure that leaves nothing to walk
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntrospectError {
    /// The top-level definition enumeration itself is inaccessible
    #[error("document structure is unavailable: {0}")]
    StructuralUnavailable(AccessError),
}

/// Walk `graph` into a plain-data schema tree
pub fn introspect(graph: &dyn LiveGraph) -> Result<SchemaTree, IntrospectError> {
    let count = graph
        .definition_count()
        .map_err(IntrospectError::StructuralUnavailable)?;

    let mut tree = SchemaTree::default();

    // Enumerate everything first so top-level address segments can be
    // disambiguated before any node is built
    let mut entries: Vec<TopLevel> = Vec::new();
    let mut definitions: Vec<DefinitionNode> = Vec::with_capacity(count);
    for def_index in 0..count {
        let (def_node, mut found) = enumerate_definition(graph, def_index, definitions.len());
        definitions.push(def_node);
        entries.append(&mut found);
    }

    let segments = assign_segments(&entries);
    for (entry, segment) in entries.into_iter().zip(segments) {
        // assign_segments never yields an empty segment
        let Ok(address) = Address::root(segment) else {
            continue;
        };
        let mut node = match entry.instance {
            Ok(instance) => walk_instance(instance.as_ref(), address, entry.name, 0),
            Err(message) => placeholder_instance(address, entry.name, message),
        };
        let def = &mut definitions[entry.def_slot];
        node.definition_name = Some(def.name.clone());
        node.index = Some(entry.index);
        def.instances.push(node);
    }
    tree.definitions = definitions;

    match graph.enums() {
        Ok(enums) => tree.enums = enums,
        Err(err) => {
            tracing::debug!("introspect: enumerations unavailable: {}", err);
            tree.enums_error = Some(err.to_string());
        }
    }
    match graph.artboards() {
        Ok(artboards) => tree.artboards = artboards,
        Err(err) => {
            tracing::debug!("introspect: artboards unavailable: {}", err);
            tree.artboards_error = Some(err.to_string());
        }
    }
    match graph.assets() {
        Ok(assets) => tree.assets = assets,
        Err(err) => {
            tracing::debug!("introspect: assets unavailable: {}", err);
            tree.assets_error = Some(err.to_string());
        }
    }

    tree.default_instance = choose_default_instance(graph, &tree);

    let stats = tree.stats();
    tracing::info!(
        "Introspected {} definitions: {} instances, {} properties, {} errors",
        tree.definitions.len(),
        stats.instances,
        stats.properties,
        stats.errors
    );

    Ok(tree)
}

/// A top-level instance discovered during enumeration
struct TopLevel {
    def_slot: usize,
    def_name: String,
    index: usize,
    name: String,
    instance: Result<Rc<dyn LiveInstance>, String>,
}

fn enumerate_definition(
    graph: &dyn LiveGraph,
    def_index: usize,
    def_slot: usize,
) -> (DefinitionNode, Vec<TopLevel>) {
    let fallback_name = format!("#{}", def_index);
    let def = match graph.definition_at(def_index) {
        Ok(def) => def,
        Err(err) => {
            tracing::debug!("introspect: definition {} unavailable: {}", def_index, err);
            return (
                DefinitionNode {
                    name: fallback_name,
                    instances: Vec::new(),
                    parse_error: Some(err.to_string()),
                },
                Vec::new(),
            );
        }
    };

    let mut errors = Vec::new();
    let name = match def.name() {
        Ok(name) if !name.is_empty() => name,
        Ok(_) => fallback_name,
        Err(err) => {
            errors.push(format!("name: {}", err));
            fallback_name
        }
    };

    let mut found = Vec::new();
    match def.instance_count() {
        Ok(count) => {
            for index in 0..count {
                let (instance_name, instance) = match def.instance_at(index) {
                    Ok(instance) => {
                        let instance_name = instance.name().unwrap_or_default();
                        (instance_name, Ok(instance))
                    }
                    Err(err) => (String::new(), Err(err.to_string())),
                };
                found.push(TopLevel {
                    def_slot,
                    def_name: name.clone(),
                    index,
                    name: instance_name,
                    instance,
                });
            }
        }
        Err(err) => errors.push(format!("instances: {}", err)),
    }

    let parse_error = if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    };
    if let Some(message) = &parse_error {
        tracing::debug!("introspect: definition `{}` degraded: {}", name, message);
    }

    (
        DefinitionNode {
            name,
            instances: Vec::new(),
            parse_error,
        },
        found,
    )
}

/// Address segments for top-level instances.
///
/// The instance name is used as-is; unnamed instances become
/// `Definition#index`. Names claimed by more than one instance are qualified
/// as `Definition.name`, and suffixed with `#index` if that still collides.
fn assign_segments(entries: &[TopLevel]) -> Vec<String> {
    let base: Vec<String> = entries
        .iter()
        .map(|e| {
            if e.name.is_empty() {
                format!("{}#{}", e.def_name, e.index)
            } else {
                e.name.clone()
            }
        })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for segment in &base {
        *counts.entry(segment.as_str()).or_default() += 1;
    }

    let qualified: Vec<String> = entries
        .iter()
        .zip(&base)
        .map(|(e, segment)| {
            if counts[segment.as_str()] > 1 {
                format!("{}.{}", e.def_name, segment)
            } else {
                segment.clone()
            }
        })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for segment in &qualified {
        *counts.entry(segment.as_str()).or_default() += 1;
    }

    entries
        .iter()
        .zip(&qualified)
        .map(|(e, segment)| {
            if counts[segment.as_str()] > 1 {
                format!("{}#{}", segment, e.index)
            } else {
                segment.clone()
            }
        })
        .collect()
}

fn placeholder_instance(address: Address, instance_name: String, message: String) -> InstanceNode {
    tracing::debug!("introspect: instance `{}` unreadable: {}", address, message);
    InstanceNode {
        address,
        instance_name,
        declared_type_name: None,
        definition_name: None,
        index: None,
        property_name: None,
        children: Vec::new(),
        parse_error: Some(message),
    }
}

/// Read the property listing, trying the direct collection first
fn list_properties(instance: &dyn LiveInstance) -> Result<Vec<PropertyInfo>, String> {
    let direct = match instance.properties() {
        Ok(list) => return Ok(list),
        Err(err) => err,
    };
    match instance.property_list() {
        Ok(list) => Ok(list),
        Err(call) => Err(format!(
            "property listing unavailable (collection: {}; accessor: {})",
            direct, call
        )),
    }
}

fn walk_instance(
    instance: &dyn LiveInstance,
    address: Address,
    instance_name: String,
    depth: usize,
) -> InstanceNode {
    let declared_type_name = instance.type_name().unwrap_or_default();

    let listing = match list_properties(instance) {
        Ok(listing) => listing,
        Err(message) => {
            let mut node = placeholder_instance(address, instance_name, message);
            node.declared_type_name = declared_type_name;
            return node;
        }
    };

    let mut used: HashSet<String> = HashSet::with_capacity(listing.len());
    let mut children = Vec::with_capacity(listing.len());
    for (position, info) in listing.iter().enumerate() {
        let mut segment = if info.name.is_empty() {
            format!("#{}", position)
        } else {
            info.name.clone()
        };
        if used.contains(&segment) {
            segment = format!("{}#{}", segment, position);
        }
        used.insert(segment.clone());

        let child_address = match address.child(segment) {
            Ok(child) => child,
            // Segment is never empty here
            Err(_) => continue,
        };

        let child = if info.name.is_empty() {
            SchemaNode::Property(PropertyNode {
                address: child_address,
                name: String::new(),
                declared_type: info.kind.leaf_type().unwrap_or(PropertyType::Unsupported),
                value: None,
                enum_type_candidates: Vec::new(),
                access_error: Some("property has no name".to_string()),
                attempts: Vec::new(),
            })
        } else {
            walk_property(instance, child_address, info, depth)
        };
        children.push(child);
    }

    InstanceNode {
        address,
        instance_name,
        declared_type_name,
        definition_name: None,
        index: None,
        property_name: None,
        children,
        parse_error: None,
    }
}

fn walk_property(
    instance: &dyn LiveInstance,
    address: Address,
    info: &PropertyInfo,
    depth: usize,
) -> SchemaNode {
    match &info.kind {
        PropertyKind::Instance => SchemaNode::Instance(walk_nested(instance, address, info, depth)),
        kind => match kind.leaf_type() {
            Some(PropertyType::Enum) => SchemaNode::Property(read_enum(instance, address, &info.name)),
            Some(ty) => SchemaNode::Property(read_leaf(instance, address, &info.name, ty)),
            None => {
                let message = format!("unsupported property kind `{}`", kind.name());
                SchemaNode::Property(PropertyNode {
                    address,
                    name: info.name.clone(),
                    declared_type: PropertyType::Unsupported,
                    value: None,
                    enum_type_candidates: Vec::new(),
                    access_error: Some(message),
                    attempts: Vec::new(),
                })
            }
        },
    }
}

fn walk_nested(
    instance: &dyn LiveInstance,
    address: Address,
    info: &PropertyInfo,
    depth: usize,
) -> InstanceNode {
    if depth + 1 >= MAX_DEPTH {
        let mut node = placeholder_instance(
            address,
            info.name.clone(),
            format!("maximum nesting depth of {} exceeded", MAX_DEPTH),
        );
        node.property_name = Some(info.name.clone());
        return node;
    }
    let mut node = match instance.instance(&info.name) {
        Ok(Some(inner)) => {
            let inner_name = match inner.name() {
                Ok(name) if !name.is_empty() => name,
                _ => info.name.clone(),
            };
            walk_instance(inner.as_ref(), address, inner_name, depth + 1)
        }
        Ok(None) => placeholder_instance(
            address,
            info.name.clone(),
            "nested instance is not set".to_string(),
        ),
        Err(err) => placeholder_instance(address, info.name.clone(), err.to_string()),
    };
    node.property_name = Some(info.name.clone());
    node
}

fn leaf_node(address: Address, name: &str, declared_type: PropertyType) -> PropertyNode {
    PropertyNode {
        address,
        name: name.to_string(),
        declared_type,
        value: None,
        enum_type_candidates: Vec::new(),
        access_error: None,
        attempts: Vec::new(),
    }
}

/// Read a value and check it against the declared type
fn read_value(prop: &dyn LiveProperty, ty: PropertyType) -> Result<Option<PropertyValue>, String> {
    match prop.value() {
        Ok(Some(value)) if value.matches(ty) => Ok(Some(value)),
        Ok(Some(value)) => Err(format!("malformed {} value: {:?}", ty, value)),
        Ok(None) => Ok(None),
        Err(err) => Err(err.to_string()),
    }
}

fn read_leaf(instance: &dyn LiveInstance, address: Address, name: &str, ty: PropertyType) -> PropertyNode {
    let mut node = leaf_node(address, name, ty);
    match typed_accessor(instance, ty, name) {
        Ok(Some(_)) if ty == PropertyType::Trigger => {}
        Ok(Some(prop)) => match read_value(prop.as_ref(), ty) {
            Ok(value) => node.value = value,
            Err(message) => node.access_error = Some(message),
        },
        Ok(None) => node.access_error = Some(format!("{} accessor returned nothing", ty)),
        Err(err) => node.access_error = Some(err.to_string()),
    }
    if let Some(message) = &node.access_error {
        tracing::debug!("introspect: property `{}` unreadable: {}", node.address, message);
    }
    node
}

fn failed_attempt(strategy: &str, err: &AccessError) -> AccessAttempt {
    AccessAttempt {
        strategy: strategy.to_string(),
        outcome: match err {
            AccessError::Missing(_) => AttemptOutcome::Missing,
            AccessError::Failed(message) => AttemptOutcome::Failed(message.clone()),
        },
    }
}

fn describe(attempt: &AccessAttempt) -> String {
    match &attempt.outcome {
        AttemptOutcome::Ok => format!("{} accessor succeeded", attempt.strategy),
        AttemptOutcome::Missing => format!("{} accessor unavailable", attempt.strategy),
        AttemptOutcome::Failed(message) => format!("{} accessor failed: {}", attempt.strategy, message),
    }
}

/// Enum properties go through the enum accessor first, then fall back to
/// reading the value as a plain string. Every attempt is recorded.
fn read_enum(instance: &dyn LiveInstance, address: Address, name: &str) -> PropertyNode {
    let mut node = leaf_node(address, name, PropertyType::Enum);

    match instance.enumeration(name) {
        Ok(Some(prop)) => {
            if let Ok(Some(type_name)) = prop.enum_type() {
                if !type_name.is_empty() {
                    node.enum_type_candidates.push(type_name);
                }
            }
            match read_value(prop.as_ref(), PropertyType::Enum) {
                Ok(value) => {
                    node.value = value;
                    return node;
                }
                Err(message) => node.attempts.push(AccessAttempt {
                    strategy: "enum".to_string(),
                    outcome: AttemptOutcome::Failed(message),
                }),
            }
        }
        Ok(None) => node.attempts.push(AccessAttempt {
            strategy: "enum".to_string(),
            outcome: AttemptOutcome::Failed("accessor returned nothing".to_string()),
        }),
        Err(err) => node.attempts.push(failed_attempt("enum", &err)),
    }

    match instance.string(name) {
        Ok(Some(prop)) => match read_value(prop.as_ref(), PropertyType::String) {
            Ok(value) => {
                node.value = value;
                node.attempts.push(AccessAttempt {
                    strategy: "string".to_string(),
                    outcome: AttemptOutcome::Ok,
                });
            }
            Err(message) => node.attempts.push(AccessAttempt {
                strategy: "string".to_string(),
                outcome: AttemptOutcome::Failed(message),
            }),
        },
        Ok(None) => node.attempts.push(AccessAttempt {
            strategy: "string".to_string(),
            outcome: AttemptOutcome::Failed("accessor returned nothing".to_string()),
        }),
        Err(err) => node.attempts.push(failed_attempt("string", &err)),
    }

    let succeeded = node
        .attempts
        .last()
        .is_some_and(|attempt| attempt.outcome == AttemptOutcome::Ok);
    if !succeeded {
        let message = node.attempts.iter().map(describe).collect::<Vec<_>>().join("; ");
        tracing::debug!("introspect: enum `{}` unreadable: {}", node.address, message);
        node.access_error = Some(message);
    }
    node
}

/// Engine-bound default instance, else the first named instance, else none
fn choose_default_instance(graph: &dyn LiveGraph, tree: &SchemaTree) -> Option<Address> {
    let top_level = || tree.definitions.iter().flat_map(|def| def.instances.iter());

    match graph.default_instance() {
        Ok(Some(instance)) => {
            if let Ok(name) = instance.name() {
                if let Some(node) = top_level().find(|node| !name.is_empty() && node.instance_name == name) {
                    return Some(node.address.clone());
                }
            }
        }
        Ok(None) => {}
        Err(err) => tracing::debug!("introspect: default instance unavailable: {}", err),
    }

    top_level()
        .find(|node| !node.instance_name.is_empty())
        .map(|node| node.address.clone())
}
