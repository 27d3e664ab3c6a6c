//! Tests for the binding synchronizer

#![cfg(test)]

use vmscope_shared::{Address, Color, EnumDef, PropertyType, PropertyValue};

use super::{
    BindingState, BindingSynchronizer, ControlSurface, RetainedSurface, TriggerOutcome, WidgetTree,
    WriteError, values_equal,
};
use crate::control::{self, ControlKey};
use crate::enums::EnumResolver;
use crate::introspect::introspect;
use crate::live::memory::{
    DefinitionSnapshot, DocumentSnapshot, InstanceSnapshot, MemoryGraph, PropertySnapshot,
    WriteAction,
};
use crate::session::Generation;

fn document() -> DocumentSnapshot {
    DocumentSnapshot {
        definitions: vec![DefinitionSnapshot::new("Player").with_instance(
            InstanceSnapshot::new("Root")
                .with(PropertySnapshot::number("Volume", 0.5))
                .with(PropertySnapshot::boolean("Muted", false))
                .with(PropertySnapshot::text("Title", "hello"))
                .with(PropertySnapshot::color("Tint", "#112233"))
                .with(PropertySnapshot::enumeration("Mood", "happy", Some("Moods")))
                .with(PropertySnapshot::trigger("Jump")),
        )],
        enums: vec![EnumDef::new("Moods", ["happy", "sad"])],
        ..Default::default()
    }
}

fn key(path: &str) -> ControlKey {
    ControlKey::Property(path.parse::<Address>().unwrap())
}

fn bound(graph: &MemoryGraph) -> BindingSynchronizer<RetainedSurface> {
    let tree = introspect(graph).unwrap();
    let schema = control::build(&tree, graph, &EnumResolver::default(), Generation::default().next());
    let mut sync = BindingSynchronizer::new(schema, RetainedSurface::new());
    sync.attach();
    sync
}

#[test]
fn test_attach_and_detach() {
    let graph = MemoryGraph::from_snapshot(&document());
    let mut sync = bound(&graph);
    assert_eq!(sync.state(), BindingState::Bound);
    assert_eq!(sync.surface().len(), 6);
    assert_eq!(
        sync.surface().rendered_value(&key("Root/Volume")),
        Some(PropertyValue::Number(0.5))
    );

    sync.detach();
    assert_eq!(sync.state(), BindingState::Unbound);
    assert!(sync.surface().is_empty());
    assert_eq!(
        sync.on_user_edit(&key("Root/Volume"), PropertyValue::Number(1.0)),
        Err(WriteError::Unbound)
    );
}

#[test]
fn test_reconcile_converges() {
    let graph = MemoryGraph::from_snapshot(&document());
    let mut sync = bound(&graph);
    let volume = key("Root/Volume");

    // External mutation of a bound number
    assert!(graph.set_value("Root/Volume", PropertyValue::Number(0.8)));

    let first = sync.reconcile();
    assert_eq!(first.updated, 1);
    assert_eq!(sync.surface().rendered_value(&volume), Some(PropertyValue::Number(0.8)));

    let second = sync.reconcile();
    assert_eq!(second.updated, 0);
    assert_eq!(sync.surface().write_count(&volume), 1);
    assert_eq!(sync.surface().total_writes(), 1);
}

#[test]
fn test_reconcile_treats_nan_as_equal() {
    let graph = MemoryGraph::from_snapshot(&document());
    let mut sync = bound(&graph);
    graph.set_value("Root/Volume", PropertyValue::Number(f64::NAN));
    assert_eq!(sync.reconcile().updated, 1);
    assert_eq!(sync.reconcile().updated, 0);
}

#[test]
fn test_reconcile_skips_focused_text_but_not_checkbox() {
    let graph = MemoryGraph::from_snapshot(&document());
    let mut sync = bound(&graph);

    graph.set_value("Root/Title", PropertyValue::String("typed elsewhere".into()));
    sync.surface_mut().set_focus(Some(key("Root/Title")));
    let report = sync.reconcile();
    assert_eq!(report.skipped_focused, 1);
    assert_eq!(
        sync.surface().rendered_value(&key("Root/Title")),
        Some(PropertyValue::String("hello".into()))
    );

    graph.set_value("Root/Muted", PropertyValue::Boolean(true));
    sync.surface_mut().set_focus(Some(key("Root/Muted")));
    sync.reconcile();
    assert_eq!(
        sync.surface().rendered_value(&key("Root/Muted")),
        Some(PropertyValue::Boolean(true))
    );
}

#[test]
fn test_user_edit_writes_live() {
    let graph = MemoryGraph::from_snapshot(&document());
    let mut sync = bound(&graph);

    let outcome = sync
        .on_user_edit(&key("Root/Volume"), PropertyValue::Number(0.1))
        .unwrap();
    assert_eq!(outcome.previous, Some(PropertyValue::Number(0.5)));
    assert_eq!(graph.value("Root/Volume"), Some(PropertyValue::Number(0.1)));

    sync.on_user_edit(&key("Root/Tint"), PropertyValue::Color(Color::new(1, 2, 3, 255)))
        .unwrap();
    sync.on_user_edit(&key("Root/Mood"), PropertyValue::String("sad".into()))
        .unwrap();
    assert_eq!(graph.value("Root/Mood"), Some(PropertyValue::String("sad".into())));

    // A reconcile after our own edits changes nothing
    assert_eq!(sync.reconcile().updated, 0);
}

#[test]
fn test_user_edit_errors() {
    let graph = MemoryGraph::from_snapshot(&document());
    let mut sync = bound(&graph);

    assert!(matches!(
        sync.on_user_edit(&key("Root/Nope"), PropertyValue::Number(1.0)),
        Err(WriteError::UnknownControl(_))
    ));
    assert!(matches!(
        sync.on_user_edit(&key("Root/Volume"), PropertyValue::Boolean(true)),
        Err(WriteError::TypeMismatch { expected: PropertyType::Number, .. })
    ));
    assert!(matches!(
        sync.on_user_edit(&key("Root/Mood"), PropertyValue::String("angry".into())),
        Err(WriteError::NotAChoice { .. })
    ));

    graph.inject_fault("Root/Volume", "write");
    let err = sync
        .on_user_edit(&key("Root/Volume"), PropertyValue::Number(0.9))
        .unwrap_err();
    assert!(matches!(err, WriteError::Rejected { .. }));
    // The failed write leaves the schema usable
    assert_eq!(sync.schema().len(), 6);
    graph.clear_faults();
    assert!(sync.on_user_edit(&key("Root/Volume"), PropertyValue::Number(0.9)).is_ok());
}

#[test]
fn test_placeholder_rejects_edits() {
    let graph = MemoryGraph::from_snapshot(&document());
    graph.inject_fault("Root/Volume", "number");
    let mut sync = bound(&graph);
    assert_eq!(
        sync.on_user_edit(&key("Root/Volume"), PropertyValue::Number(1.0)),
        Err(WriteError::ReadOnly(key("Root/Volume")))
    );
}

#[test]
fn test_trigger_strategies() {
    let graph = MemoryGraph::from_snapshot(&document());
    let mut sync = bound(&graph);
    let jump = key("Root/Jump");

    assert_eq!(sync.fire_trigger(&jump), TriggerOutcome::Fired);
    assert_eq!(graph.fire_count("Root/Jump"), 1);

    graph.remove_capability("Root/Jump", "fire");
    assert_eq!(sync.fire_trigger(&jump), TriggerOutcome::Pulsed);
    sync.revert_pulse(&jump).unwrap();
    let pulses: Vec<_> = graph
        .writes()
        .into_iter()
        .filter_map(|w| match w.action {
            WriteAction::Pulse(active) => Some(active),
            _ => None,
        })
        .collect();
    assert_eq!(pulses, vec![true, false]);

    graph.inject_fault("Root/Jump", "pulse");
    assert!(matches!(sync.fire_trigger(&jump), TriggerOutcome::Failed(_)));
    assert!(matches!(sync.fire_trigger(&key("Root/Volume")), TriggerOutcome::Failed(_)));
}

#[test]
fn test_rebind_discards_old_controls() {
    let graph = MemoryGraph::from_snapshot(&document());
    let mut sync = bound(&graph);
    graph.set_value("Root/Volume", PropertyValue::Number(0.7));
    sync.reconcile();

    let empty = control::ControlSchema::empty(Generation::default().next().next());
    sync.rebind(empty);
    assert_eq!(sync.state(), BindingState::Bound);
    assert!(sync.surface().is_empty());
    assert_eq!(sync.surface().write_count(&key("Root/Volume")), 0);
}

#[test]
fn test_widget_tree_groups_by_address() {
    let graph = MemoryGraph::from_snapshot(&document());
    let sync = bound(&graph);
    let tree = sync.surface().build_tree();
    assert_eq!(tree.len(), 1);
    match &tree[0] {
        WidgetTree::Group { name, children } => {
            assert_eq!(name, "Root");
            assert_eq!(children.len(), 6);
        }
        _ => panic!("Expected group"),
    }
}

#[test]
fn test_value_comparison() {
    let n = PropertyValue::Number;
    assert!(values_equal(PropertyType::Number, &n(f64::NAN), &n(f64::NAN)));
    assert!(!values_equal(PropertyType::Number, &n(1.0), &n(f64::NAN)));
    assert!(values_equal(PropertyType::Boolean, &PropertyValue::Boolean(true), &n(1.0)));
    assert!(values_equal(
        PropertyType::Color,
        &PropertyValue::Color(Color::new(255, 0, 0, 255)),
        &PropertyValue::Color(Color::from_argb(0xffff0000))
    ));
    assert!(!values_equal(
        PropertyType::String,
        &PropertyValue::String("a".into()),
        &PropertyValue::String("b".into())
    ));
}

#[test]
fn test_unbound_triggers_do_not_write() {
    let graph = MemoryGraph::from_snapshot(&document());
    graph.remove_capability("Root/Jump", "fire");
    let mut sync = bound(&graph);
    sync.detach();

    assert_eq!(
        sync.fire_trigger(&key("Root/Jump")),
        TriggerOutcome::Failed(WriteError::Unbound.to_string())
    );
    assert_eq!(sync.revert_pulse(&key("Root/Jump")), Err(WriteError::Unbound));
    assert!(graph.writes().is_empty());

    let generation = sync.generation().next();
    sync.reset(generation);
    assert!(sync.schema().is_empty());
    assert_eq!(sync.generation(), generation);
    assert_eq!(sync.state(), BindingState::Unbound);
}
