//! Rendering surface abstraction and the retained in-memory surface.

use hashbrown::HashMap;
use vmscope_shared::{PropertyType, PropertyValue};

use crate::control::{ControlDescriptor, ControlKey, EnumSource};

/// Widget used to present a control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Checkbox,
    Number,
    Text,
    Color,
    Select,
    /// Enum control with no known choices ("no values available")
    NoChoices,
    Button,
    ReadOnly,
}

impl WidgetKind {
    pub fn for_descriptor(descriptor: &ControlDescriptor) -> Self {
        if descriptor.read_only {
            return WidgetKind::ReadOnly;
        }
        match descriptor.declared_type {
            PropertyType::Boolean => WidgetKind::Checkbox,
            PropertyType::Number => WidgetKind::Number,
            PropertyType::String => WidgetKind::Text,
            PropertyType::Color => WidgetKind::Color,
            PropertyType::Enum => match descriptor.enum_source {
                EnumSource::Resolved(_) if !descriptor.enum_choices.is_empty() => WidgetKind::Select,
                _ => WidgetKind::NoChoices,
            },
            PropertyType::Trigger => WidgetKind::Button,
            PropertyType::Unsupported => WidgetKind::ReadOnly,
        }
    }

    /// Discrete widgets can be overwritten while focused without fighting the user
    pub fn is_discrete(self) -> bool {
        matches!(self, WidgetKind::Checkbox | WidgetKind::Select)
    }
}

/// Where controls are rendered.
///
/// The synchronizer mounts one widget per control descriptor and pushes
/// live values through [`render_value`](ControlSurface::render_value).
pub trait ControlSurface {
    fn mount(&mut self, descriptor: &ControlDescriptor);

    fn unmount_all(&mut self);

    /// Value the widget currently shows
    fn rendered_value(&self, key: &ControlKey) -> Option<PropertyValue>;

    fn render_value(&mut self, key: &ControlKey, value: &PropertyValue);

    /// Control holding input focus, if any
    fn focused(&self) -> Option<ControlKey>;
}

/// Widget state kept by [`RetainedSurface`]
#[derive(Debug, Clone)]
pub struct RetainedWidget {
    pub descriptor: ControlDescriptor,
    pub kind: WidgetKind,
    pub value: Option<PropertyValue>,
    /// Number of values pushed by the synchronizer since mounting
    pub writes: u32,
}

/// Tree node for grouped display
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetTree {
    Group {
        name: String,
        children: Vec<WidgetTree>,
    },
    /// Index into [`RetainedSurface::widgets`]
    Widget(usize),
}

fn insert_into_tree(nodes: &mut Vec<WidgetTree>, path: &[String], widget: usize) {
    match path {
        [] => {}
        [_leaf] => nodes.push(WidgetTree::Widget(widget)),
        [group, rest @ ..] => {
            let existing = nodes
                .iter()
                .position(|n| matches!(n, WidgetTree::Group { name, .. } if name == group));
            match existing {
                Some(idx) => {
                    if let WidgetTree::Group { children, .. } = &mut nodes[idx] {
                        insert_into_tree(children, rest, widget);
                    }
                }
                None => {
                    let mut children = Vec::new();
                    insert_into_tree(&mut children, rest, widget);
                    nodes.push(WidgetTree::Group {
                        name: group.clone(),
                        children,
                    });
                }
            }
        }
    }
}

/// Surface that keeps widget state in memory and counts value writes
#[derive(Debug, Default)]
pub struct RetainedSurface {
    widgets: Vec<RetainedWidget>,
    index: HashMap<ControlKey, usize>,
    focus: Option<ControlKey>,
    /// Bumped whenever the set of mounted widgets changes
    layout: u64,
}

impl RetainedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn widgets(&self) -> &[RetainedWidget] {
        &self.widgets
    }

    pub fn widget(&self, key: &ControlKey) -> Option<&RetainedWidget> {
        self.index.get(key).map(|&i| &self.widgets[i])
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Changes whenever widgets are mounted or unmounted
    pub fn layout_version(&self) -> u64 {
        self.layout
    }

    /// Values pushed into a widget since it was mounted
    pub fn write_count(&self, key: &ControlKey) -> u32 {
        self.widget(key).map(|w| w.writes).unwrap_or(0)
    }

    pub fn total_writes(&self) -> u32 {
        self.widgets.iter().map(|w| w.writes).sum()
    }

    pub fn set_focus(&mut self, key: Option<ControlKey>) {
        self.focus = key;
    }

    /// Record a value typed by the user; not counted as a write
    pub fn user_input(&mut self, key: &ControlKey, value: PropertyValue) {
        if let Some(&i) = self.index.get(key) {
            self.widgets[i].value = Some(value);
        }
    }

    /// Group widgets by address for display. State machine inputs are
    /// grouped under their machine.
    pub fn build_tree(&self) -> Vec<WidgetTree> {
        let mut roots = Vec::new();
        for (i, widget) in self.widgets.iter().enumerate() {
            let path: Vec<String> = match &widget.descriptor.key {
                ControlKey::Property(address) => address.segments().to_vec(),
                ControlKey::Input {
                    state_machine,
                    input,
                } => vec![format!("@{}", state_machine), input.clone()],
            };
            insert_into_tree(&mut roots, &path, i);
        }
        roots
    }
}

impl ControlSurface for RetainedSurface {
    fn mount(&mut self, descriptor: &ControlDescriptor) {
        let widget = RetainedWidget {
            descriptor: descriptor.clone(),
            kind: WidgetKind::for_descriptor(descriptor),
            value: descriptor.current_value.clone(),
            writes: 0,
        };
        match self.index.get(&descriptor.key) {
            Some(&i) => self.widgets[i] = widget,
            None => {
                self.index.insert(descriptor.key.clone(), self.widgets.len());
                self.widgets.push(widget);
                self.layout += 1;
            }
        }
    }

    fn unmount_all(&mut self) {
        self.widgets.clear();
        self.index.clear();
        self.focus = None;
        self.layout += 1;
    }

    fn rendered_value(&self, key: &ControlKey) -> Option<PropertyValue> {
        self.widget(key).and_then(|w| w.value.clone())
    }

    fn render_value(&mut self, key: &ControlKey, value: &PropertyValue) {
        if let Some(&i) = self.index.get(key) {
            let widget = &mut self.widgets[i];
            widget.value = Some(value.clone());
            widget.writes += 1;
        }
    }

    fn focused(&self) -> Option<ControlKey> {
        self.focus.clone()
    }
}
