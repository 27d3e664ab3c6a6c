//! Control panel UI
//!
//! Draws a [`RetainedSurface`] with egui and reports what the user did.
//! The panel never touches the live document; the caller feeds the returned
//! edits to the synchronizer.

use hashbrown::HashSet;
use vmscope_shared::{Color, PropertyValue};

use super::surface::{RetainedSurface, RetainedWidget, WidgetKind, WidgetTree};
use super::display_value;
use crate::control::ControlKey;

/// Something the user did in the panel
#[derive(Debug, Clone, PartialEq)]
pub enum UserEdit {
    Set { key: ControlKey, value: PropertyValue },
    Fire(ControlKey),
}

/// Everything the panel reports for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelOutput {
    pub edits: Vec<UserEdit>,
    /// Control with keyboard focus after this frame
    pub focused: Option<ControlKey>,
}

/// Control panel state
pub struct ControlPanel {
    /// Whether the panel is visible
    pub visible: bool,
    /// Set of collapsed group paths
    collapsed_groups: HashSet<String>,
    /// Cached grouping of the surface's widgets
    tree_cache: Option<Vec<WidgetTree>>,
    /// Surface layout the cache was built for
    cached_layout: Option<u64>,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPanel {
    pub fn new() -> Self {
        Self {
            visible: true,
            collapsed_groups: HashSet::new(),
            tree_cache: None,
            cached_layout: None,
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    /// Mark the grouping as stale (call after the controls are rebound)
    pub fn invalidate_tree(&mut self) {
        self.tree_cache = None;
        self.cached_layout = None;
    }

    /// Render the panel as a window
    pub fn render(&mut self, ctx: &egui::Context, surface: &RetainedSurface) -> PanelOutput {
        let mut output = PanelOutput::default();
        if !self.visible {
            return output;
        }

        egui::Window::new("View Models")
            .id(egui::Id::new("vmscope_control_window"))
            .default_pos([10.0, 10.0])
            .default_size([340.0, 420.0])
            .resizable(true)
            .collapsible(true)
            .show(ctx, |ui| {
                self.render_ui(ui, surface, &mut output);
            });

        output
    }

    /// Render the control tree into an existing `Ui`
    pub fn render_ui(&mut self, ui: &mut egui::Ui, surface: &RetainedSurface, output: &mut PanelOutput) {
        if surface.is_empty() {
            ui.weak("No controls");
            return;
        }

        let layout = surface.layout_version();
        if self.tree_cache.is_none() || self.cached_layout != Some(layout) {
            self.tree_cache = Some(surface.build_tree());
            self.cached_layout = Some(layout);
        }

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                // Clone to avoid borrowing self while rendering groups
                if let Some(tree) = self.tree_cache.clone() {
                    self.render_tree(ui, &tree, surface, "", output);
                }
            });
    }

    fn render_tree(
        &mut self,
        ui: &mut egui::Ui,
        nodes: &[WidgetTree],
        surface: &RetainedSurface,
        parent_path: &str,
        output: &mut PanelOutput,
    ) {
        for node in nodes {
            match node {
                WidgetTree::Group { name, children } => {
                    let path = if parent_path.is_empty() {
                        name.clone()
                    } else {
                        format!("{}/{}", parent_path, name)
                    };

                    let is_collapsed = self.collapsed_groups.contains(&path);
                    let header = egui::CollapsingHeader::new(name.as_str())
                        .id_salt(&path)
                        .default_open(!is_collapsed)
                        .show(ui, |ui| {
                            self.render_tree(ui, children, surface, &path, output);
                        });

                    if header.header_response.clicked() {
                        if is_collapsed {
                            self.collapsed_groups.remove(&path);
                        } else {
                            self.collapsed_groups.insert(path);
                        }
                    }
                }
                WidgetTree::Widget(idx) => {
                    if let Some(widget) = surface.widgets().get(*idx) {
                        render_widget(ui, widget, output);
                    }
                }
            }
        }
    }
}

fn set(output: &mut PanelOutput, widget: &RetainedWidget, value: PropertyValue) {
    output.edits.push(UserEdit::Set {
        key: widget.descriptor.key.clone(),
        value,
    });
}

fn track_focus(output: &mut PanelOutput, widget: &RetainedWidget, response: &egui::Response) {
    if response.has_focus() {
        output.focused = Some(widget.descriptor.key.clone());
    }
}

/// Render a widget for a single control
fn render_widget(ui: &mut egui::Ui, widget: &RetainedWidget, output: &mut PanelOutput) {
    let label = widget.descriptor.label.as_str();
    let current = widget.value.as_ref();

    match widget.kind {
        WidgetKind::Checkbox => {
            let mut v = current.and_then(PropertyValue::as_bool).unwrap_or(false);
            let response = ui.checkbox(&mut v, label);
            track_focus(output, widget, &response);
            if response.changed() {
                set(output, widget, PropertyValue::Boolean(v));
            }
        }
        WidgetKind::Number => {
            let mut v = current.and_then(PropertyValue::as_f64).unwrap_or(0.0);
            let before = v;
            let response = ui
                .horizontal(|ui| {
                    ui.label(label);
                    ui.add(egui::DragValue::new(&mut v).speed(0.1))
                })
                .inner;
            track_focus(output, widget, &response);
            if v != before && !(v.is_nan() && before.is_nan()) {
                set(output, widget, PropertyValue::Number(v));
            }
        }
        WidgetKind::Text => {
            let mut text = current.and_then(PropertyValue::as_str).unwrap_or_default().to_string();
            let response = ui
                .horizontal(|ui| {
                    ui.label(label);
                    ui.text_edit_singleline(&mut text)
                })
                .inner;
            track_focus(output, widget, &response);
            if response.changed() {
                set(output, widget, PropertyValue::String(text));
            }
        }
        WidgetKind::Color => {
            let c = current.and_then(PropertyValue::as_color).unwrap_or(Color::new(0, 0, 0, 255));
            let mut color = egui::Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a);
            let response = ui
                .horizontal(|ui| {
                    ui.label(label);
                    egui::color_picker::color_edit_button_srgba(
                        ui,
                        &mut color,
                        egui::color_picker::Alpha::OnlyBlend,
                    )
                })
                .inner;
            track_focus(output, widget, &response);
            if response.changed() {
                let [r, g, b, a] = color.to_srgba_unmultiplied();
                set(output, widget, PropertyValue::Color(Color::new(r, g, b, a)));
            }
        }
        WidgetKind::Select => {
            let selected = current.and_then(PropertyValue::as_str).unwrap_or_default().to_string();
            let mut choice = selected.clone();
            ui.horizontal(|ui| {
                ui.label(label);
                egui::ComboBox::from_id_salt(widget.descriptor.key.to_string())
                    .selected_text(selected.as_str())
                    .show_ui(ui, |ui| {
                        for option in &widget.descriptor.enum_choices {
                            ui.selectable_value(&mut choice, option.clone(), option.as_str());
                        }
                    });
            });
            if choice != selected {
                set(output, widget, PropertyValue::String(choice));
            }
        }
        WidgetKind::NoChoices => {
            ui.horizontal(|ui| {
                ui.label(label);
                ui.weak("no values available");
            });
        }
        WidgetKind::Button => {
            if ui.button(label).clicked() {
                output.edits.push(UserEdit::Fire(widget.descriptor.key.clone()));
            }
        }
        WidgetKind::ReadOnly => {
            let shown = current.map(display_value).unwrap_or_else(|| "-".to_string());
            let response = ui.weak(format!("{}: {}", label, shown));
            if let Some(error) = &widget.descriptor.error {
                response.on_hover_text(error.as_str());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ControlSurface;
    use crate::control::{ControlDescriptor, EnumSource};
    use vmscope_shared::{Address, PropertyType};

    fn descriptor(path: &str, ty: PropertyType, value: Option<PropertyValue>) -> ControlDescriptor {
        ControlDescriptor {
            key: ControlKey::Property(path.parse::<Address>().unwrap()),
            label: path.rsplit('/').next().unwrap().to_string(),
            declared_type: ty,
            current_value: value,
            enum_choices: Vec::new(),
            enum_source: EnumSource::NotEnum,
            read_only: false,
            error: None,
        }
    }

    #[test]
    fn test_idle_frame_reports_nothing() {
        let mut surface = RetainedSurface::new();
        surface.mount(&descriptor("Root/Volume", PropertyType::Number, Some(PropertyValue::Number(0.5))));
        surface.mount(&descriptor("Root/Eyes/Open", PropertyType::Boolean, Some(PropertyValue::Boolean(true))));
        surface.mount(&descriptor("Root/Jump", PropertyType::Trigger, None));

        let mut panel = ControlPanel::new();
        let ctx = egui::Context::default();
        let mut output = PanelOutput::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            output = panel.render(ctx, &surface);
        });
        assert!(output.edits.is_empty());
        assert!(output.focused.is_none());
    }

    #[test]
    fn test_hidden_panel_renders_nothing() {
        let surface = RetainedSurface::new();
        let mut panel = ControlPanel::new();
        panel.toggle();
        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            assert_eq!(panel.render(ctx, &surface), PanelOutput::default());
        });
    }

    fn group_names(panel: &ControlPanel) -> Vec<String> {
        panel
            .tree_cache
            .iter()
            .flatten()
            .filter_map(|node| match node {
                WidgetTree::Group { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_regrouped_after_remount_with_same_count() {
        let mut surface = RetainedSurface::new();
        surface.mount(&descriptor("Old/Volume", PropertyType::Number, Some(PropertyValue::Number(0.5))));
        surface.mount(&descriptor("Old/Muted", PropertyType::Boolean, Some(PropertyValue::Boolean(false))));

        let mut panel = ControlPanel::new();
        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            panel.render(ctx, &surface);
        });
        assert_eq!(group_names(&panel), vec!["Old".to_string()]);

        surface.unmount_all();
        surface.mount(&descriptor("New/Volume", PropertyType::Number, Some(PropertyValue::Number(0.5))));
        surface.mount(&descriptor("New/Muted", PropertyType::Boolean, Some(PropertyValue::Boolean(false))));
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            panel.render(ctx, &surface);
        });
        assert_eq!(group_names(&panel), vec!["New".to_string()]);
    }
}
