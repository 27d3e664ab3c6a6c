//! Two-way binding between the control schema and the live document.
//!
//! User edits are written straight to the live handle of the control.
//! Live values flow back through [`BindingSynchronizer::reconcile`], which
//! the session runs on a fixed cadence because the engine offers no
//! per-property change notification.

pub mod panel;
pub mod surface;
mod tests;

use std::time::Duration;

use vmscope_shared::{PropertyType, PropertyValue};

use crate::control::{ControlKey, ControlSchema, EnumSource};
use crate::session::Generation;

pub use surface::{ControlSurface, RetainedSurface, RetainedWidget, WidgetKind, WidgetTree};

/// How long a pulsed trigger stays active before it is reverted
pub const PULSE_DURATION: Duration = Duration::from_millis(100);

/// Failure of a user edit. The schema and reconciliation are unaffected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WriteError {
    #[error("no control `{0}`")]
    UnknownControl(ControlKey),

    #[error("control `{0}` is read-only")]
    ReadOnly(ControlKey),

    #[error("control `{key}` expects a {expected} value")]
    TypeMismatch {
        key: ControlKey,
        expected: PropertyType,
    },

    #[error("`{value}` is not one of the choices for `{key}`")]
    NotAChoice { key: ControlKey, value: String },

    #[error("write to `{key}` was rejected: {reason}")]
    Rejected { key: ControlKey, reason: String },

    #[error("controls are not attached")]
    Unbound,
}

/// Result of a successful edit
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub key: ControlKey,
    pub previous: Option<PropertyValue>,
    pub value: PropertyValue,
}

/// Which trigger strategy worked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Fired,
    /// Pulse set; it must be reverted after [`PULSE_DURATION`]
    Pulsed,
    Failed(String),
}

/// Counts from one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    pub updated: usize,
    pub skipped_focused: usize,
    pub unreadable: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Unbound,
    Bound,
}

/// Display string used to compare string-like values
pub fn display_value(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Boolean(v) => v.to_string(),
        PropertyValue::Number(v) => v.to_string(),
        PropertyValue::String(v) => v.clone(),
        PropertyValue::Color(c) => c.to_hex(),
    }
}

fn as_bool(value: &PropertyValue) -> bool {
    match value {
        PropertyValue::Boolean(v) => *v,
        PropertyValue::Number(v) => *v != 0.0 && !v.is_nan(),
        PropertyValue::String(v) => !v.is_empty() && v != "false" && v != "0",
        PropertyValue::Color(_) => true,
    }
}

fn as_number(value: &PropertyValue) -> f64 {
    match value {
        PropertyValue::Number(v) => *v,
        PropertyValue::Boolean(v) => f64::from(u8::from(*v)),
        PropertyValue::String(v) => v.trim().parse().unwrap_or(f64::NAN),
        PropertyValue::Color(c) => f64::from(c.to_argb()),
    }
}

/// Equality as the reconciler sees it for a control of type `ty`
pub fn values_equal(ty: PropertyType, a: &PropertyValue, b: &PropertyValue) -> bool {
    match ty {
        PropertyType::Boolean => as_bool(a) == as_bool(b),
        PropertyType::Number => {
            let (a, b) = (as_number(a), as_number(b));
            (a.is_nan() && b.is_nan()) || a == b
        }
        _ => display_value(a) == display_value(b),
    }
}

/// Owns one control schema and the surface it is rendered on
pub struct BindingSynchronizer<S: ControlSurface> {
    schema: ControlSchema,
    surface: S,
    state: BindingState,
}

impl<S: ControlSurface> BindingSynchronizer<S> {
    pub fn new(schema: ControlSchema, surface: S) -> Self {
        Self {
            schema,
            surface,
            state: BindingState::Unbound,
        }
    }

    pub fn schema(&self) -> &ControlSchema {
        &self.schema
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.schema.generation()
    }

    /// Mount one widget per control
    pub fn attach(&mut self) {
        self.surface.unmount_all();
        for descriptor in self.schema.descriptors() {
            self.surface.mount(&descriptor);
        }
        self.state = BindingState::Bound;
        tracing::debug!(
            "binding: attached {} controls (generation {})",
            self.schema.len(),
            self.schema.generation()
        );
    }

    pub fn detach(&mut self) {
        self.surface.unmount_all();
        self.state = BindingState::Unbound;
    }

    /// Unmount and drop every control, releasing the live handles
    pub fn reset(&mut self, generation: Generation) {
        self.detach();
        self.schema = ControlSchema::empty(generation);
    }

    /// Discard the current controls and bind a new schema
    pub fn rebind(&mut self, schema: ControlSchema) {
        self.detach();
        self.schema = schema;
        self.attach();
    }

    /// Write a user edit to the live property
    pub fn on_user_edit(&mut self, key: &ControlKey, value: PropertyValue) -> Result<EditOutcome, WriteError> {
        if self.state == BindingState::Unbound {
            return Err(WriteError::Unbound);
        }
        let binding = self
            .schema
            .binding(key)
            .ok_or_else(|| WriteError::UnknownControl(key.clone()))?;

        let live = binding
            .live_ref
            .cloned()
            .ok_or_else(|| WriteError::ReadOnly(key.clone()))?;
        if binding.declared_type == PropertyType::Trigger || !value.matches(binding.declared_type) {
            return Err(WriteError::TypeMismatch {
                key: key.clone(),
                expected: binding.declared_type,
            });
        }
        let previous = binding.current_value.cloned();

        if let Some(descriptor) = self.schema.descriptor(key) {
            if let (EnumSource::Resolved(_), Some(choice)) = (&descriptor.enum_source, value.as_str()) {
                if !descriptor.enum_choices.iter().any(|c| c == choice) {
                    return Err(WriteError::NotAChoice {
                        key: key.clone(),
                        value: choice.to_string(),
                    });
                }
            }
        }

        if let Err(err) = live.set_value(&value) {
            tracing::warn!("binding: write to `{}` failed: {}", key, err);
            return Err(WriteError::Rejected {
                key: key.clone(),
                reason: err.to_string(),
            });
        }

        self.schema.set_current_value(key, Some(value.clone()));
        let shown = self.surface.rendered_value(key);
        if shown.is_none_or(|shown| !values_equal(binding_type(&self.schema, key), &shown, &value)) {
            self.surface.render_value(key, &value);
        }
        tracing::debug!("binding: wrote {:?} to `{}`", value, key);

        Ok(EditOutcome {
            key: key.clone(),
            previous,
            value,
        })
    }

    /// Fire a trigger, falling back to a pulse
    pub fn fire_trigger(&mut self, key: &ControlKey) -> TriggerOutcome {
        if self.state == BindingState::Unbound {
            return TriggerOutcome::Failed(WriteError::Unbound.to_string());
        }
        let Some(binding) = self.schema.binding(key) else {
            return TriggerOutcome::Failed(format!("no control `{}`", key));
        };
        if binding.declared_type != PropertyType::Trigger {
            return TriggerOutcome::Failed(format!("`{}` is not a trigger", key));
        }
        let Some(live) = binding.live_ref else {
            return TriggerOutcome::Failed(format!("control `{}` is read-only", key));
        };

        let fire_error = match live.fire() {
            Ok(()) => return TriggerOutcome::Fired,
            Err(err) => err,
        };
        match live.pulse(true) {
            Ok(()) => TriggerOutcome::Pulsed,
            Err(pulse_error) => {
                let reason = format!("fire: {}; pulse: {}", fire_error, pulse_error);
                tracing::warn!("binding: trigger `{}` failed: {}", key, reason);
                TriggerOutcome::Failed(reason)
            }
        }
    }

    /// Reset a pulsed trigger
    pub fn revert_pulse(&mut self, key: &ControlKey) -> Result<(), WriteError> {
        if self.state == BindingState::Unbound {
            return Err(WriteError::Unbound);
        }
        let binding = self
            .schema
            .binding(key)
            .ok_or_else(|| WriteError::UnknownControl(key.clone()))?;
        let live = binding.live_ref.ok_or_else(|| WriteError::ReadOnly(key.clone()))?;
        live.pulse(false).map_err(|err| WriteError::Rejected {
            key: key.clone(),
            reason: err.to_string(),
        })
    }

    /// Pull live values into the rendered controls, writing only on difference
    pub fn reconcile(&mut self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        if self.state == BindingState::Unbound {
            return report;
        }
        let focused = self.surface.focused();

        for key in self.schema.keys() {
            let Some(binding) = self.schema.binding(&key) else {
                continue;
            };
            let ty = binding.declared_type;
            let Some(live) = binding.live_ref.cloned() else {
                continue;
            };
            if ty == PropertyType::Trigger {
                continue;
            }

            if focused.as_ref() == Some(&key) {
                let discrete = self
                    .schema
                    .descriptor(&key)
                    .is_some_and(|d| WidgetKind::for_descriptor(&d).is_discrete());
                if !discrete {
                    report.skipped_focused += 1;
                    continue;
                }
            }

            report.checked += 1;
            let value = match live.value() {
                Ok(Some(value)) if value.matches(ty) => value,
                Ok(_) => continue,
                Err(err) => {
                    tracing::trace!("binding: `{}` unreadable: {}", key, err);
                    report.unreadable += 1;
                    continue;
                }
            };

            let differs = |shown: Option<&PropertyValue>| shown.is_none_or(|shown| !values_equal(ty, shown, &value));
            if differs(binding.current_value) {
                self.schema.set_current_value(&key, Some(value.clone()));
            }
            if differs(self.surface.rendered_value(&key).as_ref()) {
                self.surface.render_value(&key, &value);
                report.updated += 1;
            }
        }

        if report.updated > 0 {
            tracing::trace!("binding: reconcile updated {} controls", report.updated);
        }
        report
    }
}

fn binding_type(schema: &ControlSchema, key: &ControlKey) -> PropertyType {
    schema
        .binding(key)
        .map(|b| b.declared_type)
        .unwrap_or(PropertyType::Unsupported)
}
