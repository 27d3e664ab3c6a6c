//! vmscope core - live view-model inspection
//!
//! This crate turns an animation engine's live view-model graph into a
//! browsable schema and a set of bound, two-way controls.
//!
//! # Architecture
//!
//! - [`live`] - Capability traits over the engine's object graph
//! - [`introspect()`] - Defensive walk producing a [`SchemaTree`]
//! - [`EnumResolver`] - Matches enum properties to enum definitions
//! - [`control::build`] - Schema tree to bound controls
//! - [`BindingSynchronizer`] - Keeps controls and the document in step
//! - [`Inspector`] - Session owning one document generation at a time
//! - [`EventMonitor`] - Throttled event console

pub mod binding;
pub mod config;
pub mod console_sink;
pub mod control;
pub mod enums;
pub mod events;
#[cfg(test)]
mod integration;
pub mod introspect;
pub mod live;
pub mod prefs;
pub mod session;
pub mod throttle;

// Re-export core traits and types
pub use binding::surface::{ControlSurface, RetainedSurface, WidgetKind};
pub use binding::{BindingSynchronizer, WriteError};
pub use config::Config;
pub use console_sink::ConsoleSink;
pub use control::{ControlDescriptor, ControlKey, ControlSchema, EnumSource};
pub use enums::{EnumMatchConfig, EnumResolver};
pub use events::{EventCategory, EventMonitor};
pub use introspect::{IntrospectError, introspect};
pub use live::{Access, AccessError, LiveGraph};
pub use session::{Generation, Inspector};
pub use throttle::{EventThrottle, ThrottleConfig, ThrottleStatus};

pub use vmscope_shared::{Address, PropertyType, PropertyValue, SchemaTree};
