//! Shared plain-data types for vmscope.
//!
//! Everything in this crate is serializable and free of references to a live
//! document, so it can cross process or UI boundaries unchanged.
//!
//! - [`Address`] - hierarchical path identifying a node within one session
//! - [`SchemaTree`] - result of introspecting a live document

pub mod address;
pub mod schema;

pub use address::{Address, AddressError};
pub use schema::{
    AccessAttempt, ArtboardInfo, AssetInfo, AttemptOutcome, Color, DefinitionNode, EnumDef,
    InputInfo, InputKind, InstanceNode, NodeRef, PropertyNode, PropertyType, PropertyValue,
    SchemaNode, SchemaStats, SchemaTree, StateMachineInfo,
};
