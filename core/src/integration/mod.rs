//! Integration tests for the vmscope core
//!
//! Drive a whole inspector session against in-memory documents: load,
//! bind, reconcile, edit, rebuild, and event ingestion.


#[cfg(test)]
pub(crate) mod test_utils {
    use std::rc::Rc;

    use vmscope_shared::{Address, EnumDef, InputKind, PropertyValue};

    use crate::binding::surface::RetainedSurface;
    use crate::config::Config;
    use crate::control::ControlKey;
    use crate::enums::EnumResolver;
    use crate::live::memory::{
        ArtboardSnapshot, DefinitionSnapshot, DocumentSnapshot, InputSnapshot, InstanceSnapshot,
        MemoryGraph, PropertySnapshot, StateMachineSnapshot,
    };
    use crate::session::Inspector;

    /// A character rig: nested view models, an enum with a decorated name,
    /// and a state machine with inputs
    pub fn character_document() -> DocumentSnapshot {
        DocumentSnapshot {
            definitions: vec![
                DefinitionSnapshot::new("Character").with_instance(
                    InstanceSnapshot::new("Root")
                        .typed("Character")
                        .with(PropertySnapshot::number("Volume", 0.5))
                        .with(PropertySnapshot::boolean("Visible", true))
                        .with(PropertySnapshot::text("Title", "Hero"))
                        .with(PropertySnapshot::enumeration("CTRL>Eye Picker", "blue", None))
                        .with(PropertySnapshot::trigger("Blink"))
                        .with(PropertySnapshot::view_model(
                            "Hair",
                            InstanceSnapshot::new("Hair")
                                .typed("HairStyle")
                                .with(PropertySnapshot::color("Tint", "#aa5500"))
                                .with(PropertySnapshot::number("Length", 12.0)),
                        )),
                ),
                DefinitionSnapshot::new("Scene")
                    .with_instance(InstanceSnapshot::new("Backdrop").with(PropertySnapshot::number("Fog", 0.1))),
            ],
            enums: vec![
                EnumDef::new("EyeColor", ["blue", "green", "brown"]),
                EnumDef::new("HairColor", ["black", "red"]),
            ],
            artboards: vec![ArtboardSnapshot {
                name: "Main".into(),
                animations: vec!["idle".into()],
                state_machines: vec![StateMachineSnapshot {
                    name: "Face".into(),
                    inputs: vec![
                        InputSnapshot {
                            name: "Smile".into(),
                            kind: InputKind::Boolean,
                            value: Some(PropertyValue::Boolean(false)),
                        },
                        InputSnapshot {
                            name: "Wink".into(),
                            kind: InputKind::Trigger,
                            value: None,
                        },
                    ],
                }],
            }],
            default_instance: Some("Root".into()),
            ..Default::default()
        }
    }

    pub fn graph() -> Rc<MemoryGraph> {
        Rc::new(MemoryGraph::from_snapshot(&character_document()))
    }

    pub fn key(path: &str) -> ControlKey {
        ControlKey::Property(path.parse::<Address>().unwrap())
    }

    pub fn inspector() -> Inspector<RetainedSurface> {
        let config = Config::default();
        Inspector::new(
            RetainedSurface::new(),
            &config.inspector,
            EnumResolver::new(config.enum_matching.clone()),
        )
    }
}
