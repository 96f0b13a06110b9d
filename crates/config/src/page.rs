//! Pages, key definitions and the underlay/own/overlay composer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AttributeCollection, Config};

/// One configured action or display directive.
///
/// `kind` is the registry type name (`type` on disk) and is resolved at
/// dispatch time; an unknown name is a configuration error, not a panic.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DynamicElement {
    /// Registry type name; empty means "nothing".
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Only fire for long presses (actions only).
    #[serde(default)]
    pub long_press: bool,
    /// Handler attributes.
    #[serde(default)]
    pub attributes: AttributeCollection,
}

impl DynamicElement {
    /// Construct an element of `kind` with the given attributes.
    pub fn new(kind: impl Into<String>, attributes: AttributeCollection) -> Self {
        Self {
            kind: kind.into(),
            long_press: false,
            attributes,
        }
    }

    /// Mark this element as a long-press action.
    pub fn long(mut self) -> Self {
        self.long_press = true;
        self
    }

    /// True when no type is configured.
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty()
    }
}

/// Which key transition fires a key's actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyTrigger {
    /// Fire on release; press duration selects long/short actions.
    #[default]
    Up,
    /// Fire immediately on press; only short-press actions run.
    Down,
}

/// Behavior of one physical key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeyDefinition {
    /// Visual shown on the key. An empty type keeps the key blank.
    #[serde(default)]
    pub display: DynamicElement,
    /// Actions run when the key fires, in order.
    #[serde(default)]
    pub actions: Vec<DynamicElement>,
    /// Transition that fires the actions.
    #[serde(default)]
    pub on: KeyTrigger,
}

/// A named set of key definitions, optionally layered over/under other pages.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Page {
    /// Key definitions by physical key index.
    #[serde(default)]
    pub keys: BTreeMap<usize, KeyDefinition>,
    /// Page whose keys are drawn on top of this page's keys.
    #[serde(default)]
    pub overlay: Option<String>,
    /// Page whose keys show through where this page defines nothing.
    #[serde(default)]
    pub underlay: Option<String>,
}

impl Page {
    /// Resolve the layered page into one flat key map.
    ///
    /// Sources are applied in order underlay, own keys, overlay; later sources
    /// win. Keys with an empty display type never overwrite an earlier entry.
    /// Overlay and underlay pages contribute only their own `keys` (layers do
    /// not compose recursively), and a name that does not resolve contributes
    /// nothing.
    pub fn key_definitions(&self, cfg: &Config) -> BTreeMap<usize, KeyDefinition> {
        let layer = |name: &Option<String>| {
            name.as_deref()
                .filter(|n| !n.is_empty())
                .and_then(|n| cfg.pages.get(n))
                .map(|p| &p.keys)
        };

        let mut sources: Vec<&BTreeMap<usize, KeyDefinition>> = Vec::with_capacity(3);
        sources.extend(layer(&self.underlay));
        sources.push(&self.keys);
        sources.extend(layer(&self.overlay));

        let mut result = BTreeMap::new();
        for source in sources {
            for (idx, kd) in source {
                if kd.display.is_empty() {
                    continue;
                }
                result.insert(*idx, kd.clone());
            }
        }
        result
    }
}
