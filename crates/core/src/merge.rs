//! Attribute merging across the root-to-leaf ancestor chain
//!
//! Each tree node carries only its own overlays; the effective context
//! for a test case is a pure fold over the chain, applied in
//! root-to-leaf order. Removal is expressed with tombstones so that an
//! explicitly deleted entry is distinct from one that was never set.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::SpecError;

/// The fixed parameter categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamKind {
    Path,
    Header,
    Query,
    Body,
    Form,
}

impl ParamKind {
    pub const ALL: [ParamKind; 5] = [
        ParamKind::Path,
        ParamKind::Header,
        ParamKind::Query,
        ParamKind::Body,
        ParamKind::Form,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Path => "path",
            ParamKind::Header => "header",
            ParamKind::Query => "query",
            ParamKind::Body => "body",
            ParamKind::Form => "form",
        }
    }
}

/// One parameter entry in a node-local overlay: a concrete value, or a
/// tombstone deleting the inherited key from this level on.
#[derive(Clone, Debug)]
pub enum ParamEntry {
    Value(Value),
    Removed,
}

/// A node-local overlay for one parameter category.
///
/// `cleared` is the category-level tombstone: it resets the inherited
/// accumulator at this level. Entries added at this level (or deeper)
/// are applied after the reset, so they are not suppressed by it.
#[derive(Clone, Debug, Default)]
pub struct ParamOverlay {
    pub cleared: bool,
    pub entries: BTreeMap<String, ParamEntry>,
}

impl ParamOverlay {
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.entries.is_empty()
    }
}

/// All node-local parameter overlays, keyed by category.
pub type ParamLayer = BTreeMap<ParamKind, ParamOverlay>;

/// Effective, fully merged parameters: tombstones resolved, values only.
pub type EffectiveParams = BTreeMap<ParamKind, BTreeMap<String, Value>>;

/// Merge parameter layers in root-to-leaf order into effective values.
pub fn merge_params<'a>(layers: impl IntoIterator<Item = &'a ParamLayer>) -> EffectiveParams {
    let mut acc: EffectiveParams = BTreeMap::new();
    for layer in layers {
        for (kind, overlay) in layer {
            let category = acc.entry(*kind).or_default();
            if overlay.cleared {
                category.clear();
            }
            for (key, entry) in &overlay.entries {
                match entry {
                    ParamEntry::Value(value) => {
                        category.insert(key.clone(), value.clone());
                    }
                    ParamEntry::Removed => {
                        category.remove(key);
                    }
                }
            }
        }
    }
    acc.retain(|_, category| !category.is_empty());
    acc
}

/// Shallow key-wise union of auth scheme maps; the descendant's value
/// replaces the ancestor's for the same scheme type name.
pub fn merge_schemes<'a>(
    layers: impl IntoIterator<Item = &'a BTreeMap<String, Value>>,
) -> BTreeMap<String, Value> {
    let mut acc = BTreeMap::new();
    for layer in layers {
        for (name, config) in layer {
            acc.insert(name.clone(), config.clone());
        }
    }
    acc
}

/// Validate a bulk parameter object and turn it into overlay entries.
pub fn bulk_entries(kind: ParamKind, bulk: Value) -> Result<Vec<(String, ParamEntry)>, SpecError> {
    match bulk {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| (key, ParamEntry::Value(value)))
            .collect()),
        other => Err(SpecError::InvalidParams(format!(
            "{} parameters must be given as a JSON object, got {}",
            kind.as_str(),
            other
        ))),
    }
}
