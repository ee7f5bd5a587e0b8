//! The export identifier map and the structured path grammar.
//!
//! Paths are colon-delimited:
//! `<baseId>::<sourceId>[::<modelId>[::<columnId>|::<viewId>[::<entityId>]]]`
//! Every cross-reference inside an exported schema uses a path instead of
//! a physical id. The map lives for one export call and is threaded
//! through as a parameter, never shared.

use std::collections::HashMap;

use super::{ExportError, ExportResult};
use crate::meta::{MetaStore, SourceId};

/// Path segment separator.
pub const PATH_SEP: &str = "::";

/// One-shot physical-id -> structured-path map.
#[derive(Debug, Default)]
pub struct IdMap {
    forward: HashMap<String, String>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, physical: impl std::fmt::Display, path: impl Into<String>) {
        self.forward.insert(physical.to_string(), path.into());
    }

    pub fn get(&self, physical: &str) -> Option<&str> {
        self.forward.get(physical).map(String::as_str)
    }

    /// Translate or fail with [`ExportError::MissingMapping`].
    pub fn translate(&self, physical: impl std::fmt::Display) -> ExportResult<String> {
        let key = physical.to_string();
        self.forward
            .get(&key)
            .cloned()
            .ok_or(ExportError::MissingMapping(key))
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Join path segments.
pub fn join_path<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(PATH_SEP)
}

/// Split a structured path into its segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split(PATH_SEP).collect()
}

/// The trailing segment of a path (the original physical id).
pub fn path_tail(path: &str) -> &str {
    path.rsplit(PATH_SEP).next().unwrap_or(path)
}

/// Seed the map with every model, column and view of a source.
pub fn seed_source(map: &mut IdMap, store: &MetaStore, source: &SourceId) -> ExportResult<()> {
    let src = store.source(source)?;
    let source_path = join_path([src.base_id.as_str(), src.id.as_str()]);
    map.insert(&src.id, source_path.clone());

    for model in store.list_models_with_junctions(source) {
        let model_path = join_path([source_path.as_str(), model.id.as_str()]);
        map.insert(&model.id, model_path.clone());

        for column in store.model_columns(&model.id)?.iter() {
            map.insert(
                &column.id,
                join_path([model_path.as_str(), column.id.as_str()]),
            );
        }
        for view in store.model_views(&model.id) {
            map.insert(&view.id, join_path([model_path.as_str(), view.id.as_str()]));
        }
    }
    Ok(())
}
