//! Whole-schema (and optionally whole-dataset) export.
//!
//! Artifact layout under the destination root:
//!
//! ```text
//! export/<sourceId>/<baseId>/schema.json
//! export/<sourceId>/<baseId>/data/<modelId>.csv
//! export/<sourceId>/<baseId>/data/<modelId>_links.csv   (many-to-many only)
//! ```
//!
//! Row data streams page by page in offset order: page N+1 is not
//! requested until page N has been written, keeping memory bounded and
//! the header-only-once invariant trivial. The scalar stream and the
//! link stream of one model advance in lockstep over the same row
//! windows.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::idmap::{join_path, seed_source, IdMap};
use super::schema::{ExportGraph, ExportedModel, ExportedView};
use super::{ExportError, ExportResult};
use crate::meta::{
    Column, ColumnOptions, Filter, MetaStore, Model, ModelId, RelationType, SourceId,
};
use crate::provider::RecordPager;

/// Rows fetched per page while streaming data.
pub const DEFAULT_EXPORT_PAGE_SIZE: u64 = 200;

/// `{{<physical id>}}` references inside formula bodies.
static FORMULA_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Za-z0-9_:]+)\}\}").expect("formula reference pattern"));

/// Serializes a model set into a relocatable [`ExportGraph`] and streams
/// row data into CSV artifacts.
pub struct Exporter<'a> {
    store: &'a MetaStore,
    page_size: u64,
}

impl<'a> Exporter<'a> {
    pub fn new(store: &'a MetaStore) -> Self {
        Self {
            store,
            page_size: DEFAULT_EXPORT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Serialize the schema of the requested models (plus any junction
    /// models their links reach through) into an export graph.
    pub fn serialize_models(&self, models: &[ModelId]) -> ExportResult<ExportGraph> {
        let (id_map, expanded) = self.build_id_map(models)?;
        self.serialize_with_map(&id_map, &expanded)
    }

    /// Export schema and data under `root`. Per-model failures delete
    /// that model's partial artifacts and abort the export; models
    /// already completed are left in place.
    pub async fn export_to_dir(
        &self,
        pager: &dyn RecordPager,
        models: &[ModelId],
        root: &Path,
    ) -> ExportResult<ExportGraph> {
        let (id_map, expanded) = self.build_id_map(models)?;
        let graph = self.serialize_with_map(&id_map, &expanded)?;

        let first = expanded
            .first()
            .ok_or_else(|| ExportError::MissingMapping("empty model set".into()))?;
        let model = self.store.model(first)?;
        let source = self.store.source(&model.source_id)?;
        let base_dir = root
            .join("export")
            .join(source.id.as_str())
            .join(source.base_id.as_str());
        let data_dir = base_dir.join("data");
        tokio::fs::create_dir_all(&data_dir).await?;

        let schema_path = base_dir.join("schema.json");
        tokio::fs::write(&schema_path, serde_json::to_vec_pretty(&graph)?).await?;

        for model_id in &expanded {
            if let Err(err) = self
                .export_model_data(pager, &id_map, model_id, &data_dir)
                .await
            {
                let artifacts = model_artifacts(&data_dir, model_id);
                for path in artifacts {
                    if tokio::fs::remove_file(&path).await.is_ok() {
                        debug!(path = %path.display(), "removed partial artifact");
                    }
                }
                return Err(ExportError::Incomplete {
                    model: model_id.to_string(),
                    source: Box::new(err),
                });
            }
        }

        info!(models = expanded.len(), root = %base_dir.display(), "export complete");
        Ok(graph)
    }

    /// Build the one-shot identifier map for a model set, expanding the
    /// set with junction models reachable through many-to-many links.
    fn build_id_map(&self, models: &[ModelId]) -> ExportResult<(IdMap, Vec<ModelId>)> {
        let mut id_map = IdMap::new();
        let mut seeded: HashSet<SourceId> = HashSet::new();
        let mut expanded: Vec<ModelId> = Vec::new();
        let mut seen: HashSet<ModelId> = HashSet::new();

        for model_id in models {
            let model = self.store.model(model_id)?;
            if seeded.insert(model.source_id.clone()) {
                seed_source(&mut id_map, self.store, &model.source_id)?;
            }
            if seen.insert(model_id.clone()) {
                expanded.push(model_id.clone());
            }
            for column in self.store.model_columns(model_id)?.iter() {
                let Some(rel) = column.relation() else { continue };
                if rel.kind != RelationType::ManyToMany {
                    continue;
                }
                if let Some(junction) = &rel.fk_mm_model_id {
                    if seen.insert(junction.clone()) {
                        expanded.push(junction.clone());
                    }
                }
            }
        }
        Ok((id_map, expanded))
    }

    fn serialize_with_map(
        &self,
        id_map: &IdMap,
        models: &[ModelId],
    ) -> ExportResult<ExportGraph> {
        let first = models
            .first()
            .ok_or_else(|| ExportError::MissingMapping("empty model set".into()))?;
        let source_id = self.store.model(first)?.source_id.clone();
        let graph_id = id_map.translate(&source_id)?;

        let mut exported = Vec::with_capacity(models.len());
        for model_id in models {
            exported.push(self.serialize_model(id_map, model_id)?);
        }

        Ok(ExportGraph {
            id: graph_id,
            models: exported,
        })
    }

    fn serialize_model(&self, id_map: &IdMap, model_id: &ModelId) -> ExportResult<ExportedModel> {
        let model = self.store.model(model_id)?;
        let model_path = id_map.translate(&model.id)?;

        let mut columns = Vec::new();
        for column in self.store.model_columns(model_id)?.iter() {
            columns.push(self.serialize_column(id_map, &model_path, column)?);
        }

        let mut views = Vec::new();
        for view in self.store.model_views(model_id) {
            let view_path = id_map.translate(&view.id)?;
            let mut filters = Vec::new();
            for filter in self.store.view_filters(&view.id) {
                filters.push(serialize_filter(id_map, &view_path, &filter)?);
            }
            let mut sorts = Vec::new();
            for mut sort in self.store.view_sorts(&view.id) {
                sort.id = join_path([view_path.as_str(), sort.id.as_str()]).into();
                sort.fk_view_id = view_path.clone().into();
                sort.fk_column_id = id_map.translate(&sort.fk_column_id)?.into();
                sorts.push(sort);
            }
            views.push(ExportedView {
                id: view_path,
                title: view.title,
                is_default: view.is_default,
                filters,
                sorts,
            });
        }

        Ok(ExportedModel {
            id: model_path,
            title: model.title.clone(),
            table_name: model.table_name.clone(),
            model_type: model.model_type,
            mm: model.mm,
            order: model.order,
            columns,
            views,
        })
    }

    fn serialize_column(
        &self,
        id_map: &IdMap,
        model_path: &str,
        column: &Column,
    ) -> ExportResult<Column> {
        let mut out = column.clone();
        out.id = id_map.translate(&column.id)?.into();
        out.model_id = model_path.to_string().into();
        out.options = match &column.options {
            ColumnOptions::Relation(rel) => {
                let mut rel = rel.clone();
                rel.fk_related_model_id = id_map.translate(&rel.fk_related_model_id)?.into();
                rel.fk_parent_column_id = id_map.translate(&rel.fk_parent_column_id)?.into();
                rel.fk_child_column_id = id_map.translate(&rel.fk_child_column_id)?.into();
                if let Some(junction) = rel.fk_mm_model_id.take() {
                    rel.fk_mm_model_id = Some(id_map.translate(&junction)?.into());
                }
                if let Some(col) = rel.fk_mm_child_column_id.take() {
                    rel.fk_mm_child_column_id = Some(id_map.translate(&col)?.into());
                }
                if let Some(col) = rel.fk_mm_parent_column_id.take() {
                    rel.fk_mm_parent_column_id = Some(id_map.translate(&col)?.into());
                }
                ColumnOptions::Relation(rel)
            }
            ColumnOptions::Lookup {
                fk_relation_column_id,
                fk_lookup_column_id,
            } => ColumnOptions::Lookup {
                fk_relation_column_id: id_map.translate(fk_relation_column_id)?.into(),
                fk_lookup_column_id: id_map.translate(fk_lookup_column_id)?.into(),
            },
            ColumnOptions::Rollup {
                fk_relation_column_id,
                fk_rollup_column_id,
                rollup_function,
            } => ColumnOptions::Rollup {
                fk_relation_column_id: id_map.translate(fk_relation_column_id)?.into(),
                fk_rollup_column_id: id_map.translate(fk_rollup_column_id)?.into(),
                rollup_function: rollup_function.clone(),
            },
            ColumnOptions::Formula { body } => ColumnOptions::Formula {
                body: rewrite_formula_refs(id_map, body)?,
            },
            other => other.clone(),
        };
        Ok(out)
    }

    async fn export_model_data(
        &self,
        pager: &dyn RecordPager,
        id_map: &IdMap,
        model_id: &ModelId,
        data_dir: &Path,
    ) -> ExportResult<()> {
        let model = self.store.model(model_id)?.clone();
        let columns = self.store.model_columns(model_id)?;

        let scalar_columns: Vec<Column> = columns
            .iter()
            .filter(|c| !c.uidt.is_virtual())
            .cloned()
            .collect();
        let mm_columns: Vec<Column> = columns
            .iter()
            .filter(|c| {
                c.relation()
                    .is_some_and(|r| r.kind == RelationType::ManyToMany)
            })
            .cloned()
            .collect();
        let pk = columns.iter().find(|c| c.pk).cloned();

        let [data_path, links_path] = model_artifacts_pair(data_dir, model_id);
        let mut data_file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&data_path)
            .await?;
        let mut links_file = if !mm_columns.is_empty() && pk.is_some() {
            Some(
                tokio::fs::OpenOptions::new()
                    .create(true)
                    .truncate(true)
                    .write(true)
                    .open(&links_path)
                    .await?,
            )
        } else {
            None
        };

        // Header rows: structured column paths, so the artifact carries
        // its own mapping.
        let mut header: Vec<String> = Vec::with_capacity(scalar_columns.len());
        for column in &scalar_columns {
            header.push(id_map.translate(&column.id)?);
        }
        data_file.write_all(&encode_csv_record(&header)?).await?;

        if let Some(file) = links_file.as_mut() {
            let mut link_header = vec!["pk".to_string()];
            for column in &mm_columns {
                link_header.push(id_map.translate(&column.id)?);
            }
            file.write_all(&encode_csv_record(&link_header)?).await?;
        }

        let mut offset = 0u64;
        loop {
            let rows = pager
                .fetch_page(&model, &scalar_columns, offset, self.page_size)
                .await?;

            for row in &rows {
                let record: Vec<String> = scalar_columns
                    .iter()
                    .map(|c| csv_cell(row.get(&c.column_name)))
                    .collect();
                data_file.write_all(&encode_csv_record(&record)?).await?;
            }

            // Link stream advances over the same row window.
            if let (Some(file), Some(pk)) = (links_file.as_mut(), pk.as_ref()) {
                let keys: Vec<String> = rows
                    .iter()
                    .map(|r| csv_cell(r.get(&pk.column_name)))
                    .collect();
                let mut joined: Vec<Vec<String>> =
                    vec![Vec::with_capacity(mm_columns.len()); keys.len()];
                for column in &mm_columns {
                    let rel = column.relation().ok_or_else(|| {
                        ExportError::MissingMapping(column.id.to_string())
                    })?;
                    let related = pager.related_keys(rel, &keys).await?;
                    for (i, key) in keys.iter().enumerate() {
                        let list = related
                            .get(key)
                            .map(|v| v.join(","))
                            .unwrap_or_default();
                        joined[i].push(list);
                    }
                }
                for (key, lists) in keys.iter().zip(joined) {
                    let mut record = Vec::with_capacity(1 + lists.len());
                    record.push(key.clone());
                    record.extend(lists);
                    file.write_all(&encode_csv_record(&record)?).await?;
                }
            }

            if (rows.len() as u64) < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        data_file.flush().await?;
        if let Some(file) = links_file.as_mut() {
            file.flush().await?;
        }
        debug!(model = %model_id, "exported data");
        Ok(())
    }
}

/// Substitute `{{<physical id>}}` with `{{<structured path>}}`.
pub(crate) fn rewrite_formula_refs(id_map: &IdMap, body: &str) -> ExportResult<String> {
    let mut out = String::with_capacity(body.len());
    let mut last = 0;
    for caps in FORMULA_REF.captures_iter(body) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        let id = &caps[1];
        out.push_str(&body[last..whole.start()]);
        match id_map.get(id) {
            Some(path) => {
                out.push_str("{{");
                out.push_str(path);
                out.push_str("}}");
            }
            None => return Err(ExportError::MissingMapping(id.to_string())),
        }
        last = whole.end();
    }
    out.push_str(&body[last..]);
    Ok(out)
}

/// Rewrite one filter node for export: every reference becomes a path.
fn serialize_filter(id_map: &IdMap, view_path: &str, filter: &Filter) -> ExportResult<Filter> {
    let mut out = filter.clone();
    out.id = join_path([view_path, filter.id.as_str()]).into();
    out.fk_view_id = Some(view_path.to_string().into());
    if let Some(column) = &filter.fk_column_id {
        out.fk_column_id = Some(id_map.translate(column)?.into());
    }
    if let Some(parent) = &filter.fk_parent_id {
        out.fk_parent_id = Some(join_path([view_path, parent.as_str()]).into());
    }
    // Group nodes never carry comparison fields; leaf fields pass through.
    out.validate()?;
    Ok(out)
}

fn model_artifacts_pair(data_dir: &Path, model: &ModelId) -> [PathBuf; 2] {
    [
        data_dir.join(format!("{}.csv", model)),
        data_dir.join(format!("{}_links.csv", model)),
    ]
}

fn model_artifacts(data_dir: &Path, model: &ModelId) -> Vec<PathBuf> {
    model_artifacts_pair(data_dir, model).to_vec()
}

/// One CSV record, terminated, as bytes.
fn encode_csv_record(fields: &[String]) -> ExportResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

/// A cell value rendered for CSV.
fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => serde_json::to_string(other).unwrap_or_else(|_| {
            warn!("unserializable cell value");
            String::new()
        }),
    }
}
