//! Structural import: the inverse of export.
//!
//! Two passes, because a relation materialized in pass one would need
//! both endpoints to already exist as concrete ids:
//!
//! 1. **Structure** - models and plain columns are created with fresh
//!    physical ids, recording `structured path -> new id`.
//! 2. **Wiring** - relation columns, then lookups/rollups, then formula
//!    bodies and views are materialized by re-resolving every structured
//!    path through the recorded map.

use tracing::{debug, info};

use super::export::rewrite_formula_refs;
use super::idmap::IdMap;
use super::schema::ExportGraph;
use super::{ExportError, ExportResult};
use crate::meta::{
    BaseId, Column, ColumnOptions, Filter, FilterId, MetaStore, Model, ModelId, Sort, SourceId,
    View,
};

/// Reconstitute an exported graph inside `target_source`. Returns the
/// new model ids in graph order.
pub fn import_models(
    store: &mut MetaStore,
    graph: &ExportGraph,
    target_base: &BaseId,
    target_source: &SourceId,
) -> ExportResult<Vec<ModelId>> {
    let mut mapping = IdMap::new();
    let mut created: Vec<ModelId> = Vec::new();

    // Pass 1: structure.
    for exported in &graph.models {
        let mut model = Model::new(
            target_base.clone(),
            target_source.clone(),
            exported.table_name.clone(),
            exported.title.clone(),
        );
        model.model_type = exported.model_type;
        let model = store.create_model(model)?;
        if exported.mm {
            store.mark_as_junction_model(&model.id, true)?;
        }
        mapping.insert(&exported.id, model.id.to_string());
        created.push(model.id.clone());

        for column in &exported.columns {
            if is_deferred(&column.options) {
                continue;
            }
            let new_column = store.add_column(rebuild_column(column, &model.id, None)?)?;
            mapping.insert(&column.id, new_column.id.to_string());
        }
        debug!(model = %model.id, table = %exported.table_name, "imported structure");
    }

    // Pass 2a: relation columns.
    for exported in &graph.models {
        let model_id: ModelId = mapping.translate(&exported.id)?.into();
        for column in &exported.columns {
            let ColumnOptions::Relation(rel) = &column.options else {
                continue;
            };
            let mut rel = rel.clone();
            rel.fk_related_model_id = mapping.translate(&rel.fk_related_model_id)?.into();
            rel.fk_parent_column_id = mapping.translate(&rel.fk_parent_column_id)?.into();
            rel.fk_child_column_id = mapping.translate(&rel.fk_child_column_id)?.into();
            if let Some(junction) = rel.fk_mm_model_id.take() {
                rel.fk_mm_model_id = Some(mapping.translate(&junction)?.into());
            }
            if let Some(col) = rel.fk_mm_child_column_id.take() {
                rel.fk_mm_child_column_id = Some(mapping.translate(&col)?.into());
            }
            if let Some(col) = rel.fk_mm_parent_column_id.take() {
                rel.fk_mm_parent_column_id = Some(mapping.translate(&col)?.into());
            }
            let rebuilt =
                rebuild_column(column, &model_id, Some(ColumnOptions::Relation(rel)))?;
            let new_column = store.add_column(rebuilt)?;
            mapping.insert(&column.id, new_column.id.to_string());
        }
    }

    // Pass 2b: lookups and rollups (they reference relation columns).
    for exported in &graph.models {
        let model_id: ModelId = mapping.translate(&exported.id)?.into();
        for column in &exported.columns {
            let options = match &column.options {
                ColumnOptions::Lookup {
                    fk_relation_column_id,
                    fk_lookup_column_id,
                } => ColumnOptions::Lookup {
                    fk_relation_column_id: mapping.translate(fk_relation_column_id)?.into(),
                    fk_lookup_column_id: mapping.translate(fk_lookup_column_id)?.into(),
                },
                ColumnOptions::Rollup {
                    fk_relation_column_id,
                    fk_rollup_column_id,
                    rollup_function,
                } => ColumnOptions::Rollup {
                    fk_relation_column_id: mapping.translate(fk_relation_column_id)?.into(),
                    fk_rollup_column_id: mapping.translate(fk_rollup_column_id)?.into(),
                    rollup_function: rollup_function.clone(),
                },
                _ => continue,
            };
            let new_column = store.add_column(rebuild_column(column, &model_id, Some(options))?)?;
            mapping.insert(&column.id, new_column.id.to_string());
        }
    }

    // Pass 2c: formulas and views.
    for exported in &graph.models {
        let model_id: ModelId = mapping.translate(&exported.id)?.into();
        for column in &exported.columns {
            let ColumnOptions::Formula { body } = &column.options else {
                continue;
            };
            let rewritten = rewrite_formula_refs(&mapping, body)?;
            let options = ColumnOptions::Formula { body: rewritten };
            let new_column = store.add_column(rebuild_column(column, &model_id, Some(options))?)?;
            mapping.insert(&column.id, new_column.id.to_string());
        }

        for exported_view in &exported.views {
            let mut view = View::new(model_id.clone(), exported_view.title.clone());
            view.is_default = exported_view.is_default;
            let view = store.create_view(view)?;
            mapping.insert(&exported_view.id, view.id.to_string());

            for filter in &exported_view.filters {
                let new_filter = rebuild_filter(filter, &view.id, &mapping)?;
                mapping.insert(&filter.id, new_filter.id.to_string());
                store.add_filter(new_filter)?;
            }
            for sort in &exported_view.sorts {
                store.add_sort(Sort::new(
                    view.id.clone(),
                    mapping.translate(&sort.fk_column_id)?.into(),
                    sort.direction,
                ))?;
            }
        }
    }

    info!(models = created.len(), source = %target_source, "import complete");
    Ok(created)
}

/// Deferred columns carry cross-references and wait for pass 2.
fn is_deferred(options: &ColumnOptions) -> bool {
    matches!(
        options,
        ColumnOptions::Relation(_)
            | ColumnOptions::Lookup { .. }
            | ColumnOptions::Rollup { .. }
            | ColumnOptions::Formula { .. }
    )
}

/// A fresh column carrying the exported column's shape.
fn rebuild_column(
    exported: &Column,
    model: &ModelId,
    options: Option<ColumnOptions>,
) -> ExportResult<Column> {
    let mut column = Column::new(
        model.clone(),
        exported.column_name.clone(),
        exported.title.clone(),
        exported.uidt,
    )
    .with_dt(exported.dt.clone());
    column.pk = exported.pk;
    column.pv = exported.pv;
    column.rqd = exported.rqd;
    column.unique = exported.unique;
    column.system = exported.system;
    column.readonly = exported.readonly;
    column.options = match options {
        Some(options) => options,
        None => exported.options.clone(),
    };
    Ok(column)
}

/// A fresh filter node with every reference re-resolved.
fn rebuild_filter(
    exported: &Filter,
    view: &crate::meta::ViewId,
    mapping: &IdMap,
) -> ExportResult<Filter> {
    let mut filter = if exported.is_group {
        Filter::group(exported.logical_op)
    } else {
        let column = exported
            .fk_column_id
            .as_ref()
            .ok_or_else(|| ExportError::MissingMapping("leaf filter without column".into()))?;
        let op = exported.comparison_op.ok_or_else(|| {
            ExportError::MissingMapping("leaf filter without operator".into())
        })?;
        let mut leaf = Filter::leaf(
            mapping.translate(column)?.into(),
            op,
            exported.value.clone(),
        );
        leaf.comparison_sub_op = exported.comparison_sub_op.clone();
        leaf
    };
    filter.logical_op = exported.logical_op;
    filter = filter.in_view(view.clone());
    if let Some(parent) = &exported.fk_parent_id {
        let parent: FilterId = mapping.translate(parent)?.into();
        filter = filter.under(parent);
    }
    Ok(filter)
}
