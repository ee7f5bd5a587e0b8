//! The relation graph store.
//!
//! An in-memory arena over bases, sources, models, columns, views,
//! filters and sorts. All cross-references are ids; resolving them goes
//! back through the arena, so self-relations and bidirectional relation
//! pairs need no special casing.
//!
//! Reads of a model's columns go through a shared cache invalidated by
//! any structural mutation (last-writer-wins). Mutations themselves are
//! `&mut self` and callers serialize them per model.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use inflector::Inflector;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::column::{Column, ColumnOptions, UiType};
use super::filter::Filter;
use super::ids::{BaseId, ColumnId, FilterId, ModelId, SortId, SourceId, ViewId};
use super::model::Model;
use super::relation::{RelationOptions, RelationType};
use super::source::{Base, Source};
use super::view::{Sort, View};
use super::{MetaError, MetaResult};

/// Extra inputs for [`MetaStore::insert_relation_column`].
#[derive(Debug, Default)]
pub struct LinkMeta {
    /// Display title for the visible relation column. Derived from the
    /// related model's title when absent.
    pub title: Option<String>,

    /// Junction reference for many-to-many links. Synthesized when absent.
    pub junction: Option<JunctionRef>,
}

/// Names the junction model and its two foreign-key columns for a
/// many-to-many link.
#[derive(Debug, Clone)]
pub struct JunctionRef {
    pub model_id: ModelId,
    /// Junction column referencing the owning side of the link.
    pub this_column_id: ColumnId,
    /// Junction column referencing the related side of the link.
    pub related_column_id: ColumnId,
}

/// A serializable snapshot of one source's slice of the graph.
///
/// Used by the metadata cache to persist and restore a source without
/// re-introspecting the physical database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub source: Source,
    pub models: Vec<Model>,
    pub columns: Vec<Column>,
    pub views: Vec<View>,
    pub filters: Vec<Filter>,
    pub sorts: Vec<Sort>,
}

/// In-memory relation graph store.
#[derive(Debug, Default)]
pub struct MetaStore {
    bases: HashMap<BaseId, Base>,
    sources: HashMap<SourceId, Source>,
    models: HashMap<ModelId, Model>,
    columns: HashMap<ColumnId, Column>,
    /// Ordered column ids per model.
    model_columns: HashMap<ModelId, Vec<ColumnId>>,
    views: HashMap<ViewId, View>,
    filters: HashMap<FilterId, Filter>,
    sorts: HashMap<SortId, Sort>,
    /// Ordered filter ids per view (creation order).
    view_filters: HashMap<ViewId, Vec<FilterId>>,
    /// Ordered sort ids per view.
    view_sorts: HashMap<ViewId, Vec<SortId>>,
    /// Shared per-model column cache, invalidated on structural mutation.
    column_cache: DashMap<ModelId, Arc<Vec<Column>>>,
}

impl MetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Bases and sources
    // =========================================================================

    pub fn create_base(&mut self, title: impl Into<String>) -> Base {
        let mut base = Base::new(title);
        base.order = self.bases.len() as u32 + 1;
        self.bases.insert(base.id.clone(), base.clone());
        base
    }

    pub fn base(&self, id: &BaseId) -> MetaResult<&Base> {
        self.bases
            .get(id)
            .ok_or_else(|| MetaError::not_found("base", id))
    }

    /// Register a source. The first source of a base becomes its default.
    pub fn create_source(&mut self, mut source: Source) -> MetaResult<Source> {
        self.base(&source.base_id)?;
        source.order = self.sources_of_base(&source.base_id).len() as u32 + 1;
        self.sources.insert(source.id.clone(), source.clone());
        Ok(source)
    }

    pub fn source(&self, id: &SourceId) -> MetaResult<&Source> {
        self.sources
            .get(id)
            .ok_or_else(|| MetaError::not_found("source", id))
    }

    /// Sources of a base, default (lowest order) first.
    pub fn sources_of_base(&self, base: &BaseId) -> Vec<&Source> {
        let mut out: Vec<&Source> = self
            .sources
            .values()
            .filter(|s| &s.base_id == base)
            .collect();
        out.sort_by_key(|s| s.order);
        out
    }

    /// Replace a source's connection payload (credential rotation).
    pub fn update_source_connection(
        &mut self,
        id: &SourceId,
        connection: serde_json::Value,
        encrypted: bool,
    ) -> MetaResult<()> {
        let source = self
            .sources
            .get_mut(id)
            .ok_or_else(|| MetaError::not_found("source", id))?;
        source.connection = connection;
        source.encrypted = encrypted;
        Ok(())
    }

    /// Delete a source and everything under it.
    ///
    /// The base's default source cannot be deleted while sibling sources
    /// exist, unless `force` is set. Junction models are torn down after
    /// the models whose columns reference them.
    pub fn delete_source(&mut self, id: &SourceId, force: bool) -> MetaResult<()> {
        let source = self.source(id)?.clone();
        let siblings = self.sources_of_base(&source.base_id);
        let is_default = siblings.first().map(|s| s.id == source.id).unwrap_or(false);
        if is_default && siblings.len() > 1 && !force {
            return Err(MetaError::StructuralConflict(format!(
                "source {} is the default source of base {} and other sources exist",
                source.id, source.base_id
            )));
        }

        // Plain models first, junction models last: a junction can still be
        // referenced through relation options until its referents are gone.
        let mut doomed: Vec<Model> = self
            .models
            .values()
            .filter(|m| &m.source_id == id)
            .cloned()
            .collect();
        doomed.sort_by_key(|m| m.mm);
        for model in doomed {
            if self.models.contains_key(&model.id) {
                self.delete_model(&model.id)?;
            }
        }

        self.sources.remove(id);
        debug!(source = %id, "deleted source");
        Ok(())
    }

    // =========================================================================
    // Models
    // =========================================================================

    /// Register a model. Physical table names are unique within a source.
    pub fn create_model(&mut self, mut model: Model) -> MetaResult<Model> {
        self.source(&model.source_id)?;
        let clash = self.models.values().any(|m| {
            m.source_id == model.source_id && m.table_name == model.table_name
        });
        if clash {
            return Err(MetaError::StructuralConflict(format!(
                "table name {} already exists in source {}",
                model.table_name, model.source_id
            )));
        }
        model.order = self
            .models
            .values()
            .filter(|m| m.source_id == model.source_id)
            .count() as u32
            + 1;
        self.models.insert(model.id.clone(), model.clone());
        self.model_columns.entry(model.id.clone()).or_default();
        Ok(model)
    }

    pub fn model(&self, id: &ModelId) -> MetaResult<&Model> {
        self.models
            .get(id)
            .ok_or_else(|| MetaError::not_found("model", id))
    }

    /// Models of a source in display order, junction models excluded.
    pub fn list_models(&self, source: &SourceId) -> Vec<Model> {
        let mut out: Vec<Model> = self
            .models
            .values()
            .filter(|m| &m.source_id == source && !m.mm)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.order);
        out
    }

    /// Models of a source including junction models.
    pub fn list_models_with_junctions(&self, source: &SourceId) -> Vec<Model> {
        let mut out: Vec<Model> = self
            .models
            .values()
            .filter(|m| &m.source_id == source)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.order);
        out
    }

    /// Toggle the bridge-table flag. Junction models are hidden from
    /// normal listings and torn down last on source deletion.
    pub fn mark_as_junction_model(&mut self, id: &ModelId, mm: bool) -> MetaResult<()> {
        let model = self
            .models
            .get_mut(id)
            .ok_or_else(|| MetaError::not_found("model", id))?;
        model.mm = mm;
        Ok(())
    }

    // =========================================================================
    // Columns
    // =========================================================================

    /// Add a column to its model.
    ///
    /// Enforces the relation-payload invariant and keeps at most one
    /// primary-value column per model (the newest wins).
    pub fn add_column(&mut self, mut column: Column) -> MetaResult<Column> {
        column.validate()?;
        let model_id = column.model_id.clone();
        self.model(&model_id)?;

        if column.pv {
            for cid in self.model_columns.get(&model_id).cloned().unwrap_or_default() {
                if let Some(existing) = self.columns.get_mut(&cid) {
                    existing.pv = false;
                }
            }
        }

        let order = self
            .model_columns
            .get(&model_id)
            .map(|v| v.len() as u32)
            .unwrap_or(0)
            + 1;
        column.order = order;

        self.model_columns
            .entry(model_id.clone())
            .or_default()
            .push(column.id.clone());
        self.columns.insert(column.id.clone(), column.clone());
        self.column_cache.remove(&model_id);
        Ok(column)
    }

    pub fn column(&self, id: &ColumnId) -> MetaResult<&Column> {
        self.columns
            .get(id)
            .ok_or_else(|| MetaError::not_found("column", id))
    }

    /// Replace a column in place (type change, flag update).
    pub fn update_column(&mut self, column: Column) -> MetaResult<()> {
        column.validate()?;
        let existing = self
            .columns
            .get(&column.id)
            .ok_or_else(|| MetaError::not_found("column", &column.id))?;
        if existing.model_id != column.model_id {
            return Err(MetaError::StructuralConflict(format!(
                "column {} cannot move between models",
                column.id
            )));
        }
        let model_id = column.model_id.clone();
        if column.pv {
            for cid in self.model_columns.get(&model_id).cloned().unwrap_or_default() {
                if cid != column.id {
                    if let Some(other) = self.columns.get_mut(&cid) {
                        other.pv = false;
                    }
                }
            }
        }
        self.columns.insert(column.id.clone(), column);
        self.column_cache.remove(&model_id);
        Ok(())
    }

    /// The model's columns in display order, via the shared cache.
    pub fn model_columns(&self, id: &ModelId) -> MetaResult<Arc<Vec<Column>>> {
        if let Some(hit) = self.column_cache.get(id) {
            return Ok(hit.clone());
        }
        self.model(id)?;
        let cols: Vec<Column> = self
            .model_columns
            .get(id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|cid| self.columns.get(cid).cloned())
                    .collect()
            })
            .unwrap_or_default();
        let arc = Arc::new(cols);
        self.column_cache.insert(id.clone(), arc.clone());
        Ok(arc)
    }

    /// Every column in the store, unordered. Mostly useful for integrity
    /// sweeps and diagnostics.
    pub fn all_columns(&self) -> Vec<&Column> {
        self.columns.values().collect()
    }

    /// The model's primary-key columns.
    pub fn primary_keys(&self, id: &ModelId) -> MetaResult<Vec<Column>> {
        Ok(self
            .model_columns(id)?
            .iter()
            .filter(|c| c.pk)
            .cloned()
            .collect())
    }

    // =========================================================================
    // Relation columns
    // =========================================================================

    /// Create the column(s) and relation record(s) for a link.
    ///
    /// - Has-many: a visible relation column on the parent (referenced)
    ///   model, plus the implicit foreign-key marker on the child column.
    /// - Belongs-to: a visible relation column on the child (referencing)
    ///   model, plus the same marker.
    /// - Many-to-many: a mirrored pair of relation columns on both models.
    ///   `parent_column` is the related side's pk, `child_column` the
    ///   owning side's pk; the junction is taken from `meta` or
    ///   synthesized.
    ///
    /// Returns the visible column on the owning side.
    pub fn insert_relation_column(
        &mut self,
        kind: RelationType,
        parent_column: &ColumnId,
        child_column: &ColumnId,
        meta: LinkMeta,
    ) -> MetaResult<Column> {
        let parent_col = self.column(parent_column)?.clone();
        let child_col = self.column(child_column)?.clone();

        match kind {
            RelationType::HasMany => {
                let parent_model = self.model(&parent_col.model_id)?.clone();
                let child_model = self.model(&child_col.model_id)?.clone();
                self.mark_foreign_key(&child_col)?;

                let title = meta.title.unwrap_or_else(|| {
                    self.unique_column_title(&parent_model.id, &child_model.title.to_plural())
                });
                let rel = RelationOptions::has_many(
                    child_model.id.clone(),
                    parent_col.id.clone(),
                    child_col.id.clone(),
                );
                self.add_column(
                    Column::new(
                        parent_model.id,
                        title.to_snake_case(),
                        title,
                        UiType::LinkToAnotherRecord,
                    )
                    .with_options(ColumnOptions::Relation(rel)),
                )
            }
            RelationType::BelongsTo => {
                let parent_model = self.model(&parent_col.model_id)?.clone();
                let child_model = self.model(&child_col.model_id)?.clone();
                self.mark_foreign_key(&child_col)?;

                let title = meta.title.unwrap_or_else(|| {
                    self.unique_column_title(&child_model.id, &parent_model.title.to_singular())
                });
                let rel = RelationOptions::belongs_to(
                    parent_model.id,
                    parent_col.id.clone(),
                    child_col.id.clone(),
                );
                self.add_column(
                    Column::new(
                        child_model.id,
                        title.to_snake_case(),
                        title,
                        UiType::LinkToAnotherRecord,
                    )
                    .with_options(ColumnOptions::Relation(rel)),
                )
            }
            RelationType::ManyToMany => {
                let model_a = self.model(&child_col.model_id)?.clone();
                let model_b = self.model(&parent_col.model_id)?.clone();
                let junction = match meta.junction {
                    Some(j) => j,
                    None => self.synthesize_junction(&model_a, &child_col, &model_b, &parent_col)?,
                };

                let title_a = meta.title.unwrap_or_else(|| {
                    self.unique_column_title(&model_a.id, &model_b.title.to_plural())
                });
                let rel_a = RelationOptions::many_to_many(
                    model_b.id.clone(),
                    parent_col.id.clone(),
                    child_col.id.clone(),
                    junction.model_id.clone(),
                    junction.this_column_id.clone(),
                    junction.related_column_id.clone(),
                );
                let col_a = self.add_column(
                    Column::new(
                        model_a.id.clone(),
                        title_a.to_snake_case(),
                        title_a,
                        UiType::LinkToAnotherRecord,
                    )
                    .with_options(ColumnOptions::Relation(rel_a)),
                )?;

                let title_b =
                    self.unique_column_title(&model_b.id, &model_a.title.to_plural());
                let rel_b = RelationOptions::many_to_many(
                    model_a.id,
                    child_col.id.clone(),
                    parent_col.id.clone(),
                    junction.model_id,
                    junction.related_column_id,
                    junction.this_column_id,
                );
                self.add_column(
                    Column::new(
                        model_b.id,
                        title_b.to_snake_case(),
                        title_b,
                        UiType::LinkToAnotherRecord,
                    )
                    .with_options(ColumnOptions::Relation(rel_b)),
                )?;

                Ok(col_a)
            }
        }
    }

    /// Rewrite a physical column as the implicit foreign-key marker.
    fn mark_foreign_key(&mut self, column: &Column) -> MetaResult<()> {
        if column.pk || column.uidt == UiType::ForeignKey {
            return Ok(());
        }
        let mut fk = column.clone();
        fk.uidt = UiType::ForeignKey;
        fk.options = ColumnOptions::None;
        self.update_column(fk)
    }

    /// Create a bridge model with two foreign-key columns for a new
    /// many-to-many link.
    fn synthesize_junction(
        &mut self,
        model_a: &Model,
        a_pk: &Column,
        model_b: &Model,
        b_pk: &Column,
    ) -> MetaResult<JunctionRef> {
        let table_name = format!("_tl_m2m_{}_{}", model_a.table_name, model_b.table_name);
        let title = format!("{}{}", model_a.title.to_singular(), model_b.title.to_plural());
        let junction = self.create_model(Model::new(
            model_a.base_id.clone(),
            model_a.source_id.clone(),
            table_name,
            title,
        ))?;
        self.mark_as_junction_model(&junction.id, true)?;

        let this_col = self.add_column(
            Column::new(
                junction.id.clone(),
                format!("{}_id", model_a.table_name),
                format!("{} Id", model_a.title.to_singular()),
                UiType::ForeignKey,
            )
            .with_dt(a_pk.dt.clone())
            .required(),
        )?;
        let related_col = self.add_column(
            Column::new(
                junction.id.clone(),
                format!("{}_id", model_b.table_name),
                format!("{} Id", model_b.title.to_singular()),
                UiType::ForeignKey,
            )
            .with_dt(b_pk.dt.clone())
            .required(),
        )?;

        Ok(JunctionRef {
            model_id: junction.id,
            this_column_id: this_col.id,
            related_column_id: related_col.id,
        })
    }

    /// A column title not already used on the model: `base`, then
    /// `base_1`, `base_2`, ...
    pub(crate) fn unique_column_title(&self, model: &ModelId, base: &str) -> String {
        let taken: Vec<&str> = self
            .model_columns
            .get(model)
            .map(|ids| {
                ids.iter()
                    .filter_map(|cid| self.columns.get(cid).map(|c| c.title.as_str()))
                    .collect()
            })
            .unwrap_or_default();
        if !taken.contains(&base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !taken.contains(&candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }

    // =========================================================================
    // Deletion cascades
    // =========================================================================

    /// Delete a column and everything that depends on it: filters, sorts,
    /// lookups/rollups anchored on or targeting it, and - for relation
    /// columns - the paired inverse column, unless the inverse is still
    /// referenced by a lookup or rollup elsewhere.
    pub fn delete_column(&mut self, id: &ColumnId) -> MetaResult<()> {
        let column = self
            .columns
            .remove(id)
            .ok_or_else(|| MetaError::not_found("column", id))?;
        if let Some(list) = self.model_columns.get_mut(&column.model_id) {
            list.retain(|cid| cid != id);
        }
        self.column_cache.remove(&column.model_id);

        // Dependent filters and sorts.
        let dead_filters: Vec<FilterId> = self
            .filters
            .values()
            .filter(|f| f.fk_column_id.as_ref() == Some(id))
            .map(|f| f.id.clone())
            .collect();
        for fid in dead_filters {
            self.remove_filter(&fid);
        }
        let dead_sorts: Vec<SortId> = self
            .sorts
            .values()
            .filter(|s| &s.fk_column_id == id)
            .map(|s| s.id.clone())
            .collect();
        for sid in dead_sorts {
            self.remove_sort(&sid);
        }

        // Lookups and rollups anchored on or targeting this column.
        let dependents: Vec<ColumnId> = self
            .columns
            .values()
            .filter(|c| {
                c.options.anchor_relation_column() == Some(id)
                    || c.options.target_column() == Some(id)
            })
            .map(|c| c.id.clone())
            .collect();
        for dep in dependents {
            if self.columns.contains_key(&dep) {
                self.delete_column(&dep)?;
            }
        }

        // Inverse relation cleanup.
        if let Some(rel) = column.relation() {
            if let Some(inverse) = self.find_inverse_column_id(&column.model_id, rel) {
                let still_referenced = self
                    .columns
                    .values()
                    .any(|c| c.options.anchor_relation_column() == Some(&inverse));
                if !still_referenced && self.columns.contains_key(&inverse) {
                    self.delete_column(&inverse)?;
                }
            }
        }

        debug!(column = %id, "deleted column");
        Ok(())
    }

    /// The paired inverse relation column on the related model, if any.
    fn find_inverse_column_id(
        &self,
        owner: &ModelId,
        rel: &RelationOptions,
    ) -> Option<ColumnId> {
        let related = &rel.fk_related_model_id;
        self.model_columns
            .get(related)?
            .iter()
            .filter_map(|cid| self.columns.get(cid))
            .find(|c| {
                c.relation().is_some_and(|r| {
                    &r.fk_related_model_id == owner && rel.is_inverse_of(r)
                })
            })
            .map(|c| c.id.clone())
    }

    /// Delete a model, its columns (in the fixed priority order: Lookup,
    /// Rollup, ForeignKey, LinkToAnotherRecord, then the rest), its views,
    /// and any relation columns on other models that point at it.
    pub fn delete_model(&mut self, id: &ModelId) -> MetaResult<()> {
        self.model(id)?;

        let mut ids: Vec<ColumnId> = self.model_columns.get(id).cloned().unwrap_or_default();
        ids.sort_by_key(|cid| {
            self.columns
                .get(cid)
                .map(|c| (c.uidt.deletion_priority(), c.order))
                .unwrap_or((u8::MAX, u32::MAX))
        });
        for cid in ids {
            if self.columns.contains_key(&cid) {
                self.delete_column(&cid)?;
            }
        }

        // Relation columns elsewhere that still point at this model
        // (self-relations were already handled above).
        let pointing: Vec<ColumnId> = self
            .columns
            .values()
            .filter(|c| {
                c.relation().is_some_and(|r| {
                    &r.fk_related_model_id == id || r.fk_mm_model_id.as_ref() == Some(id)
                })
            })
            .map(|c| c.id.clone())
            .collect();
        for cid in pointing {
            if self.columns.contains_key(&cid) {
                self.delete_column(&cid)?;
            }
        }

        let dead_views: Vec<ViewId> = self
            .views
            .values()
            .filter(|v| &v.fk_model_id == id)
            .map(|v| v.id.clone())
            .collect();
        for vid in dead_views {
            self.delete_view(&vid)?;
        }

        self.models.remove(id);
        self.model_columns.remove(id);
        self.column_cache.remove(id);
        debug!(model = %id, "deleted model");
        Ok(())
    }

    // =========================================================================
    // Views, filters, sorts
    // =========================================================================

    pub fn create_view(&mut self, mut view: View) -> MetaResult<View> {
        self.model(&view.fk_model_id)?;
        view.order = self
            .views
            .values()
            .filter(|v| v.fk_model_id == view.fk_model_id)
            .count() as u32
            + 1;
        self.views.insert(view.id.clone(), view.clone());
        self.view_filters.entry(view.id.clone()).or_default();
        self.view_sorts.entry(view.id.clone()).or_default();
        Ok(view)
    }

    pub fn view(&self, id: &ViewId) -> MetaResult<&View> {
        self.views
            .get(id)
            .ok_or_else(|| MetaError::not_found("view", id))
    }

    pub fn model_views(&self, model: &ModelId) -> Vec<View> {
        let mut out: Vec<View> = self
            .views
            .values()
            .filter(|v| &v.fk_model_id == model)
            .cloned()
            .collect();
        out.sort_by_key(|v| v.order);
        out
    }

    pub fn delete_view(&mut self, id: &ViewId) -> MetaResult<()> {
        self.view(id)?;
        for fid in self.view_filters.remove(id).unwrap_or_default() {
            self.filters.remove(&fid);
        }
        for sid in self.view_sorts.remove(id).unwrap_or_default() {
            self.sorts.remove(&sid);
        }
        self.views.remove(id);
        Ok(())
    }

    /// Attach a filter node. Leaf columns and parent groups must exist.
    pub fn add_filter(&mut self, filter: Filter) -> MetaResult<Filter> {
        filter.validate()?;
        if let Some(col) = &filter.fk_column_id {
            self.column(col)?;
        }
        if let Some(parent) = &filter.fk_parent_id {
            let parent = self
                .filters
                .get(parent)
                .ok_or_else(|| MetaError::not_found("filter", parent))?;
            if !parent.is_group {
                return Err(MetaError::StructuralConflict(format!(
                    "filter {} cannot nest under non-group {}",
                    filter.id, parent.id
                )));
            }
        }
        if let Some(view) = &filter.fk_view_id {
            self.view(view)?;
            self.view_filters
                .entry(view.clone())
                .or_default()
                .push(filter.id.clone());
        }
        self.filters.insert(filter.id.clone(), filter.clone());
        Ok(filter)
    }

    pub fn filter(&self, id: &FilterId) -> MetaResult<&Filter> {
        self.filters
            .get(id)
            .ok_or_else(|| MetaError::not_found("filter", id))
    }

    /// All filter nodes of a view in creation order.
    pub fn view_filters(&self, view: &ViewId) -> Vec<Filter> {
        self.view_filters
            .get(view)
            .map(|ids| {
                ids.iter()
                    .filter_map(|fid| self.filters.get(fid).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Root filter nodes of a view (no parent group), in creation order.
    pub fn root_filters(&self, view: &ViewId) -> Vec<Filter> {
        self.view_filters(view)
            .into_iter()
            .filter(|f| f.fk_parent_id.is_none())
            .collect()
    }

    /// Children of a group node, in creation order.
    pub fn child_filters(&self, parent: &FilterId) -> Vec<Filter> {
        let mut out: Vec<Filter> = Vec::new();
        for ids in self.view_filters.values() {
            for fid in ids {
                if let Some(f) = self.filters.get(fid) {
                    if f.fk_parent_id.as_ref() == Some(parent) {
                        out.push(f.clone());
                    }
                }
            }
        }
        // Standalone trees (filters without a view) still resolve.
        for f in self.filters.values() {
            if f.fk_view_id.is_none() && f.fk_parent_id.as_ref() == Some(parent) {
                out.push(f.clone());
            }
        }
        out
    }

    fn remove_filter(&mut self, id: &FilterId) {
        // Children of a removed group go with it.
        let children: Vec<FilterId> = self
            .filters
            .values()
            .filter(|f| f.fk_parent_id.as_ref() == Some(id))
            .map(|f| f.id.clone())
            .collect();
        for child in children {
            self.remove_filter(&child);
        }
        if let Some(filter) = self.filters.remove(id) {
            if let Some(view) = filter.fk_view_id {
                if let Some(list) = self.view_filters.get_mut(&view) {
                    list.retain(|fid| fid != id);
                }
            }
        }
    }

    pub fn add_sort(&mut self, sort: Sort) -> MetaResult<Sort> {
        self.view(&sort.fk_view_id)?;
        self.column(&sort.fk_column_id)?;
        self.view_sorts
            .entry(sort.fk_view_id.clone())
            .or_default()
            .push(sort.id.clone());
        self.sorts.insert(sort.id.clone(), sort.clone());
        Ok(sort)
    }

    pub fn view_sorts(&self, view: &ViewId) -> Vec<Sort> {
        self.view_sorts
            .get(view)
            .map(|ids| {
                ids.iter()
                    .filter_map(|sid| self.sorts.get(sid).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn remove_sort(&mut self, id: &SortId) {
        if let Some(sort) = self.sorts.remove(id) {
            if let Some(list) = self.view_sorts.get_mut(&sort.fk_view_id) {
                list.retain(|sid| sid != id);
            }
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Capture one source's slice of the graph for persistence.
    pub fn snapshot_source(&self, id: &SourceId) -> MetaResult<SourceSnapshot> {
        let source = self.source(id)?.clone();
        let models = self.list_models_with_junctions(id);
        let mut columns = Vec::new();
        let mut views = Vec::new();
        let mut filters = Vec::new();
        let mut sorts = Vec::new();
        for model in &models {
            columns.extend(self.model_columns(&model.id)?.iter().cloned());
            for view in self.model_views(&model.id) {
                filters.extend(self.view_filters(&view.id));
                sorts.extend(self.view_sorts(&view.id));
                views.push(view);
            }
        }
        Ok(SourceSnapshot {
            source,
            models,
            columns,
            views,
            filters,
            sorts,
        })
    }

    /// Rebuild a source's slice from a snapshot, replacing any existing
    /// entities with the same ids.
    pub fn restore_source(&mut self, snapshot: SourceSnapshot) -> MetaResult<()> {
        self.bases
            .entry(snapshot.source.base_id.clone())
            .or_insert_with(|| Base {
                id: snapshot.source.base_id.clone(),
                title: String::new(),
                order: 0,
            });
        self.sources
            .insert(snapshot.source.id.clone(), snapshot.source);
        for model in snapshot.models {
            self.column_cache.remove(&model.id);
            self.model_columns.entry(model.id.clone()).or_default();
            self.models.insert(model.id.clone(), model);
        }
        for column in snapshot.columns {
            let list = self.model_columns.entry(column.model_id.clone()).or_default();
            if !list.contains(&column.id) {
                list.push(column.id.clone());
            }
            self.columns.insert(column.id.clone(), column);
        }
        for view in snapshot.views {
            self.view_filters.entry(view.id.clone()).or_default();
            self.view_sorts.entry(view.id.clone()).or_default();
            self.views.insert(view.id.clone(), view);
        }
        for filter in snapshot.filters {
            if let Some(view) = &filter.fk_view_id {
                let list = self.view_filters.entry(view.clone()).or_default();
                if !list.contains(&filter.id) {
                    list.push(filter.id.clone());
                }
            }
            self.filters.insert(filter.id.clone(), filter);
        }
        for sort in snapshot.sorts {
            let list = self.view_sorts.entry(sort.fk_view_id.clone()).or_default();
            if !list.contains(&sort.id) {
                list.push(sort.id.clone());
            }
            self.sorts.insert(sort.id.clone(), sort);
        }
        Ok(())
    }
}
