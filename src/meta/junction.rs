//! Many-to-many synthesis.
//!
//! A batch pass over a source's models that recognizes bridge tables from
//! their foreign-key shape and promotes them into first-class
//! many-to-many relation column pairs on the two referenced models.
//!
//! The pass is idempotent: an existence check guards column insertion and
//! the `mm`/`system` flags converge after one run.

use inflector::Inflector;
use tracing::debug;

use super::column::{Column, ColumnOptions, UiType};
use super::ids::{ModelId, SourceId};
use super::relation::{RelationOptions, RelationType};
use super::store::MetaStore;
use super::MetaResult;

/// What one synthesis pass changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    /// Junction models newly marked `mm`.
    pub promoted: Vec<ModelId>,
    /// Models un-marked because they no longer qualify.
    pub demoted: Vec<ModelId>,
    /// Relation columns inserted across both sides.
    pub columns_created: usize,
}

/// Run the synthesizer over every model of a source.
///
/// A model is a candidate junction iff it has exactly two belongs-to
/// relation columns and fewer than five plain (non-virtual) columns.
/// The thresholds are deliberate compatibility constants.
pub fn synthesize_many_to_many(
    store: &mut MetaStore,
    source: &SourceId,
) -> MetaResult<SynthesisReport> {
    let mut report = SynthesisReport::default();

    for candidate in store.list_models_with_junctions(source) {
        let columns = store.model_columns(&candidate.id)?;
        let plain_count = columns.iter().filter(|c| !c.uidt.is_virtual()).count();
        let belongs_to: Vec<Column> = columns
            .iter()
            .filter(|c| {
                c.relation()
                    .is_some_and(|r| r.kind == RelationType::BelongsTo)
            })
            .cloned()
            .collect();

        if belongs_to.len() != 2 || plain_count >= 5 {
            if candidate.mm {
                store.mark_as_junction_model(&candidate.id, false)?;
                report.demoted.push(candidate.id.clone());
            }
            continue;
        }

        let (Some(rel_a), Some(rel_b)) = (
            belongs_to[0].relation().cloned(),
            belongs_to[1].relation().cloned(),
        ) else {
            continue;
        };
        let model_a = store.model(&rel_a.fk_related_model_id)?.clone();
        let model_b = store.model(&rel_b.fk_related_model_id)?.clone();

        // Insert the promoted link on each side unless an equivalent one
        // already exists (this is what makes re-runs idempotent).
        if !mm_relation_exists(store, &model_a.id, &candidate.id, &rel_a)? {
            let title =
                store.unique_column_title(&model_a.id, &model_b.title.to_plural());
            let rel = RelationOptions::many_to_many(
                model_b.id.clone(),
                rel_b.fk_parent_column_id.clone(),
                rel_a.fk_parent_column_id.clone(),
                candidate.id.clone(),
                rel_a.fk_child_column_id.clone(),
                rel_b.fk_child_column_id.clone(),
            );
            store.add_column(
                Column::new(
                    model_a.id.clone(),
                    title.to_snake_case(),
                    title,
                    UiType::LinkToAnotherRecord,
                )
                .with_options(ColumnOptions::Relation(rel)),
            )?;
            report.columns_created += 1;
        }
        if !mm_relation_exists(store, &model_b.id, &candidate.id, &rel_b)? {
            let title =
                store.unique_column_title(&model_b.id, &model_a.title.to_plural());
            let rel = RelationOptions::many_to_many(
                model_a.id.clone(),
                rel_a.fk_parent_column_id.clone(),
                rel_b.fk_parent_column_id.clone(),
                candidate.id.clone(),
                rel_b.fk_child_column_id.clone(),
                rel_a.fk_child_column_id.clone(),
            );
            store.add_column(
                Column::new(
                    model_b.id.clone(),
                    title.to_snake_case(),
                    title,
                    UiType::LinkToAnotherRecord,
                )
                .with_options(ColumnOptions::Relation(rel)),
            )?;
            report.columns_created += 1;
        }

        if !candidate.mm {
            store.mark_as_junction_model(&candidate.id, true)?;
            report.promoted.push(candidate.id.clone());
            debug!(model = %candidate.id, "promoted junction model");
        }

        // The has-many view of the junction is superseded by the
        // synthesized many-to-many view; hide it.
        for bt in [&rel_a, &rel_b] {
            mark_superseded_has_many(store, bt)?;
        }
    }

    Ok(report)
}

/// Whether `model` already carries a many-to-many column through
/// `junction` with the same child/parent column pairing as the consumed
/// belongs-to relation.
fn mm_relation_exists(
    store: &MetaStore,
    model: &ModelId,
    junction: &ModelId,
    consumed: &RelationOptions,
) -> MetaResult<bool> {
    Ok(store.model_columns(model)?.iter().any(|c| {
        c.relation().is_some_and(|r| {
            r.kind == RelationType::ManyToMany
                && r.fk_mm_model_id.as_ref() == Some(junction)
                && r.fk_child_column_id == consumed.fk_parent_column_id
                && r.fk_mm_child_column_id.as_ref() == Some(&consumed.fk_child_column_id)
        })
    }))
}

/// Mark the has-many column matching a consumed belongs-to pair as a
/// hidden system column.
fn mark_superseded_has_many(
    store: &mut MetaStore,
    consumed: &RelationOptions,
) -> MetaResult<()> {
    let related = consumed.fk_related_model_id.clone();
    let target = store
        .model_columns(&related)?
        .iter()
        .find(|c| {
            c.relation().is_some_and(|r| {
                r.kind == RelationType::HasMany
                    && r.fk_child_column_id == consumed.fk_child_column_id
                    && r.fk_parent_column_id == consumed.fk_parent_column_id
            })
        })
        .cloned();
    if let Some(mut column) = target {
        if !column.system {
            column.system = true;
            store.update_column(column)?;
        }
    }
    Ok(())
}
