//! Graph population from schema introspection.
//!
//! Builds models, columns and relation column pairs for a source from
//! what the physical database reports, then runs the many-to-many
//! synthesizer over the result. This is the path a freshly attached
//! external database takes into the graph.

use std::collections::HashMap;

use inflector::Inflector;
use tracing::{debug, info};

use super::column::{Column, UiType};
use super::ids::{ColumnId, SourceId};
use super::junction::synthesize_many_to_many;
use super::model::Model;
use super::relation::RelationType;
use super::store::{LinkMeta, MetaStore};
use super::MetaError;
use crate::provider::{ProviderError, SchemaIntrospector};

/// Errors raised while populating a source.
#[derive(Debug, thiserror::Error)]
pub enum PopulateError {
    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Counters for one populate run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PopulateReport {
    pub tables: usize,
    pub relations: usize,
    pub junctions: usize,
}

/// Map a reported physical type to a logical column type.
fn uidt_for_dt(dt: &str) -> UiType {
    let dt = dt.to_lowercase();
    match dt.as_str() {
        d if d.contains("json") => UiType::Json,
        d if d.contains("bool") || d == "bit" || d == "tinyint(1)" => UiType::Checkbox,
        d if d.contains("int") || d == "serial" || d == "bigserial" => UiType::Number,
        d if d.contains("decimal")
            || d.contains("numeric")
            || d.contains("float")
            || d.contains("double")
            || d.contains("real")
            || d.contains("money") =>
        {
            UiType::Decimal
        }
        d if d.contains("timestamp") || d.contains("datetime") => UiType::DateTime,
        d if d.contains("date") => UiType::Date,
        d if d.contains("text") || d.contains("clob") => UiType::LongText,
        _ => UiType::SingleLineText,
    }
}

/// Build the graph slice for one source from introspected schema, then
/// synthesize many-to-many relations.
pub async fn populate_source(
    store: &mut MetaStore,
    introspector: &dyn SchemaIntrospector,
    source_id: &SourceId,
) -> Result<PopulateReport, PopulateError> {
    let source = store.source(source_id)?.clone();
    let mut report = PopulateReport::default();

    let tables = introspector.table_list().await?;
    let names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
    let column_lists = introspector.column_lists(&names).await?;

    // (table, column) -> column id, for resolving foreign-key pairs
    // afterwards.
    let mut column_by_name: HashMap<(String, String), ColumnId> = HashMap::new();

    for (table, columns) in tables.iter().zip(column_lists) {
        let mut model = Model::new(
            source.base_id.clone(),
            source.id.clone(),
            table.name.clone(),
            table.name.to_title_case(),
        );
        if table.is_view {
            model = model.as_view();
        }
        let model = store.create_model(model)?;
        debug!(table = %table.name, model = %model.id, "populated model");

        let mut saw_pv = false;
        for col in columns {
            let uidt = if col.pk {
                UiType::Id
            } else {
                uidt_for_dt(&col.dt)
            };
            let mut column = Column::new(
                model.id.clone(),
                col.name.clone(),
                col.name.to_title_case(),
                uidt,
            )
            .with_dt(col.dt.clone());
            column.pk = col.pk;
            column.rqd = !col.nullable || col.pk;
            // first text-ish column becomes the display value
            if !saw_pv && !col.pk && matches!(uidt, UiType::SingleLineText | UiType::LongText)
            {
                column = column.primary_value();
                saw_pv = true;
            }
            let column = store.add_column(column)?;
            column_by_name.insert((table.name.clone(), col.name.clone()), column.id);
        }

        report.tables += 1;
    }

    // Foreign keys become a has-many column on the parent and a
    // belongs-to column on the child.
    for rel in introspector.relation_list().await? {
        let parent = column_by_name.get(&(rel.ref_table.clone(), rel.ref_column.clone()));
        let child = column_by_name.get(&(rel.table.clone(), rel.column.clone()));
        let (Some(parent), Some(child)) = (parent, child) else {
            debug!(
                table = %rel.table,
                column = %rel.column,
                "skipping foreign key with unknown endpoint"
            );
            continue;
        };
        let parent = parent.clone();
        let child = child.clone();
        store.insert_relation_column(
            RelationType::HasMany,
            &parent,
            &child,
            LinkMeta::default(),
        )?;
        store.insert_relation_column(
            RelationType::BelongsTo,
            &parent,
            &child,
            LinkMeta::default(),
        )?;
        report.relations += 1;
    }

    let synthesis = synthesize_many_to_many(store, source_id)?;
    report.junctions = synthesis.promoted.len();

    info!(
        source = %source_id,
        tables = report.tables,
        relations = report.relations,
        junctions = report.junctions,
        "populated source"
    );
    Ok(report)
}
