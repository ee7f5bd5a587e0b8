//! Relation graph store integration tests: cascade deletion ordering,
//! default-source protection, junction visibility.

use trellis::meta::{
    Column, ColumnOptions, MetaError, MetaStore, Model, RelationType, Source, UiType, View,
};
use trellis::meta::store::LinkMeta;
use trellis::sql::dialect::Dialect;

fn store_with_source() -> (MetaStore, trellis::meta::BaseId, trellis::meta::SourceId) {
    let mut store = MetaStore::new();
    let base = store.create_base("crm");
    let source = store
        .create_source(Source::new(base.id.clone(), "main", Dialect::Postgres))
        .unwrap();
    (store, base.id, source.id)
}

/// Every cross-reference held by a surviving column must resolve.
fn assert_no_dangling_references(store: &MetaStore) {
    for column in store.all_columns() {
        match &column.options {
            ColumnOptions::Relation(rel) => {
                assert!(
                    store.model(&rel.fk_related_model_id).is_ok(),
                    "column {} references a deleted model",
                    column.title
                );
                assert!(
                    store.column(&rel.fk_parent_column_id).is_ok(),
                    "column {} references a deleted parent column",
                    column.title
                );
                assert!(
                    store.column(&rel.fk_child_column_id).is_ok(),
                    "column {} references a deleted child column",
                    column.title
                );
                if let Some(junction) = &rel.fk_mm_model_id {
                    assert!(store.model(junction).is_ok());
                }
            }
            ColumnOptions::Lookup {
                fk_relation_column_id,
                fk_lookup_column_id,
            } => {
                assert!(store.column(fk_relation_column_id).is_ok());
                assert!(store.column(fk_lookup_column_id).is_ok());
            }
            ColumnOptions::Rollup {
                fk_relation_column_id,
                fk_rollup_column_id,
                ..
            } => {
                assert!(store.column(fk_relation_column_id).is_ok());
                assert!(store.column(fk_rollup_column_id).is_ok());
            }
            _ => {}
        }
    }
}

#[test]
fn model_lookup_miss_is_not_found() {
    let (store, _, _) = store_with_source();
    let missing = trellis::meta::ModelId::generate();
    assert!(matches!(
        store.model(&missing),
        Err(MetaError::NotFound { .. })
    ));
}

#[test]
fn cascade_delete_honors_priority_order() {
    // Customer 1--* Invoice; a rollup on Customer aggregates invoice
    // totals through the relation, and a lookup on Invoice projects the
    // rollup back. Deleting either model must not leave an option row
    // pointing at a deleted column.
    let (mut store, base, source) = store_with_source();

    let customer = store
        .create_model(Model::new(base.clone(), source.clone(), "customers", "Customer"))
        .unwrap();
    let invoice = store
        .create_model(Model::new(base.clone(), source.clone(), "invoices", "Invoice"))
        .unwrap();

    let customer_pk = store
        .add_column(Column::new(customer.id.clone(), "id", "Id", UiType::Id).primary_key())
        .unwrap();
    let _invoice_pk = store
        .add_column(Column::new(invoice.id.clone(), "id", "Id", UiType::Id).primary_key())
        .unwrap();
    let invoice_total = store
        .add_column(Column::new(
            invoice.id.clone(),
            "total",
            "Total",
            UiType::Decimal,
        ))
        .unwrap();
    let invoice_fk = store
        .add_column(Column::new(
            invoice.id.clone(),
            "customer_id",
            "Customer Id",
            UiType::Number,
        ))
        .unwrap();

    let invoices_link = store
        .insert_relation_column(
            RelationType::HasMany,
            &customer_pk.id,
            &invoice_fk.id,
            LinkMeta::default(),
        )
        .unwrap();
    let customer_link = store
        .insert_relation_column(
            RelationType::BelongsTo,
            &customer_pk.id,
            &invoice_fk.id,
            LinkMeta::default(),
        )
        .unwrap();

    // Rollup on Customer through the has-many link.
    let rollup = store
        .add_column(
            Column::new(
                customer.id.clone(),
                "invoice_total",
                "Invoice Total",
                UiType::Rollup,
            )
            .with_options(ColumnOptions::Rollup {
                fk_relation_column_id: invoices_link.id.clone(),
                fk_rollup_column_id: invoice_total.id.clone(),
                rollup_function: "sum".into(),
            }),
        )
        .unwrap();

    // Lookup on Invoice projecting the rollup through the belongs-to.
    store
        .add_column(
            Column::new(
                invoice.id.clone(),
                "customer_total",
                "Customer Total",
                UiType::Lookup,
            )
            .with_options(ColumnOptions::Lookup {
                fk_relation_column_id: customer_link.id.clone(),
                fk_lookup_column_id: rollup.id.clone(),
            }),
        )
        .unwrap();

    assert_no_dangling_references(&store);

    store.delete_model(&invoice.id).unwrap();
    assert_no_dangling_references(&store);

    // The rollup anchored on the now-gone relation went with it.
    let remaining = store.model_columns(&customer.id).unwrap();
    assert!(remaining.iter().all(|c| c.uidt != UiType::Rollup));
    assert!(remaining
        .iter()
        .all(|c| c.uidt != UiType::LinkToAnotherRecord));

    store.delete_model(&customer.id).unwrap();
    assert_no_dangling_references(&store);
    assert!(store.all_columns().is_empty());
}

#[test]
fn deleting_relation_column_keeps_inverse_if_referenced() {
    let (mut store, base, source) = store_with_source();

    let customer = store
        .create_model(Model::new(base.clone(), source.clone(), "customers", "Customer"))
        .unwrap();
    let invoice = store
        .create_model(Model::new(base.clone(), source.clone(), "invoices", "Invoice"))
        .unwrap();
    let customer_pk = store
        .add_column(Column::new(customer.id.clone(), "id", "Id", UiType::Id).primary_key())
        .unwrap();
    let customer_name = store
        .add_column(Column::new(
            customer.id.clone(),
            "name",
            "Name",
            UiType::SingleLineText,
        ))
        .unwrap();
    let invoice_fk = store
        .add_column(Column::new(
            invoice.id.clone(),
            "customer_id",
            "Customer Id",
            UiType::Number,
        ))
        .unwrap();

    let invoices_link = store
        .insert_relation_column(
            RelationType::HasMany,
            &customer_pk.id,
            &invoice_fk.id,
            LinkMeta::default(),
        )
        .unwrap();
    let customer_link = store
        .insert_relation_column(
            RelationType::BelongsTo,
            &customer_pk.id,
            &invoice_fk.id,
            LinkMeta::default(),
        )
        .unwrap();

    // A lookup keeps the belongs-to side alive.
    store
        .add_column(
            Column::new(
                invoice.id.clone(),
                "customer_name",
                "Customer Name",
                UiType::Lookup,
            )
            .with_options(ColumnOptions::Lookup {
                fk_relation_column_id: customer_link.id.clone(),
                fk_lookup_column_id: customer_name.id.clone(),
            }),
        )
        .unwrap();

    store.delete_column(&invoices_link.id).unwrap();

    // The inverse survives because the lookup still references it.
    assert!(store.column(&customer_link.id).is_ok());
    assert_no_dangling_references(&store);
}

#[test]
fn default_source_cannot_be_deleted_while_siblings_exist() {
    let mut store = MetaStore::new();
    let base = store.create_base("crm");
    let meta_source = store
        .create_source(Source::new(base.id.clone(), "meta", Dialect::Sqlite).as_meta())
        .unwrap();
    let external = store
        .create_source(Source::new(base.id.clone(), "warehouse", Dialect::MySql))
        .unwrap();

    assert!(matches!(
        store.delete_source(&meta_source.id, false),
        Err(MetaError::StructuralConflict(_))
    ));

    // Non-default sources delete freely.
    store.delete_source(&external.id, false).unwrap();
    // With no siblings left, the default deletes too.
    store.delete_source(&meta_source.id, false).unwrap();
}

#[test]
fn junction_models_are_hidden_from_listings() {
    let (mut store, base, source) = store_with_source();
    let model = store
        .create_model(Model::new(base.clone(), source.clone(), "plain", "Plain"))
        .unwrap();
    let bridge = store
        .create_model(Model::new(base.clone(), source.clone(), "bridge", "Bridge"))
        .unwrap();
    store.mark_as_junction_model(&bridge.id, true).unwrap();

    let visible = store.list_models(&source);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, model.id);

    let all = store.list_models_with_junctions(&source);
    assert_eq!(all.len(), 2);
}

#[test]
fn views_and_filters_are_removed_with_their_model() {
    let (mut store, base, source) = store_with_source();
    let model = store
        .create_model(Model::new(base.clone(), source.clone(), "tasks", "Task"))
        .unwrap();
    let column = store
        .add_column(Column::new(
            model.id.clone(),
            "name",
            "Name",
            UiType::SingleLineText,
        ))
        .unwrap();
    let view = store
        .create_view(View::new(model.id.clone(), "Default").as_default())
        .unwrap();
    store
        .add_filter(
            trellis::meta::Filter::leaf(
                column.id.clone(),
                trellis::meta::ComparisonOp::Notblank,
                None,
            )
            .in_view(view.id.clone()),
        )
        .unwrap();

    store.delete_model(&model.id).unwrap();
    assert!(store.view(&view.id).is_err());
    assert!(store.view_filters(&view.id).is_empty());
}
