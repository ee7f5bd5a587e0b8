//! Many-to-many synthesis scenarios.

use trellis::meta::junction::synthesize_many_to_many;
use trellis::meta::store::LinkMeta;
use trellis::meta::{
    Column, ColumnId, MetaStore, Model, ModelId, RelationType, Source, UiType,
};
use trellis::sql::dialect::Dialect;

struct Fixture {
    store: MetaStore,
    source: trellis::meta::SourceId,
    invoice: ModelId,
    category: ModelId,
    junction: ModelId,
}

/// Invoice and Category bridged by InvoiceCategory: two belongs-to
/// columns plus a plain note column (four plain columns in total).
fn bridged_fixture() -> Fixture {
    let mut store = MetaStore::new();
    let base = store.create_base("billing");
    let source = store
        .create_source(Source::new(base.id.clone(), "main", Dialect::MySql))
        .unwrap();

    let invoice = store
        .create_model(Model::new(base.id.clone(), source.id.clone(), "invoices", "Invoice"))
        .unwrap();
    let category = store
        .create_model(Model::new(
            base.id.clone(),
            source.id.clone(),
            "categories",
            "Category",
        ))
        .unwrap();
    let junction = store
        .create_model(Model::new(
            base.id.clone(),
            source.id.clone(),
            "invoice_categories",
            "Invoice Category",
        ))
        .unwrap();

    let invoice_pk = store
        .add_column(Column::new(invoice.id.clone(), "id", "Id", UiType::Id).primary_key())
        .unwrap();
    let category_pk = store
        .add_column(Column::new(category.id.clone(), "id", "Id", UiType::Id).primary_key())
        .unwrap();

    store
        .add_column(Column::new(junction.id.clone(), "id", "Id", UiType::Id).primary_key())
        .unwrap();
    let j_invoice = store
        .add_column(Column::new(
            junction.id.clone(),
            "invoice_id",
            "Invoice Id",
            UiType::Number,
        ))
        .unwrap();
    let j_category = store
        .add_column(Column::new(
            junction.id.clone(),
            "category_id",
            "Category Id",
            UiType::Number,
        ))
        .unwrap();
    store
        .add_column(Column::new(
            junction.id.clone(),
            "note",
            "Note",
            UiType::SingleLineText,
        ))
        .unwrap();

    for (pk, fk) in [(&invoice_pk, &j_invoice), (&category_pk, &j_category)] {
        store
            .insert_relation_column(RelationType::HasMany, &pk.id, &fk.id, LinkMeta::default())
            .unwrap();
        store
            .insert_relation_column(RelationType::BelongsTo, &pk.id, &fk.id, LinkMeta::default())
            .unwrap();
    }

    Fixture {
        store,
        source: source.id,
        invoice: invoice.id,
        category: category.id,
        junction: junction.id,
    }
}

fn mm_column_titled(store: &MetaStore, model: &ModelId, title: &str) -> Option<ColumnId> {
    store
        .model_columns(model)
        .unwrap()
        .iter()
        .find(|c| {
            c.title == title
                && c.relation()
                    .is_some_and(|r| r.kind == RelationType::ManyToMany)
        })
        .map(|c| c.id.clone())
}

#[test]
fn bridge_table_is_promoted_to_many_to_many() {
    let mut fx = bridged_fixture();
    let report = synthesize_many_to_many(&mut fx.store, &fx.source).unwrap();

    assert_eq!(report.promoted, vec![fx.junction.clone()]);
    assert_eq!(report.columns_created, 2);

    // Invoice gains Categories, Category gains Invoices.
    let categories = mm_column_titled(&fx.store, &fx.invoice, "Categories")
        .expect("Invoice should gain a Categories link");
    let invoices = mm_column_titled(&fx.store, &fx.category, "Invoices")
        .expect("Category should gain an Invoices link");

    // The pair is a proper inverse through the junction.
    let rel_a = fx
        .store
        .column(&categories)
        .unwrap()
        .relation()
        .unwrap()
        .clone();
    let rel_b = fx
        .store
        .column(&invoices)
        .unwrap()
        .relation()
        .unwrap()
        .clone();
    assert_eq!(rel_a.fk_mm_model_id.as_ref(), Some(&fx.junction));
    assert!(rel_a.is_inverse_of(&rel_b));

    // The junction is flagged and hidden.
    assert!(fx.store.model(&fx.junction).unwrap().mm);
    assert!(fx
        .store
        .list_models(&fx.source)
        .iter()
        .all(|m| m.id != fx.junction));

    // The superseded has-many columns went system on both sides.
    for model in [&fx.invoice, &fx.category] {
        let hidden_hm = fx
            .store
            .model_columns(model)
            .unwrap()
            .iter()
            .filter(|c| {
                c.relation()
                    .is_some_and(|r| r.kind == RelationType::HasMany)
            })
            .all(|c| c.system);
        assert!(hidden_hm, "has-many link should be hidden on {model}");
    }
}

#[test]
fn synthesis_is_idempotent() {
    let mut fx = bridged_fixture();
    synthesize_many_to_many(&mut fx.store, &fx.source).unwrap();

    let before: Vec<_> = fx
        .store
        .model_columns(&fx.invoice)
        .unwrap()
        .iter()
        .map(|c| (c.id.clone(), c.system))
        .collect();

    let second = synthesize_many_to_many(&mut fx.store, &fx.source).unwrap();
    assert_eq!(second.columns_created, 0);
    assert!(second.promoted.is_empty());
    assert!(second.demoted.is_empty());

    let after: Vec<_> = fx
        .store
        .model_columns(&fx.invoice)
        .unwrap()
        .iter()
        .map(|c| (c.id.clone(), c.system))
        .collect();
    assert_eq!(before, after);
    assert!(fx.store.model(&fx.junction).unwrap().mm);
}

#[test]
fn widened_bridge_is_demoted() {
    let mut fx = bridged_fixture();
    synthesize_many_to_many(&mut fx.store, &fx.source).unwrap();
    assert!(fx.store.model(&fx.junction).unwrap().mm);

    // A fifth plain column breaks the bridge-table shape.
    fx.store
        .add_column(Column::new(
            fx.junction.clone(),
            "weight",
            "Weight",
            UiType::Number,
        ))
        .unwrap();

    let report = synthesize_many_to_many(&mut fx.store, &fx.source).unwrap();
    assert_eq!(report.demoted, vec![fx.junction.clone()]);
    assert!(!fx.store.model(&fx.junction).unwrap().mm);
}

#[test]
fn narrow_tables_without_two_belongs_to_are_ignored() {
    let mut store = MetaStore::new();
    let base = store.create_base("b");
    let source = store
        .create_source(Source::new(base.id.clone(), "main", Dialect::Sqlite))
        .unwrap();
    let lone = store
        .create_model(Model::new(base.id.clone(), source.id.clone(), "lone", "Lone"))
        .unwrap();
    store
        .add_column(Column::new(lone.id.clone(), "id", "Id", UiType::Id).primary_key())
        .unwrap();

    let report = synthesize_many_to_many(&mut store, &source.id).unwrap();
    assert!(report.promoted.is_empty());
    assert_eq!(report.columns_created, 0);
    assert!(!store.model(&lone.id).unwrap().mm);
}
