//! Export/import round trips and data streaming.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use trellis::export::{import_models, ExportError, Exporter};
use trellis::meta::junction::synthesize_many_to_many;
use trellis::meta::store::LinkMeta;
use trellis::meta::{
    Column, ColumnOptions, ComparisonOp, Filter, LogicalOp, MetaStore, Model, ModelId,
    RelationOptions, RelationType, Sort, SortDirection, Source, UiType, View,
};
use trellis::provider::{ProviderError, ProviderResult, Record, RecordPager};
use trellis::sql::dialect::Dialect;

struct Fixture {
    store: MetaStore,
    customer: ModelId,
    invoice: ModelId,
    category: ModelId,
}

/// Customer 1--* Invoice, Invoice *--* Category (via synthesized
/// junction), plus a formula, a lookup, and a filtered/sorted view.
fn rich_fixture() -> Fixture {
    let mut store = MetaStore::new();
    let base = store.create_base("billing");
    let source = store
        .create_source(Source::new(base.id.clone(), "main", Dialect::Postgres))
        .unwrap();

    let customer = store
        .create_model(Model::new(
            base.id.clone(),
            source.id.clone(),
            "customers",
            "Customer",
        ))
        .unwrap();
    let invoice = store
        .create_model(Model::new(
            base.id.clone(),
            source.id.clone(),
            "invoices",
            "Invoice",
        ))
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

    let customer_pk = store
        .add_column(Column::new(customer.id.clone(), "id", "Id", UiType::Id).primary_key())
        .unwrap();
    let customer_name = store
        .add_column(
            Column::new(
                customer.id.clone(),
                "name",
                "Name",
                UiType::SingleLineText,
            )
            .primary_value(),
        )
        .unwrap();

    let invoice_pk = store
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

    let category_pk = store
        .add_column(Column::new(category.id.clone(), "id", "Id", UiType::Id).primary_key())
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

    // Customer 1--* Invoice
    store
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

    // Bridge to Category.
    for (pk, fk) in [(&invoice_pk, &j_invoice), (&category_pk, &j_category)] {
        store
            .insert_relation_column(RelationType::HasMany, &pk.id, &fk.id, LinkMeta::default())
            .unwrap();
        store
            .insert_relation_column(RelationType::BelongsTo, &pk.id, &fk.id, LinkMeta::default())
            .unwrap();
    }
    synthesize_many_to_many(&mut store, &source.id).unwrap();

    // Formula and lookup.
    store
        .add_column(
            Column::new(
                invoice.id.clone(),
                "gross",
                "Gross",
                UiType::Formula,
            )
            .with_options(ColumnOptions::Formula {
                body: format!("{{{{{}}}}} * 1.2", invoice_total.id),
            }),
        )
        .unwrap();
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

    // A filtered, sorted view.
    let view = store
        .create_view(View::new(invoice.id.clone(), "Open").as_default())
        .unwrap();
    store
        .add_filter(
            Filter::leaf(
                invoice_total.id.clone(),
                ComparisonOp::Gt,
                Some(Value::from(0)),
            )
            .in_view(view.id.clone()),
        )
        .unwrap();
    let group = store
        .add_filter(Filter::group(LogicalOp::Or).in_view(view.id.clone()))
        .unwrap();
    store
        .add_filter(
            Filter::leaf(invoice_fk.id.clone(), ComparisonOp::Notblank, None)
                .in_view(view.id.clone())
                .under(group.id.clone()),
        )
        .unwrap();
    store
        .add_sort(Sort::new(
            view.id.clone(),
            invoice_total.id.clone(),
            SortDirection::Desc,
        ))
        .unwrap();

    Fixture {
        store,
        customer: customer.id,
        invoice: invoice.id,
        category: category.id,
    }
}

/// Column (title, uidt) pairs, sorted, with system columns included.
fn column_shape(store: &MetaStore, model: &ModelId) -> Vec<(String, UiType)> {
    let mut shape: Vec<(String, UiType)> = store
        .model_columns(model)
        .unwrap()
        .iter()
        .map(|c| (c.title.clone(), c.uidt))
        .collect();
    shape.sort();
    shape
}

#[test]
fn export_import_round_trip_is_isomorphic() {
    let fx = rich_fixture();
    let exporter = Exporter::new(&fx.store);
    let graph = exporter
        .serialize_models(&[
            fx.customer.clone(),
            fx.invoice.clone(),
            fx.category.clone(),
        ])
        .unwrap();

    // The junction came along with the requested models.
    assert_eq!(graph.models.len(), 4);

    // Every cross-reference is a structured path now.
    for model in &graph.models {
        assert_eq!(
            trellis::export::idmap::split_path(&model.id).len(),
            3,
            "model id should be base::source::model"
        );
        for column in &model.columns {
            if let Some(rel) = column.relation() {
                assert!(rel.fk_parent_column_id.as_str().contains("::"));
                assert!(rel.fk_child_column_id.as_str().contains("::"));
            }
        }
    }

    // Reconstitute into a fresh installation.
    let mut target = MetaStore::new();
    let base = target.create_base("restored");
    let source = target
        .create_source(Source::new(base.id.clone(), "main", Dialect::MySql))
        .unwrap();
    let created = import_models(&mut target, &graph, &base.id, &source.id).unwrap();
    assert_eq!(created.len(), 4);

    // Same tables, same column shapes, up to id renaming.
    for exported in &graph.models {
        let restored = target
            .list_models_with_junctions(&source.id)
            .into_iter()
            .find(|m| m.table_name == exported.table_name)
            .expect("every exported table is restored");
        assert_eq!(restored.mm, exported.mm);
        assert_eq!(restored.title, exported.title);
    }

    let original_invoice_shape = column_shape(&fx.store, &fx.invoice);
    let restored_invoice = target
        .list_models_with_junctions(&source.id)
        .into_iter()
        .find(|m| m.table_name == "invoices")
        .unwrap();
    assert_eq!(
        column_shape(&target, &restored_invoice.id),
        original_invoice_shape
    );

    // Relation kinds and junction wiring survive.
    let restored_links: Vec<RelationOptions> = target
        .model_columns(&restored_invoice.id)
        .unwrap()
        .iter()
        .filter_map(|c| c.relation().cloned())
        .collect();
    assert!(restored_links
        .iter()
        .any(|r| r.kind == RelationType::BelongsTo));
    let mm = restored_links
        .iter()
        .find(|r| r.kind == RelationType::ManyToMany)
        .expect("many-to-many link restored");
    let junction = target.model(mm.fk_mm_model_id.as_ref().unwrap()).unwrap();
    assert!(junction.mm);
    assert_eq!(junction.table_name, "invoice_categories");

    // The formula references the restored column's concrete id.
    let restored_total = target
        .model_columns(&restored_invoice.id)
        .unwrap()
        .iter()
        .find(|c| c.title == "Total")
        .unwrap()
        .clone();
    let formula = target
        .model_columns(&restored_invoice.id)
        .unwrap()
        .iter()
        .find(|c| c.uidt == UiType::Formula)
        .unwrap()
        .clone();
    match &formula.options {
        ColumnOptions::Formula { body } => {
            assert_eq!(body, &format!("{{{{{}}}}} * 1.2", restored_total.id));
        }
        other => panic!("expected formula options, got {other:?}"),
    }

    // The view, its filter tree and its sort list are wired to new ids.
    let views = target.model_views(&restored_invoice.id);
    assert_eq!(views.len(), 1);
    let filters = target.view_filters(&views[0].id);
    assert_eq!(filters.len(), 3);
    let group = filters.iter().find(|f| f.is_group).unwrap();
    assert!(group.comparison_op.is_none());
    let nested: Vec<&Filter> = filters
        .iter()
        .filter(|f| f.fk_parent_id.as_ref() == Some(&group.id))
        .collect();
    assert_eq!(nested.len(), 1);
    assert_eq!(nested[0].comparison_op, Some(ComparisonOp::Notblank));
    let sorts = target.view_sorts(&views[0].id);
    assert_eq!(sorts.len(), 1);
    assert!(target.column(&sorts[0].fk_column_id).is_ok());
}

// =============================================================================
// Data streaming
// =============================================================================

struct StaticPager {
    /// table name -> rows
    rows: HashMap<String, Vec<Record>>,
    /// pk -> related keys, served for every many-to-many link
    links: HashMap<String, Vec<String>>,
    /// table name that fails mid-stream
    poison: Option<String>,
}

#[async_trait]
impl RecordPager for StaticPager {
    async fn fetch_page(
        &self,
        model: &Model,
        _columns: &[Column],
        offset: u64,
        limit: u64,
    ) -> ProviderResult<Vec<Record>> {
        if self.poison.as_deref() == Some(model.table_name.as_str()) {
            return Err(ProviderError::Query("connection reset".into()));
        }
        let rows = self.rows.get(&model.table_name).cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn related_keys(
        &self,
        _link: &RelationOptions,
        parent_keys: &[String],
    ) -> ProviderResult<HashMap<String, Vec<String>>> {
        Ok(parent_keys
            .iter()
            .filter_map(|k| self.links.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }
}

fn record(pairs: &[(&str, Value)]) -> Record {
    let mut record = Record::new();
    for (key, value) in pairs {
        record.insert(*key, value.clone());
    }
    record
}

fn temp_root() -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "trellis-export-{}",
        uuid::Uuid::new_v4().simple()
    ))
}

#[tokio::test]
async fn data_streams_page_sequentially_with_links() {
    let fx = rich_fixture();
    let mut rows = HashMap::new();
    rows.insert(
        "invoices".to_string(),
        vec![
            record(&[("id", Value::from(1)), ("total", Value::from(10))]),
            record(&[("id", Value::from(2)), ("total", Value::from(20))]),
            record(&[("id", Value::from(3)), ("total", Value::from(30))]),
        ],
    );
    let mut links = HashMap::new();
    links.insert("1".to_string(), vec!["c1".to_string(), "c2".to_string()]);
    links.insert("3".to_string(), vec!["c2".to_string()]);

    let pager = StaticPager {
        rows,
        links,
        poison: None,
    };
    let root = temp_root();

    let exporter = Exporter::new(&fx.store).with_page_size(2);
    exporter
        .export_to_dir(&pager, &[fx.invoice.clone()], &root)
        .await
        .unwrap();

    let source = fx.store.model(&fx.invoice).unwrap().source_id.clone();
    let base = fx.store.model(&fx.invoice).unwrap().base_id.clone();
    let data_dir = root
        .join("export")
        .join(source.as_str())
        .join(base.as_str())
        .join("data");

    let data = std::fs::read_to_string(data_dir.join(format!("{}.csv", fx.invoice))).unwrap();
    let lines: Vec<&str> = data.lines().collect();
    // one header plus three rows, header written exactly once
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("::"), "header carries structured paths");
    assert!(lines[1].contains("10"));
    assert!(lines[3].contains("30"));

    let links_csv =
        std::fs::read_to_string(data_dir.join(format!("{}_links.csv", fx.invoice))).unwrap();
    let link_lines: Vec<&str> = links_csv.lines().collect();
    assert_eq!(link_lines.len(), 4);
    assert_eq!(link_lines[0].split(',').next(), Some("pk"));
    assert!(link_lines[1].starts_with("1,"));
    assert!(link_lines[1].contains("\"c1,c2\""));
    // row without membership still appears, with an empty cell
    assert!(link_lines[2].starts_with("2,"));

    let schema = std::fs::read_to_string(
        root.join("export")
            .join(source.as_str())
            .join(base.as_str())
            .join("schema.json"),
    )
    .unwrap();
    assert!(schema.contains("\"table_name\": \"invoices\""));

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn failing_model_cleans_its_artifacts_and_aborts() {
    let fx = rich_fixture();
    let mut rows = HashMap::new();
    rows.insert(
        "customers".to_string(),
        vec![record(&[("id", Value::from(1)), ("name", Value::from("ada"))])],
    );

    let pager = StaticPager {
        rows,
        links: HashMap::new(),
        poison: Some("invoices".to_string()),
    };
    let root = temp_root();

    let exporter = Exporter::new(&fx.store);
    let err = exporter
        .export_to_dir(&pager, &[fx.customer.clone(), fx.invoice.clone()], &root)
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Incomplete { .. }));

    let source = fx.store.model(&fx.invoice).unwrap().source_id.clone();
    let base = fx.store.model(&fx.invoice).unwrap().base_id.clone();
    let data_dir = root
        .join("export")
        .join(source.as_str())
        .join(base.as_str())
        .join("data");

    // The completed model's artifact stands; the failed one is gone.
    assert!(data_dir.join(format!("{}.csv", fx.customer)).exists());
    assert!(!data_dir.join(format!("{}.csv", fx.invoice)).exists());

    let _ = std::fs::remove_dir_all(&root);
}
