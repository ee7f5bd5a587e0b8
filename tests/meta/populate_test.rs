//! Populating a source from introspected schema.

use async_trait::async_trait;
use trellis::meta::populate::populate_source;
use trellis::meta::{MetaStore, RelationType, Source, UiType};
use trellis::provider::{
    IntrospectedColumn, IntrospectedRelation, IntrospectedTable, ProviderResult,
    SchemaIntrospector,
};
use trellis::sql::dialect::Dialect;

struct StaticIntrospector;

fn col(name: &str, dt: &str, pk: bool) -> IntrospectedColumn {
    IntrospectedColumn {
        name: name.into(),
        dt: dt.into(),
        pk,
        nullable: !pk,
    }
}

#[async_trait]
impl SchemaIntrospector for StaticIntrospector {
    async fn table_list(&self) -> ProviderResult<Vec<IntrospectedTable>> {
        Ok(["invoices", "categories", "invoice_categories"]
            .into_iter()
            .map(|name| IntrospectedTable {
                name: name.into(),
                is_view: false,
            })
            .collect())
    }

    async fn column_list(&self, table: &str) -> ProviderResult<Vec<IntrospectedColumn>> {
        Ok(match table {
            "invoices" => vec![
                col("id", "bigint", true),
                col("reference", "varchar(64)", false),
                col("total", "numeric(10,2)", false),
                col("issued_on", "date", false),
                col("meta", "json", false),
            ],
            "categories" => vec![col("id", "bigint", true), col("name", "varchar(64)", false)],
            "invoice_categories" => vec![
                col("id", "bigint", true),
                col("invoice_id", "bigint", false),
                col("category_id", "bigint", false),
                col("note", "varchar(255)", false),
            ],
            _ => vec![],
        })
    }

    async fn relation_list(&self) -> ProviderResult<Vec<IntrospectedRelation>> {
        Ok(vec![
            IntrospectedRelation {
                table: "invoice_categories".into(),
                column: "invoice_id".into(),
                ref_table: "invoices".into(),
                ref_column: "id".into(),
            },
            IntrospectedRelation {
                table: "invoice_categories".into(),
                column: "category_id".into(),
                ref_table: "categories".into(),
                ref_column: "id".into(),
            },
        ])
    }
}

#[tokio::test]
async fn populate_builds_models_relations_and_junctions() {
    let mut store = MetaStore::new();
    let base = store.create_base("billing");
    let source = store
        .create_source(Source::new(base.id.clone(), "warehouse", Dialect::Postgres))
        .unwrap();

    let report = populate_source(&mut store, &StaticIntrospector, &source.id)
        .await
        .unwrap();

    assert_eq!(report.tables, 3);
    assert_eq!(report.relations, 2);
    assert_eq!(report.junctions, 1);

    // Logical types mapped from physical descriptors.
    let invoices = store
        .list_models(&source.id)
        .into_iter()
        .find(|m| m.table_name == "invoices")
        .unwrap();
    let columns = store.model_columns(&invoices.id).unwrap();
    let uidt_of = |name: &str| {
        columns
            .iter()
            .find(|c| c.column_name == name)
            .map(|c| c.uidt)
    };
    assert_eq!(uidt_of("id"), Some(UiType::Id));
    assert_eq!(uidt_of("total"), Some(UiType::Decimal));
    assert_eq!(uidt_of("issued_on"), Some(UiType::Date));
    assert_eq!(uidt_of("meta"), Some(UiType::Json));
    assert_eq!(uidt_of("reference"), Some(UiType::SingleLineText));

    // The bridge was promoted: invoices gained a many-to-many link to
    // categories.
    let mm = columns
        .iter()
        .find(|c| {
            c.relation()
                .is_some_and(|r| r.kind == RelationType::ManyToMany)
        })
        .expect("invoices should carry a synthesized link");
    let junction = store
        .model(mm.relation().unwrap().fk_mm_model_id.as_ref().unwrap())
        .unwrap();
    assert!(junction.mm);
    assert_eq!(junction.table_name, "invoice_categories");

    // The junction stays out of normal listings.
    assert!(store
        .list_models(&source.id)
        .iter()
        .all(|m| m.table_name != "invoice_categories"));
}

#[tokio::test]
async fn populate_is_stable_under_resynthesis() {
    let mut store = MetaStore::new();
    let base = store.create_base("billing");
    let source = store
        .create_source(Source::new(base.id.clone(), "warehouse", Dialect::MySql))
        .unwrap();
    populate_source(&mut store, &StaticIntrospector, &source.id)
        .await
        .unwrap();

    let before = store.all_columns().len();
    let report =
        trellis::meta::junction::synthesize_many_to_many(&mut store, &source.id).unwrap();
    assert_eq!(report.columns_created, 0);
    assert_eq!(store.all_columns().len(), before);
}
