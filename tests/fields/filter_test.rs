//! Filter compilation across (logical type, dialect) pairs.

use serde_json::{json, Value};
use trellis::fields::{compile_filter, default_registry, FieldError, FilterContext};
use trellis::meta::{
    Column, ColumnId, ComparisonOp, Filter, MetaStore, Model, Source, UiType,
};
use trellis::sql::dialect::Dialect;

const ALL_UITYPES: [UiType; 18] = [
    UiType::Id,
    UiType::SingleLineText,
    UiType::LongText,
    UiType::Number,
    UiType::Decimal,
    UiType::Checkbox,
    UiType::SingleSelect,
    UiType::MultiSelect,
    UiType::Date,
    UiType::DateTime,
    UiType::Duration,
    UiType::Attachment,
    UiType::Json,
    UiType::Formula,
    UiType::Lookup,
    UiType::Rollup,
    UiType::LinkToAnotherRecord,
    UiType::ForeignKey,
];

fn column_of(uidt: UiType) -> Column {
    Column::new(
        trellis::meta::ModelId::generate(),
        "field",
        "Field",
        uidt,
    )
}

/// For every registered (type, dialect) pair: operators in the handler's
/// declared set verify cleanly, operators outside it always fail with
/// `UnsupportedOperator`.
#[test]
fn operator_sets_are_total() {
    let registry = default_registry();

    for uidt in ALL_UITYPES {
        for dialect in Dialect::ALL {
            let Some(handler) = registry.resolve(uidt, dialect) else {
                continue;
            };
            let supported = handler.supported_operators();
            let column = column_of(uidt);
            let ctx = FilterContext::new(dialect);

            for op in ComparisonOp::ALL {
                let filter = Filter::leaf(
                    ColumnId::generate(),
                    op,
                    Some(Value::String("probe".into())),
                );
                let verdict = handler.verify_filter(&ctx, &column, &filter);
                if supported.contains(&op) {
                    assert!(
                        verdict.is_ok(),
                        "{uidt}/{dialect}: declared operator {op} was rejected"
                    );
                } else {
                    assert!(
                        matches!(verdict, Err(FieldError::UnsupportedOperator { .. })),
                        "{uidt}/{dialect}: undeclared operator {op} was accepted"
                    );
                }
            }
        }
    }
}

fn compile_on(
    store: &MetaStore,
    dialect: Dialect,
    filter: &Filter,
) -> Result<String, FieldError> {
    let ctx = FilterContext::new(dialect);
    compile_filter(default_registry(), store, &ctx, filter).map(|ts| ts.serialize(dialect))
}

struct Fixture {
    store: MetaStore,
    json_col: ColumnId,
    text_col: ColumnId,
}

fn fixture() -> Fixture {
    let mut store = MetaStore::new();
    let base = store.create_base("b");
    let source = store
        .create_source(Source::new(base.id.clone(), "main", Dialect::Postgres))
        .unwrap();
    let model = store
        .create_model(Model::new(base.id.clone(), source.id.clone(), "rows", "Row"))
        .unwrap();
    let json_col = store
        .add_column(Column::new(
            model.id.clone(),
            "payload",
            "Payload",
            UiType::Json,
        ))
        .unwrap();
    let text_col = store
        .add_column(Column::new(
            model.id.clone(),
            "name",
            "Name",
            UiType::SingleLineText,
        ))
        .unwrap();
    Fixture {
        store,
        json_col: json_col.id,
        text_col: text_col.id,
    }
}

#[test]
fn json_eq_empty_operand_per_dialect() {
    let fx = fixture();
    let filter = Filter::leaf(
        fx.json_col.clone(),
        ComparisonOp::Eq,
        Some(Value::String(String::new())),
    );

    // PostgreSQL folds the empty-string cast into blankness.
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::Postgres, &filter).unwrap(),
        @r#"("payload" IS NULL OR "payload"::jsonb = '{}'::jsonb OR "payload"::jsonb = '[]'::jsonb OR "payload"::text = '')"#
    );
    // Elsewhere blankness is the canonical empty forms or NULL.
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::MySql, &filter).unwrap(),
        @r#"(`payload` IS NULL OR `payload` = '{}' OR `payload` = '[]')"#
    );
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::Sqlite, &filter).unwrap(),
        @r#"("payload" IS NULL OR "payload" = '{}' OR "payload" = '[]')"#
    );
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::MsSql, &filter).unwrap(),
        @r#"([payload] IS NULL OR [payload] = '{}' OR [payload] = '[]')"#
    );
}

#[test]
fn json_eq_operand_branches() {
    let fx = fixture();
    let parsed = Filter::leaf(
        fx.json_col.clone(),
        ComparisonOp::Eq,
        Some(Value::String("{\"a\":1}".into())),
    );
    let unparsed = Filter::leaf(
        fx.json_col.clone(),
        ComparisonOp::Eq,
        Some(Value::String("plain words".into())),
    );

    // PostgreSQL diverges between the parse and no-parse branches.
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::Postgres, &parsed).unwrap(),
        @r#""payload"::jsonb = '{"a":1}'::jsonb"#
    );
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::Postgres, &unparsed).unwrap(),
        @r#""payload"::text = 'plain words'"#
    );

    // MySQL renders both branches identically through JSON_UNQUOTE.
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::MySql, &parsed).unwrap(),
        @r#"JSON_UNQUOTE(`payload`) = JSON_UNQUOTE('{"a":1}')"#
    );
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::MySql, &unparsed).unwrap(),
        @r#"JSON_UNQUOTE(`payload`) = JSON_UNQUOTE('plain words')"#
    );

    // The general handler inlines the operand either way.
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::Sqlite, &parsed).unwrap(),
        @r#""payload" = '{"a":1}'"#
    );
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::Sqlite, &unparsed).unwrap(),
        @r#""payload" = 'plain words'"#
    );
}

#[test]
fn json_nlike_matches_null_and_empty() {
    let fx = fixture();
    let filter = Filter::leaf(
        fx.json_col.clone(),
        ComparisonOp::Nlike,
        Some(Value::String("tag".into())),
    );

    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::MySql, &filter).unwrap(),
        @r#"(`payload` NOT LIKE '%tag%' OR `payload` IS NULL OR `payload` = '')"#
    );
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::Postgres, &filter).unwrap(),
        @r#"("payload"::jsonb::text NOT ILIKE '%tag%' OR "payload" IS NULL)"#
    );
}

#[test]
fn text_like_case_sensitivity_per_dialect() {
    let fx = fixture();
    let filter = Filter::leaf(
        fx.text_col.clone(),
        ComparisonOp::Like,
        Some(Value::String("ann".into())),
    );

    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::Postgres, &filter).unwrap(),
        @r#""name" ILIKE '%ann%'"#
    );
    insta::assert_snapshot!(
        compile_on(&fx.store, Dialect::MsSql, &filter).unwrap(),
        @r#"[name] LIKE '%ann%'"#
    );
}

#[test]
fn unsupported_operator_surfaces_for_json() {
    let fx = fixture();
    let filter = Filter::leaf(fx.json_col.clone(), ComparisonOp::Gt, Some(Value::from(1)));
    for dialect in Dialect::ALL {
        let err = compile_on(&fx.store, dialect, &filter).unwrap_err();
        assert!(
            matches!(err, FieldError::UnsupportedOperator { .. }),
            "expected UnsupportedOperator on {dialect}"
        );
    }
}

#[test]
fn filter_wire_shape_round_trips() {
    let fx = fixture();

    // The caller-facing wire shape: comparison fields only on leaves.
    let wire = json!({
        "id": "fl_wire1",
        "fk_column_id": fx.text_col,
        "is_group": false,
        "logical_op": "and",
        "comparison_op": "eq",
        "value": "ada"
    });
    let filter: Filter = serde_json::from_value(wire).unwrap();
    assert!(filter.validate().is_ok());

    let sql = compile_on(&fx.store, Dialect::Sqlite, &filter).unwrap();
    assert_eq!(sql, "\"name\" = 'ada'");

    // A group node carrying comparison fields is rejected.
    let bad: Filter = serde_json::from_value(json!({
        "id": "fl_wire2",
        "is_group": true,
        "logical_op": "or",
        "comparison_op": "eq"
    }))
    .unwrap();
    assert!(bad.validate().is_err());
}
