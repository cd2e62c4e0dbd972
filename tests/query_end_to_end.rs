//! # End-to-End Query Tests
//!
//! Drives the public `Database` API with statement ASTs the way the SQL
//! front end would, covering DDL, DML, queries, the optimizer's observable
//! behavior, and the documented failure modes. Expected values are
//! computed by hand, not derived from running the code.

use quilldb::document::json;
use quilldb::expr::{AggregateFunc, CmpOp, Expr};
use quilldb::query::{
    ConstraintDef, CreateIndexStmt, CreateSequenceStmt, CreateTableStmt, DeleteStmt, InsertSource,
    InsertStmt, OrderBy, SelectStmt, UpdateAction, UpdateStmt,
};
use quilldb::{
    Database, Error, FieldBuffer, MemoryEngine, Output, Param, SequenceInfo, Statement, Value,
};

fn db() -> Database {
    Database::new(MemoryEngine::new()).unwrap()
}

fn doc(raw: &str) -> FieldBuffer {
    json::decode(raw).unwrap()
}

fn insert_docs(table: &str, raws: &[&str]) -> Statement {
    Statement::Insert(InsertStmt {
        table: table.into(),
        columns: vec![],
        source: InsertSource::Values(
            raws.iter()
                .map(|raw| Expr::Literal(Value::Document(doc(raw))))
                .collect(),
        ),
    })
}

fn select_all(table: &str) -> SelectStmt {
    SelectStmt::from_table(table)
}

fn eq_filter(path: &str, v: Value) -> Expr {
    Expr::cmp(CmpOp::Eq, Expr::path(path), Expr::Literal(v))
}

mod primary_key {
    use super::*;

    fn create_t() -> Statement {
        Statement::CreateTable(CreateTableStmt {
            if_not_exists: false,
            name: "t".into(),
            constraints: vec![
                ConstraintDef::new("id")
                    .typed(quilldb::ValueType::Integer)
                    .primary_key(),
                ConstraintDef::new("name").typed(quilldb::ValueType::Text),
            ],
        })
    }

    #[test]
    fn insert_then_point_read_returns_exactly_the_matching_row() {
        let db = db();
        db.execute(create_t(), &[]).unwrap();
        db.execute(
            insert_docs("t", &[r#"{"id": 1, "name": "a"}"#, r#"{"id": 2, "name": "b"}"#]),
            &[],
        )
        .unwrap();

        let rows = db
            .query(
                Statement::Select(select_all("t").with_filter(eq_filter("id", Value::Integer(2)))),
                &[],
            )
            .unwrap();

        assert_eq!(rows, vec![doc(r#"{"id": 2, "name": "b"}"#)]);
    }

    #[test]
    fn duplicate_primary_key_fails_and_leaves_the_table_untouched() {
        let db = db();
        db.execute(create_t(), &[]).unwrap();
        db.execute(
            insert_docs("t", &[r#"{"id": 1, "name": "a"}"#, r#"{"id": 2, "name": "b"}"#]),
            &[],
        )
        .unwrap();

        let err = db
            .execute(insert_docs("t", &[r#"{"id": 1, "name": "x"}"#]), &[])
            .unwrap_err();
        assert!(Error::DuplicateDocument.is(&err));

        let rows = db.query(Statement::Select(select_all("t")), &[]).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn multi_row_insert_with_duplicate_rolls_back_entirely() {
        let db = db();
        db.execute(create_t(), &[]).unwrap();

        let err = db
            .execute(
                insert_docs(
                    "t",
                    &[r#"{"id": 1, "name": "a"}"#, r#"{"id": 1, "name": "b"}"#],
                ),
                &[],
            )
            .unwrap_err();
        assert!(Error::DuplicateDocument.is(&err));

        let rows = db.query(Statement::Select(select_all("t")), &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn scan_returns_rows_in_primary_key_order() {
        let db = db();
        db.execute(create_t(), &[]).unwrap();
        db.execute(
            insert_docs(
                "t",
                &[
                    r#"{"id": 30, "name": "c"}"#,
                    r#"{"id": 10, "name": "a"}"#,
                    r#"{"id": 20, "name": "b"}"#,
                ],
            ),
            &[],
        )
        .unwrap();

        let rows = db.query(Statement::Select(select_all("t")), &[]).unwrap();
        let ids: Vec<&Value> = rows.iter().map(|r| r.get("id").unwrap()).collect();
        assert_eq!(
            ids,
            vec![&Value::Integer(10), &Value::Integer(20), &Value::Integer(30)]
        );
    }

    #[test]
    fn tables_without_primary_key_scan_in_docid_order() {
        let db = db();
        db.execute(
            Statement::CreateTable(CreateTableStmt {
                if_not_exists: false,
                name: "logs".into(),
                constraints: vec![],
            }),
            &[],
        )
        .unwrap();
        db.execute(
            insert_docs("logs", &[r#"{"n": 1}"#, r#"{"n": 2}"#, r#"{"n": 3}"#]),
            &[],
        )
        .unwrap();

        let rows = db.query(Statement::Select(select_all("logs")), &[]).unwrap();
        let ns: Vec<&Value> = rows.iter().map(|r| r.get("n").unwrap()).collect();
        assert_eq!(
            ns,
            vec![&Value::Integer(1), &Value::Integer(2), &Value::Integer(3)]
        );
    }
}

mod unique_index {
    use super::*;

    fn setup(db: &Database) {
        db.execute(
            Statement::CreateTable(CreateTableStmt {
                if_not_exists: false,
                name: "u".into(),
                constraints: vec![ConstraintDef::new("a").typed(quilldb::ValueType::Integer)],
            }),
            &[],
        )
        .unwrap();
        db.execute(
            Statement::CreateIndex(CreateIndexStmt {
                if_not_exists: false,
                name: "ui".into(),
                table: "u".into(),
                path: "a".parse().unwrap(),
                unique: true,
            }),
            &[],
        )
        .unwrap();
    }

    #[test]
    fn second_insert_of_the_same_value_fails_with_duplicate_document() {
        let db = db();
        setup(&db);

        db.execute(insert_docs("u", &[r#"{"a": 1}"#]), &[]).unwrap();
        let err = db
            .execute(insert_docs("u", &[r#"{"a": 1}"#]), &[])
            .unwrap_err();
        assert!(Error::DuplicateDocument.is(&err));

        let rows = db
            .query(
                Statement::Select(
                    select_all("u")
                        .with_projection(vec![Expr::Aggregate(AggregateFunc::Count(None))]),
                ),
                &[],
            )
            .unwrap();
        assert_eq!(rows[0].get("COUNT(*)"), Some(&Value::Integer(1)));
    }

    #[test]
    fn null_values_do_not_participate_in_uniqueness() {
        let db = db();
        setup(&db);

        db.execute(insert_docs("u", &[r#"{"b": 1}"#]), &[]).unwrap();
        db.execute(insert_docs("u", &[r#"{"b": 2}"#]), &[]).unwrap();

        let rows = db.query(Statement::Select(select_all("u")), &[]).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn index_stays_consistent_across_update_and_delete() {
        let db = db();
        setup(&db);
        db.execute(insert_docs("u", &[r#"{"a": 1}"#, r#"{"a": 2}"#]), &[])
            .unwrap();

        db.execute(
            Statement::Update(UpdateStmt {
                table: "u".into(),
                actions: vec![UpdateAction::Set("a".parse().unwrap(), Expr::integer(9))],
                filter: Some(eq_filter("a", Value::Integer(1))),
            }),
            &[],
        )
        .unwrap();

        // the freed value is insertable again
        db.execute(insert_docs("u", &[r#"{"a": 1}"#]), &[]).unwrap();

        db.execute(
            Statement::Delete(DeleteStmt {
                table: "u".into(),
                filter: Some(eq_filter("a", Value::Integer(9))),
            }),
            &[],
        )
        .unwrap();

        let rows = db
            .query(
                Statement::Select(select_all("u").with_filter(Expr::cmp(
                    CmpOp::Gte,
                    Expr::path("a"),
                    Expr::integer(0),
                ))),
                &[],
            )
            .unwrap();
        let mut values: Vec<i64> = rows
            .iter()
            .map(|r| match r.get("a") {
                Some(Value::Integer(i)) => *i,
                other => panic!("unexpected value {:?}", other),
            })
            .collect();
        values.sort();
        assert_eq!(values, vec![1, 2]);
    }
}

mod path_update {
    use super::*;

    #[test]
    fn nested_set_replaces_in_place_and_preserves_field_order() {
        let db = db();
        db.execute(
            Statement::CreateTable(CreateTableStmt {
                if_not_exists: false,
                name: "t".into(),
                constraints: vec![],
            }),
            &[],
        )
        .unwrap();
        db.execute(
            insert_docs(
                "t",
                &[r#"{"name": "Foo", "address": {"city": "Lyon", "zip": "69001"}}"#],
            ),
            &[],
        )
        .unwrap();

        let affected = db
            .execute(
                Statement::Update(UpdateStmt {
                    table: "t".into(),
                    actions: vec![UpdateAction::Set(
                        "address.zip".parse().unwrap(),
                        Expr::text("69002"),
                    )],
                    filter: Some(eq_filter("name", Value::Text("Foo".into()))),
                }),
                &[],
            )
            .unwrap();
        assert_eq!(affected, Output::Count(1));

        let rows = db.query(Statement::Select(select_all("t")), &[]).unwrap();
        let address = rows[0].get("address").unwrap().as_document().unwrap();
        let fields: Vec<(&str, &Value)> = address.fields().collect();
        assert_eq!(
            fields,
            vec![
                ("city", &Value::Text("Lyon".into())),
                ("zip", &Value::Text("69002".into())),
            ]
        );
    }

    #[test]
    fn set_through_a_missing_intermediate_fails_with_path_invalid() {
        let db = db();
        db.execute(
            Statement::CreateTable(CreateTableStmt {
                if_not_exists: false,
                name: "t".into(),
                constraints: vec![],
            }),
            &[],
        )
        .unwrap();
        db.execute(insert_docs("t", &[r#"{"a": 1}"#]), &[]).unwrap();

        let err = db
            .execute(
                Statement::Update(UpdateStmt {
                    table: "t".into(),
                    actions: vec![UpdateAction::Set(
                        "missing.inner".parse().unwrap(),
                        Expr::integer(1),
                    )],
                    filter: None,
                }),
                &[],
            )
            .unwrap_err();
        assert!(Error::PathInvalid.is(&err));
    }

    #[test]
    fn unset_removes_the_field_from_matching_rows() {
        let db = db();
        db.execute(
            Statement::CreateTable(CreateTableStmt {
                if_not_exists: false,
                name: "t".into(),
                constraints: vec![],
            }),
            &[],
        )
        .unwrap();
        db.execute(insert_docs("t", &[r#"{"a": 1, "b": 2}"#]), &[])
            .unwrap();

        db.execute(
            Statement::Update(UpdateStmt {
                table: "t".into(),
                actions: vec![UpdateAction::Unset("b".parse().unwrap())],
                filter: None,
            }),
            &[],
        )
        .unwrap();

        let rows = db.query(Statement::Select(select_all("t")), &[]).unwrap();
        assert_eq!(rows[0], doc(r#"{"a": 1}"#));
    }
}

mod sequences {
    use super::*;

    #[test]
    fn cycling_sequence_wraps_through_next_value_for() {
        let db = db();
        db.execute(
            Statement::CreateSequence(CreateSequenceStmt {
                if_not_exists: false,
                info: {
                    let mut info = SequenceInfo::with_defaults("s", 1);
                    info.min = 1;
                    info.max = 3;
                    info.start = 1;
                    info.cycle = true;
                    info
                },
            }),
            &[],
        )
        .unwrap();

        let next = |db: &Database| -> i64 {
            let stmt = Statement::Select(SelectStmt {
                projection: vec![Expr::NextValueFor("s".into())],
                from: None,
                filter: None,
                group_by: None,
                order_by: None,
                limit: None,
                offset: None,
            });
            let rows = db.query(stmt, &[]).unwrap();
            match rows[0].get("NEXT VALUE FOR s") {
                Some(Value::Integer(i)) => *i,
                other => panic!("unexpected value {:?}", other),
            }
        };

        let values: Vec<i64> = (0..4).map(|_| next(&db)).collect();
        assert_eq!(values, vec![1, 2, 3, 1]);
    }
}

mod explain {
    use super::*;

    fn setup(db: &Database) {
        db.execute(
            Statement::CreateTable(CreateTableStmt {
                if_not_exists: false,
                name: "users".into(),
                constraints: vec![ConstraintDef::new("age").typed(quilldb::ValueType::Integer)],
            }),
            &[],
        )
        .unwrap();
        db.execute(
            Statement::CreateIndex(CreateIndexStmt {
                if_not_exists: false,
                name: "idx_users_age".into(),
                table: "users".into(),
                path: "age".parse().unwrap(),
                unique: false,
            }),
            &[],
        )
        .unwrap();
    }

    fn plan_of(db: &Database, stmt: Statement) -> String {
        let rows = db.query(Statement::Explain(Box::new(stmt)), &[]).unwrap();
        match rows[0].get("plan") {
            Some(Value::Text(plan)) => plan.clone(),
            other => panic!("unexpected plan column {:?}", other),
        }
    }

    #[test]
    fn equality_filter_with_matching_order_by_uses_the_index_and_drops_the_sort() {
        let db = db();
        setup(&db);

        let stmt = Statement::Select(SelectStmt {
            projection: vec![Expr::Wildcard],
            from: Some("users".into()),
            filter: Some(eq_filter("age", Value::Integer(30))),
            group_by: None,
            order_by: Some(OrderBy {
                path: "age".parse().unwrap(),
                descending: false,
            }),
            limit: None,
            offset: None,
        });

        let plan = plan_of(&db, stmt);
        assert!(plan.contains("IndexScan"), "plan was: {}", plan);
        assert!(!plan.contains("Sort"), "plan was: {}", plan);
    }

    #[test]
    fn unindexed_filter_stays_a_sequential_scan() {
        let db = db();
        setup(&db);

        let stmt = Statement::Select(
            select_all("users").with_filter(eq_filter("name", Value::Text("a".into()))),
        );
        let plan = plan_of(&db, stmt);
        assert!(plan.contains("SeqScan"), "plan was: {}", plan);
        assert!(plan.contains("Filter"), "plan was: {}", plan);
    }

    #[test]
    fn index_created_after_inserts_is_populated_by_reindex() {
        let db = db();
        db.execute(
            Statement::CreateTable(CreateTableStmt {
                if_not_exists: false,
                name: "users".into(),
                constraints: vec![],
            }),
            &[],
        )
        .unwrap();
        db.execute(
            insert_docs("users", &[r#"{"age": 25}"#, r#"{"age": 30}"#]),
            &[],
        )
        .unwrap();

        // CREATE INDEX backfills from the existing rows
        db.execute(
            Statement::CreateIndex(CreateIndexStmt {
                if_not_exists: false,
                name: "idx_users_age".into(),
                table: "users".into(),
                path: "age".parse().unwrap(),
                unique: false,
            }),
            &[],
        )
        .unwrap();

        let stmt =
            Statement::Select(select_all("users").with_filter(eq_filter("age", Value::Integer(30))));
        let plan = plan_of(&db, stmt.clone());
        assert!(plan.contains("IndexScan"), "plan was: {}", plan);

        let rows = db.query(stmt, &[]).unwrap();
        assert_eq!(rows, vec![doc(r#"{"age": 30}"#)]);

        // REINDEX rebuilds without changing the result
        db.execute(
            Statement::Reindex(quilldb::query::ReindexStmt {
                index: "idx_users_age".into(),
            }),
            &[],
        )
        .unwrap();
        let rows = db
            .query(
                Statement::Select(
                    select_all("users").with_filter(eq_filter("age", Value::Integer(30))),
                ),
                &[],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn index_scan_rewrite_preserves_the_result_multiset() {
        let db = db();
        setup(&db);
        db.execute(
            insert_docs(
                "users",
                &[
                    r#"{"age": 25, "name": "a"}"#,
                    r#"{"age": 30, "name": "b"}"#,
                    r#"{"age": 30, "name": "c"}"#,
                    r#"{"age": 41, "name": "d"}"#,
                ],
            ),
            &[],
        )
        .unwrap();

        // indexed query
        let rows = db
            .query(
                Statement::Select(select_all("users").with_filter(eq_filter(
                    "age",
                    Value::Integer(30),
                ))),
                &[],
            )
            .unwrap();
        let mut names: Vec<&Value> = rows.iter().map(|r| r.get("name").unwrap()).collect();
        names.sort_by_key(|v| v.to_string());
        assert_eq!(
            names,
            vec![&Value::Text("b".into()), &Value::Text("c".into())]
        );

        // range query through the same index
        let rows = db
            .query(
                Statement::Select(select_all("users").with_filter(Expr::cmp(
                    CmpOp::Gt,
                    Expr::path("age"),
                    Expr::integer(29),
                ))),
                &[],
            )
            .unwrap();
        assert_eq!(rows.len(), 3);
    }
}

mod query_shapes {
    use super::*;

    fn setup(db: &Database) {
        db.execute(
            Statement::CreateTable(CreateTableStmt {
                if_not_exists: false,
                name: "items".into(),
                constraints: vec![],
            }),
            &[],
        )
        .unwrap();
        db.execute(
            insert_docs(
                "items",
                &[
                    r#"{"cat": "a", "price": 10}"#,
                    r#"{"cat": "b", "price": 30}"#,
                    r#"{"cat": "a", "price": 20}"#,
                    r#"{"price": 5}"#,
                ],
            ),
            &[],
        )
        .unwrap();
    }

    #[test]
    fn order_by_descending_sorts_nulls_last() {
        let db = db();
        setup(&db);

        let rows = db
            .query(
                Statement::Select(SelectStmt {
                    projection: vec![Expr::Wildcard],
                    from: Some("items".into()),
                    filter: None,
                    group_by: None,
                    order_by: Some(OrderBy {
                        path: "cat".parse().unwrap(),
                        descending: true,
                    }),
                    limit: None,
                    offset: None,
                }),
                &[],
            )
            .unwrap();

        let cats: Vec<Option<&Value>> = rows.iter().map(|r| r.get("cat")).collect();
        assert_eq!(
            cats,
            vec![
                Some(&Value::Text("b".into())),
                Some(&Value::Text("a".into())),
                Some(&Value::Text("a".into())),
                None,
            ]
        );
    }

    #[test]
    fn limit_and_offset_page_through_sorted_rows() {
        let db = db();
        setup(&db);

        let rows = db
            .query(
                Statement::Select(SelectStmt {
                    projection: vec![Expr::path("price")],
                    from: Some("items".into()),
                    filter: None,
                    group_by: None,
                    order_by: Some(OrderBy {
                        path: "price".parse().unwrap(),
                        descending: false,
                    }),
                    limit: Some(Expr::integer(2)),
                    offset: Some(Expr::integer(1)),
                }),
                &[],
            )
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("price"), Some(&Value::Integer(10)));
        assert_eq!(rows[1].get("price"), Some(&Value::Integer(20)));
    }

    #[test]
    fn group_by_aggregates_per_group() {
        let db = db();
        setup(&db);

        let rows = db
            .query(
                Statement::Select(SelectStmt {
                    projection: vec![
                        Expr::path("cat"),
                        Expr::Aggregate(AggregateFunc::Sum(Box::new(Expr::path("price")))),
                    ],
                    from: Some("items".into()),
                    filter: None,
                    group_by: Some(Expr::path("cat")),
                    order_by: None,
                    limit: None,
                    offset: None,
                }),
                &[],
            )
            .unwrap();

        let mut sums: Vec<(String, i64)> = rows
            .iter()
            .map(|r| {
                let cat = match r.get("cat") {
                    Some(Value::Text(s)) => s.clone(),
                    _ => "<null>".into(),
                };
                let sum = match r.get("SUM(price)") {
                    Some(Value::Integer(i)) => *i,
                    other => panic!("unexpected sum {:?}", other),
                };
                (cat, sum)
            })
            .collect();
        sums.sort();
        assert_eq!(
            sums,
            vec![("<null>".into(), 5), ("a".into(), 30), ("b".into(), 30)]
        );
    }

    #[test]
    fn positional_parameters_bind_into_filters() {
        let db = db();
        setup(&db);

        let rows = db
            .query(
                Statement::Select(select_all("items").with_filter(Expr::cmp(
                    CmpOp::Gte,
                    Expr::path("price"),
                    Expr::PositionalParam(1),
                ))),
                &[Param::positional(Value::Integer(20))],
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn projection_aliases_and_computed_fields() {
        let db = db();
        setup(&db);

        let rows = db
            .query(
                Statement::Select(SelectStmt {
                    projection: vec![Expr::named(
                        Expr::Arith(
                            quilldb::expr::ArithOp::Mul,
                            Box::new(Expr::path("price")),
                            Box::new(Expr::integer(2)),
                        ),
                        "double_price",
                    )],
                    from: Some("items".into()),
                    filter: Some(eq_filter("cat", Value::Text("b".into()))),
                    group_by: None,
                    order_by: None,
                    limit: None,
                    offset: None,
                }),
                &[],
            )
            .unwrap();
        assert_eq!(rows[0].get("double_price"), Some(&Value::Integer(60)));
        assert_eq!(rows[0].len(), 1);
    }

    #[test]
    fn select_without_from_emits_one_row() {
        let db = db();
        let rows = db
            .query(
                Statement::Select(SelectStmt {
                    projection: vec![Expr::named(Expr::integer(1), "one")],
                    from: None,
                    filter: None,
                    group_by: None,
                    order_by: None,
                    limit: None,
                    offset: None,
                }),
                &[],
            )
            .unwrap();
        assert_eq!(rows, vec![FieldBuffer::new().add("one", Value::Integer(1))]);
    }
}

mod insert_shapes {
    use super::*;

    #[test]
    fn insert_with_column_list_zips_values_into_documents() {
        let db = db();
        db.execute(
            Statement::CreateTable(CreateTableStmt {
                if_not_exists: false,
                name: "t".into(),
                constraints: vec![],
            }),
            &[],
        )
        .unwrap();

        db.execute(
            Statement::Insert(InsertStmt {
                table: "t".into(),
                columns: vec!["a".into(), "b".into()],
                source: InsertSource::Values(vec![Expr::List(vec![
                    Expr::integer(1),
                    Expr::text("x"),
                ])]),
            }),
            &[],
        )
        .unwrap();

        let rows = db.query(Statement::Select(select_all("t")), &[]).unwrap();
        assert_eq!(rows, vec![doc(r#"{"a": 1, "b": "x"}"#)]);
    }

    #[test]
    fn insert_from_select_copies_matching_rows() {
        let db = db();
        for name in ["src", "dst"] {
            db.execute(
                Statement::CreateTable(CreateTableStmt {
                    if_not_exists: false,
                    name: name.into(),
                    constraints: vec![],
                }),
                &[],
            )
            .unwrap();
        }
        db.execute(
            insert_docs("src", &[r#"{"n": 1}"#, r#"{"n": 5}"#, r#"{"n": 9}"#]),
            &[],
        )
        .unwrap();

        let copied = db
            .execute(
                Statement::Insert(InsertStmt {
                    table: "dst".into(),
                    columns: vec![],
                    source: InsertSource::Select(Box::new(select_all("src").with_filter(
                        Expr::cmp(CmpOp::Gt, Expr::path("n"), Expr::integer(2)),
                    ))),
                }),
                &[],
            )
            .unwrap();
        assert_eq!(copied, Output::Count(2));

        let rows = db.query(Statement::Select(select_all("dst")), &[]).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn constraint_defaults_and_not_null_apply_on_insert() {
        let db = db();
        db.execute(
            Statement::CreateTable(CreateTableStmt {
                if_not_exists: false,
                name: "t".into(),
                constraints: vec![
                    ConstraintDef::new("level").default(Expr::integer(3)),
                    ConstraintDef::new("msg")
                        .typed(quilldb::ValueType::Text)
                        .not_null(),
                ],
            }),
            &[],
        )
        .unwrap();

        db.execute(insert_docs("t", &[r#"{"msg": "hi"}"#]), &[]).unwrap();
        let rows = db.query(Statement::Select(select_all("t")), &[]).unwrap();
        assert_eq!(rows[0].get("level"), Some(&Value::Integer(3)));

        let err = db
            .execute(insert_docs("t", &[r#"{"level": 1}"#]), &[])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotNull(_))
        ));
    }
}
