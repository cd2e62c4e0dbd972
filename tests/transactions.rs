//! # Transaction Behavior Tests
//!
//! Exercises explicit transactions through the public API: snapshot
//! isolation between readers and the writer, rollback semantics,
//! read-only enforcement, and cooperative cancellation.

use quilldb::document::json;
use quilldb::expr::Expr;
use quilldb::query::{ConstraintDef, CreateTableStmt, InsertSource, InsertStmt, SelectStmt};
use quilldb::{Cancellation, Database, Error, MemoryEngine, Output, Statement, Value};

fn db() -> Database {
    Database::new(MemoryEngine::new()).unwrap()
}

fn create_t(db: &Database, name: &str) {
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

fn insert_one(table: &str, raw: &str) -> Statement {
    Statement::Insert(InsertStmt {
        table: table.into(),
        columns: vec![],
        source: InsertSource::Values(vec![Expr::Literal(Value::Document(
            json::decode(raw).unwrap(),
        ))]),
    })
}

fn count_rows(db: &Database, table: &str) -> usize {
    db.query(Statement::Select(SelectStmt::from_table(table)), &[])
        .unwrap()
        .len()
}

#[test]
fn writes_are_invisible_until_commit() {
    let db = db();
    create_t(&db, "t");

    let read_before = db.begin(false).unwrap();

    let write = db.begin(true).unwrap();
    write.execute(&insert_one("t", r#"{"n": 1}"#), &[]).unwrap();

    // the writer sees its own row, the reader's snapshot does not
    let seen = write
        .execute(&Statement::Select(SelectStmt::from_table("t")), &[])
        .unwrap();
    assert_eq!(seen, Output::Rows(vec![json::decode(r#"{"n": 1}"#).unwrap()]));

    write.commit().unwrap();

    let before = read_before
        .execute(&Statement::Select(SelectStmt::from_table("t")), &[])
        .unwrap();
    assert_eq!(before, Output::Rows(vec![]));
    read_before.rollback().unwrap();

    assert_eq!(count_rows(&db, "t"), 1);
}

#[test]
fn rollback_discards_every_statement_of_the_transaction() {
    let db = db();
    create_t(&db, "t");

    let tx = db.begin(true).unwrap();
    tx.execute(&insert_one("t", r#"{"n": 1}"#), &[]).unwrap();
    tx.execute(&insert_one("t", r#"{"n": 2}"#), &[]).unwrap();
    tx.rollback().unwrap();

    assert_eq!(count_rows(&db, "t"), 0);
}

#[test]
fn failed_auto_commit_statement_leaves_no_partial_writes() {
    let db = db();
    db.execute(
        Statement::CreateTable(CreateTableStmt {
            if_not_exists: false,
            name: "t".into(),
            constraints: vec![ConstraintDef::new("id")
                .typed(quilldb::ValueType::Integer)
                .primary_key()],
        }),
        &[],
    )
    .unwrap();
    db.execute(insert_one("t", r#"{"id": 1}"#), &[]).unwrap();

    // second row in the statement collides, the first must not survive
    let err = db
        .execute(
            Statement::Insert(InsertStmt {
                table: "t".into(),
                columns: vec![],
                source: InsertSource::Values(vec![
                    Expr::Literal(Value::Document(json::decode(r#"{"id": 7}"#).unwrap())),
                    Expr::Literal(Value::Document(json::decode(r#"{"id": 1}"#).unwrap())),
                ]),
            }),
            &[],
        )
        .unwrap_err();
    assert!(Error::DuplicateDocument.is(&err));
    assert_eq!(count_rows(&db, "t"), 1);
}

#[test]
fn statements_on_a_read_transaction_cannot_write() {
    let db = db();
    create_t(&db, "t");

    let tx = db.begin(false).unwrap();
    let err = tx.execute(&insert_one("t", r#"{"n": 1}"#), &[]).unwrap_err();
    // docid generation runs through the sequence, which refuses first
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::SequenceNotWritable) | Some(Error::TxReadOnly)
    ));
}

#[test]
fn cancellation_aborts_an_auto_committed_statement() {
    let db = db();
    create_t(&db, "t");
    db.execute(insert_one("t", r#"{"n": 1}"#), &[]).unwrap();

    let cancel = Cancellation::new();
    cancel.cancel();
    let err = db
        .execute_with(
            Statement::Select(SelectStmt::from_table("t")),
            &[],
            cancel,
        )
        .unwrap_err();
    assert!(Error::Cancelled.is(&err));
}

#[test]
fn documents_round_trip_through_storage_and_json() {
    let db = db();
    create_t(&db, "t");

    let raw = r#"{"name": "Foo", "scores": [1, 2.5, null], "address": {"city": "Lyon", "zip": "69001"}, "active": true}"#;
    db.execute(insert_one("t", raw), &[]).unwrap();

    let rows = db
        .query(Statement::Select(SelectStmt::from_table("t")), &[])
        .unwrap();
    assert_eq!(rows.len(), 1);

    let original = json::decode(raw).unwrap();
    assert_eq!(rows[0], original);
    assert_eq!(
        json::decode(&json::encode(&rows[0]).unwrap()).unwrap(),
        original
    );
}
