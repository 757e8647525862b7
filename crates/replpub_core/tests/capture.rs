//! Integration tests for row and statement capture.

use replpub_core::record::{DataType, FieldDesc, Format, Record, Value};
use replpub_core::{
    publisher, CaptureContext, CharSetId, FormatVersion, PublisherError, Relation, RelationId,
    ReplicationConfig,
};
use replpub_testkit::prelude::*;
use std::sync::Arc;

#[test]
fn insert_reaches_replicator() {
    init_test_logging();
    let mut env = TestEnv::recording();
    let relation = customers();
    let row = customer(relation.format(), 1, "ACME");
    let mut txn = env.transaction(10);

    publisher::store(&mut env.ctx(), &relation, &row, &mut txn).unwrap();

    assert!(txn.has_session());
    assert_eq!(
        env.recorder.operations(),
        vec![
            Operation::BindAttachment,
            Operation::StartTransaction,
            Operation::Insert
        ]
    );

    match &env.recorder.calls()[2] {
        Call::Insert { table, record } => {
            assert_eq!(table, "CUSTOMERS");
            assert_eq!(record.raw.as_ref(), row.data());
            let id = record.field(0).unwrap();
            assert_eq!(id.name.as_deref(), Some("ID"));
            assert_eq!(id.data.as_deref(), Some(&1i32.to_le_bytes()[..]));
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[test]
fn sessions_are_reused() {
    let mut env = TestEnv::recording();
    let relation = customers();
    let mut txn = env.transaction(10);

    for id in 0..3 {
        let row = customer(relation.format(), id, "ACME");
        publisher::store(&mut env.ctx(), &relation, &row, &mut txn).unwrap();
    }

    assert_eq!(env.recorder.sessions_created(), 1);
    assert_eq!(env.recorder.count(Operation::StartTransaction), 1);
    assert_eq!(env.recorder.count(Operation::Insert), 3);
}

#[test]
fn savepoints_announced_oldest_first_once() {
    let mut env = TestEnv::recording();
    let relation = customers();
    let row = customer(relation.format(), 1, "ACME");
    let mut txn = env.transaction(10);
    for _ in 0..3 {
        txn.start_savepoint();
    }

    publisher::store(&mut env.ctx(), &relation, &row, &mut txn).unwrap();
    publisher::store(&mut env.ctx(), &relation, &row, &mut txn).unwrap();

    assert_eq!(
        env.recorder.operations(),
        vec![
            Operation::BindAttachment,
            Operation::StartTransaction,
            Operation::StartSavepoint,
            Operation::StartSavepoint,
            Operation::StartSavepoint,
            Operation::Insert,
            Operation::Insert,
        ]
    );
    assert!(txn.savepoints().iter().all(|s| s.is_replicated()));
}

#[test]
fn nested_savepoint_announced_after_outer() {
    let mut env = TestEnv::recording();
    let relation = customers();
    let row = customer(relation.format(), 1, "ACME");
    let mut txn = env.transaction(10);

    txn.start_savepoint();
    publisher::store(&mut env.ctx(), &relation, &row, &mut txn).unwrap();
    env.recorder.clear();

    txn.start_savepoint();
    publisher::erase(&mut env.ctx(), &relation, &row, &mut txn).unwrap();

    assert_eq!(
        env.recorder.operations(),
        vec![Operation::StartSavepoint, Operation::Delete]
    );
}

#[test]
fn failed_savepoint_keeps_earlier_marks() {
    let mut env = TestEnv::new(ReplicationConfig::new().disable_on_error(false));
    let relation = customers();
    let row = customer(relation.format(), 1, "ACME");
    let mut txn = env.transaction(10);
    for _ in 0..3 {
        txn.start_savepoint();
    }
    env.recorder.fail_nth(Operation::StartSavepoint, 2);

    publisher::store(&mut env.ctx(), &relation, &row, &mut txn).unwrap();

    let marks: Vec<bool> = txn.savepoints().iter().map(|s| s.is_replicated()).collect();
    assert_eq!(marks, vec![true, false, false]);
    assert_eq!(env.recorder.count(Operation::Insert), 0);

    env.recorder.heal();
    env.recorder.clear();
    publisher::store(&mut env.ctx(), &relation, &row, &mut txn).unwrap();

    assert_eq!(
        env.recorder.operations(),
        vec![
            Operation::StartSavepoint,
            Operation::StartSavepoint,
            Operation::Insert
        ]
    );
}

#[test]
fn identical_update_is_not_replicated() {
    let mut env = TestEnv::recording();
    let relation = customers();
    let old = customer(relation.format(), 1, "ACME");
    let new = old.clone();
    let mut txn = env.transaction(10);

    publisher::modify(&mut env.ctx(), &relation, &old, &new, &mut txn).unwrap();

    assert_eq!(env.recorder.count(Operation::Update), 0);
    // The session is acquired before the images are compared.
    assert_eq!(
        env.recorder.operations(),
        vec![Operation::BindAttachment, Operation::StartTransaction]
    );
}

#[test]
fn null_change_is_an_update() {
    let mut env = TestEnv::recording();
    let relation = customers();
    let old = customer(relation.format(), 1, "ACME");
    let mut new = old.clone();
    new.set_null(1);
    let mut txn = env.transaction(10);

    publisher::modify(&mut env.ctx(), &relation, &old, &new, &mut txn).unwrap();

    match env.recorder.calls().last().unwrap() {
        Call::Update { table, old, new } => {
            assert_eq!(table, "CUSTOMERS");
            assert!(old.field(1).unwrap().data.is_some());
            assert!(new.field(1).unwrap().data.is_none());
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[test]
fn recursion_guard_suppresses_capture() {
    let mut env = TestEnv::recording();
    let relation = customers();
    let row = customer(relation.format(), 1, "ACME");
    let mut txn = env.transaction(10);
    txn.start_savepoint();

    {
        let _guard = env.worker.enter_replication();
        let mut ctx = CaptureContext::new(&env.database, &mut env.attachment, &env.worker);
        publisher::store(&mut ctx, &relation, &row, &mut txn).unwrap();
        publisher::modify(&mut ctx, &relation, &row, &customer(relation.format(), 2, "B"), &mut txn)
            .unwrap();
        publisher::erase(&mut ctx, &relation, &row, &mut txn).unwrap();
        publisher::gen_id(&mut ctx, ORDER_SEQUENCE, 5);
        publisher::save_cleanup(&mut ctx, &mut txn, SavepointAction::Release).unwrap();
    }

    assert_eq!(env.recorder.total_calls(), 0);
    assert!(!txn.has_session());
    assert!(!env.worker.is_replicating());
}

#[test]
fn deferred_work_suppression_skips_capture() {
    let mut env = TestEnv::recording();
    let relation = customers();
    let row = customer(relation.format(), 1, "ACME");
    let mut txn = env.transaction(10);

    let _suppressed = env.worker.suppress_deferred_work();
    let mut ctx = CaptureContext::new(&env.database, &mut env.attachment, &env.worker);
    publisher::store(&mut ctx, &relation, &row, &mut txn).unwrap();

    assert_eq!(env.recorder.total_calls(), 0);
}

#[test]
fn guard_is_restored_after_capture() {
    let mut env = TestEnv::recording();
    let relation = customers();
    let row = customer(relation.format(), 1, "ACME");
    let mut txn = env.transaction(10);
    env.recorder.fail(Operation::Insert);

    publisher::store(&mut env.ctx(), &relation, &row, &mut txn).unwrap();
    assert!(!env.worker.is_replicating());
}

#[test]
fn temporary_and_disabled_relations_are_skipped() {
    let mut env = TestEnv::recording();
    let temporary = customers().temporary(true);
    let disabled = customers().replicating(false);
    let row = customer(temporary.format(), 1, "ACME");
    let mut txn = env.transaction(10);

    publisher::store(&mut env.ctx(), &temporary, &row, &mut txn).unwrap();
    publisher::store(&mut env.ctx(), &disabled, &row, &mut txn).unwrap();

    assert_eq!(env.recorder.total_calls(), 0);
    assert_eq!(env.recorder.sessions_created(), 0);
}

#[test]
fn table_filter_applies_to_user_tables_only() {
    let mut env = TestEnv::new(ReplicationConfig::new().include_filter("ORDERS"));
    publisher::attach(&mut env.ctx(), false).unwrap();

    let relation = customers();
    let row = customer(relation.format(), 1, "ACME");
    let mut txn = env.transaction(10);
    publisher::store(&mut env.ctx(), &relation, &row, &mut txn).unwrap();
    assert_eq!(env.recorder.total_calls(), 0);

    let system = system_relation();
    let mut system_row = Record::new(system.format().clone());
    system_row.set(0, &Value::int(42)).unwrap();
    publisher::store(&mut env.ctx(), &system, &system_row, &mut txn).unwrap();
    assert_eq!(env.recorder.count(Operation::Insert), 1);
}

#[test]
fn system_relation_ignores_replicating_flag() {
    let mut env = TestEnv::recording();
    let system = system_relation().replicating(false);
    let mut row = Record::new(system.format().clone());
    row.set(0, &Value::int(1)).unwrap();
    let mut txn = env.transaction(10);

    publisher::erase(&mut env.ctx(), &system, &row, &mut txn).unwrap();
    assert_eq!(env.recorder.count(Operation::Delete), 1);
}

#[test]
fn old_format_record_is_normalized() {
    let mut env = TestEnv::recording();
    let relation = customers_v2();
    let row = customer(&customers_v1_format(), 7, "ACME");
    let original = row.clone();
    let mut txn = env.transaction(10);

    publisher::store(&mut env.ctx(), &relation, &row, &mut txn).unwrap();

    assert_eq!(row, original);
    match env.recorder.calls().last().unwrap() {
        Call::Insert { record, .. } => {
            assert_eq!(record.fields.len(), 3);
            assert_eq!(record.raw.len(), relation.format().record_length());
            assert_eq!(
                record.field(0).unwrap().data.as_deref(),
                Some(&7i32.to_le_bytes()[..])
            );
            let email = record.field(2).unwrap();
            assert_eq!(email.name.as_deref(), Some("EMAIL"));
            assert!(email.data.is_none());
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[test]
fn conversion_failure_is_returned() {
    let mut env = TestEnv::recording();
    let v2 = Arc::new(Format::new(
        FormatVersion::new(2),
        vec![
            FieldDesc::new(DataType::Integer),
            FieldDesc::new(DataType::Integer),
        ],
    ));
    let relation = Relation::new(RelationId::new(128), "CUSTOMERS", v2);
    let row = customer(&customers_v1_format(), 1, "ACME");
    let mut txn = env.transaction(10);

    let err = publisher::store(&mut env.ctx(), &relation, &row, &mut txn).unwrap_err();
    assert!(matches!(err, PublisherError::Conversion { .. }));
    assert_eq!(env.recorder.count(Operation::Insert), 0);
}

#[test]
fn exec_sql_uses_attachment_charset() {
    let mut env = TestEnv::recording();
    let mut txn = env.transaction(10);
    txn.start_savepoint();

    {
        let _guard = env.worker.enter_replication();
        let mut ctx = CaptureContext::new(&env.database, &mut env.attachment, &env.worker);
        publisher::exec_sql(&mut ctx, &mut txn, "CREATE TABLE T (ID INT)").unwrap();
    }

    let calls = env.recorder.calls();
    assert_eq!(calls[2], Call::StartSavepoint(txn.number()));
    assert_eq!(
        calls[3],
        Call::ExecuteSql {
            charset: CharSetId::UTF8,
            sql: "CREATE TABLE T (ID INT)".into(),
        }
    );
}

#[test]
fn exec_sql_skipped_when_deferred_work_suppressed() {
    let mut env = TestEnv::recording();
    let mut txn = env.transaction(10);

    let _guard = env.worker.enter_replication();
    let _suppressed = env.worker.suppress_deferred_work();
    let mut ctx = CaptureContext::new(&env.database, &mut env.attachment, &env.worker);
    publisher::exec_sql(&mut ctx, &mut txn, "DROP TABLE T").unwrap();

    assert_eq!(env.recorder.total_calls(), 0);
}
