mod common;

#[cfg(test)]
mod tests {
    use crate::common::mock;
    use keel_core::{Error, TraceSink, TxMode, UnitState, Value, fingerprint};
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    #[derive(Default)]
    struct Sink {
        before: Mutex<Vec<(String, String, String, String)>>,
        after: Mutex<Vec<(String, String)>>,
    }

    impl TraceSink for Sink {
        fn before(&self, trace_id: &str, sql: &str, params: &str, fingerprint: &str) {
            self.before.lock().unwrap().push((
                trace_id.into(),
                sql.into(),
                params.into(),
                fingerprint.into(),
            ));
        }

        fn after(&self, trace_id: &str, fingerprint: &str, _elapsed: Duration) {
            self.after
                .lock()
                .unwrap()
                .push((trace_id.into(), fingerprint.into()));
        }
    }

    #[test]
    fn write_commits() {
        let (datasource, journal) = mock(2);
        let mut uow = datasource.unit_of_work(TxMode::Write, "commit");
        assert_eq!(uow.state(), UnitState::Created);
        assert!(journal.sql().is_empty(), "Nothing runs before the first statement");
        uow.execute("delete from book where id = ?", &[Value::Int64(Some(1))])
            .expect("Could not delete");
        assert_eq!(uow.state(), UnitState::InTransaction);
        uow.execute("delete from book where id = ?", &[Value::Int64(Some(2))])
            .expect("Could not delete");
        uow.complete(&Ok(())).expect("Could not complete");
        assert_eq!(uow.state(), UnitState::Completed);
        assert!(uow.is_completed());
        assert_eq!(
            journal.sql(),
            [
                "BEGIN",
                "delete from book where id = ?",
                "delete from book where id = ?",
                "COMMIT"
            ]
        );
        let connections = journal
            .statements
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _, _)| *id)
            .collect::<Vec<_>>();
        assert!(
            connections.iter().all(|v| *v == connections[0]),
            "Every statement of a unit of work shares one connection"
        );
        assert_eq!(datasource.pool().idle_count(), 1);
    }

    #[test]
    fn read_only_has_no_transaction() {
        let (datasource, journal) = mock(2);
        let rows = datasource
            .scoped(TxMode::ReadOnly, "read", |uow| {
                let rows = uow.fetch("select 1", &[])?;
                assert_eq!(uow.state(), UnitState::Active);
                Ok(rows)
            })
            .expect("Could not read");
        assert!(rows.is_empty());
        assert_eq!(journal.sql(), ["select 1"]);

        datasource
            .scoped(TxMode::None, "autocommit", |uow| {
                uow.execute("insert into book(title) values(?)", &["x".into()])?;
                assert_eq!(uow.state(), UnitState::Active);
                Ok(())
            })
            .expect("Could not insert");
        assert!(!journal.sql().iter().any(|v| v == "BEGIN" || v == "COMMIT"));
    }

    #[test]
    fn failed_statement_rolls_back() {
        let (datasource, journal) = mock(2);
        journal.fail_on("insert");
        let mut uow = datasource.unit_of_work(TxMode::Write, "failing");
        uow.execute("update book set pages = ?", &[Value::Int64(Some(1))])
            .expect("Could not update");
        assert!(
            uow.execute("insert into book(title) values(?)", &["x".into()])
                .is_err()
        );
        assert_eq!(uow.state(), UnitState::Failed);
        assert_eq!(
            journal.sql(),
            [
                "BEGIN",
                "update book set pages = ?",
                "insert into book(title) values(?)",
                "ROLLBACK"
            ]
        );
        assert!(
            uow.execute("update book set pages = ?", &[Value::Int64(Some(2))])
                .is_err(),
            "A failed unit of work refuses further statements"
        );
        assert_eq!(journal.sql().len(), 4, "The refused statement never ran");
        assert!(
            uow.complete(&Ok(())).is_err(),
            "A rolled back transaction is never reported as committed"
        );
        assert_eq!(uow.state(), UnitState::Completed);
        assert_eq!(journal.sql().len(), 4, "No commit after a rollback");
        assert_eq!(datasource.pool().idle_count(), 1);
    }

    #[test]
    fn tolerated_error_still_fails_the_scope() {
        let (datasource, journal) = mock(1);
        journal.fail_on("duplicate");
        let result = datasource.scoped(TxMode::Write, "tolerant", |uow| {
            uow.execute("insert into book(title) values(?)", &["a".into()])?;
            let duplicate =
                uow.execute("insert duplicate into book(title) values(?)", &["a".into()]);
            assert!(duplicate.is_err());
            Ok(())
        });
        let error = result.unwrap_err();
        assert!(format!("{:#}", error).contains("rolled back"));
        assert!(!journal.sql().iter().any(|v| v == "COMMIT"));
        assert_eq!(journal.sql().last().map(String::as_str), Some("ROLLBACK"));
        assert_eq!(datasource.pool().idle_count(), 1);

        // A failure ending with the caller's own error keeps that error
        let result: keel_core::Result<()> = datasource.scoped(TxMode::Write, "caller", |uow| {
            uow.execute("insert duplicate into book(title) values(?)", &["b".into()])?;
            Ok(())
        });
        assert!(format!("{:#}", result.unwrap_err()).contains("insert duplicate"));
    }

    #[test]
    fn failure_without_transaction() {
        let (datasource, journal) = mock(1);
        journal.fail_on("bad");
        let mut uow = datasource.unit_of_work(TxMode::None, "plain");
        assert!(uow.execute("bad statement", &[]).is_err());
        assert_eq!(uow.state(), UnitState::Active);
        uow.execute("good statement", &[])
            .expect("The next statement still runs");
        uow.complete(&Ok(())).expect("Could not complete");
        assert_eq!(journal.sql(), ["bad statement", "good statement"]);
    }

    #[test]
    fn caller_error_rolls_back() {
        let (datasource, journal) = mock(2);
        let result: keel_core::Result<()> = datasource.scoped(TxMode::Write, "caller", |uow| {
            uow.execute("delete from book", &[])?;
            Err(Error::msg("business rule violated"))
        });
        assert_eq!(
            result.unwrap_err().to_string(),
            "business rule violated",
            "The caller error is returned as is"
        );
        assert_eq!(journal.sql(), ["BEGIN", "delete from book", "ROLLBACK"]);
    }

    #[test]
    fn complete_twice() {
        let (datasource, journal) = mock(2);
        let mut uow = datasource.unit_of_work(TxMode::Write, "twice");
        uow.execute("delete from book", &[]).unwrap();
        uow.complete(&Ok(())).unwrap();
        let statements = journal.sql().len();
        let idle = datasource.pool().idle_count();
        let open = datasource.pool().open_count();
        assert!(uow.complete(&Ok(())).is_err());
        assert!(uow.complete::<()>(&Err(Error::msg("late"))).is_err());
        assert_eq!(journal.sql().len(), statements);
        assert_eq!(datasource.pool().idle_count(), idle);
        assert_eq!(datasource.pool().open_count(), open);
        assert!(
            uow.execute("delete from book", &[]).is_err(),
            "A completed unit of work runs nothing"
        );
    }

    #[test]
    fn complete_without_statement() {
        let (datasource, journal) = mock(1);
        let mut uow = datasource.unit_of_work(TxMode::Write, "idle");
        uow.complete(&Ok(())).expect("Could not complete");
        assert!(journal.sql().is_empty());
        assert_eq!(uow.state(), UnitState::Completed);
    }

    #[test]
    fn drop_rolls_back() {
        let (datasource, journal) = mock(1);
        {
            let mut uow = datasource.unit_of_work(TxMode::Write, "forgotten");
            uow.execute("delete from book", &[]).unwrap();
            assert_eq!(datasource.pool().idle_count(), 0);
        }
        assert_eq!(journal.sql(), ["BEGIN", "delete from book", "ROLLBACK"]);
        assert_eq!(datasource.pool().idle_count(), 1);
        datasource
            .scoped(TxMode::ReadOnly, "after", |uow| uow.fetch("select 1", &[]))
            .expect("The connection is back in the pool");
    }

    #[test]
    fn commit_failure() {
        let (datasource, journal) = mock(1);
        journal.fail_on("COMMIT");
        let result = datasource.scoped(TxMode::Write, "commit", |uow| {
            uow.execute("delete from book", &[])
        });
        assert!(result.is_err());
        assert_eq!(
            journal.sql(),
            ["BEGIN", "delete from book", "COMMIT", "ROLLBACK"]
        );
        assert_eq!(datasource.pool().idle_count(), 1);
    }

    #[test]
    fn rollback_failure_discards_the_connection() {
        let (datasource, journal) = mock(1);
        journal.fail_on("ROLLBACK");
        let result: keel_core::Result<()> = datasource.scoped(TxMode::Write, "broken", |uow| {
            uow.execute("delete from book", &[])?;
            Err(Error::msg("abort"))
        });
        assert!(result.is_err());
        assert_eq!(datasource.pool().open_count(), 0);
        assert_eq!(datasource.pool().idle_count(), 0);
        assert_eq!(
            journal.closed.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
        *journal.fail_on.lock().unwrap() = None;
        datasource
            .scoped(TxMode::ReadOnly, "fresh", |uow| uow.fetch("select 1", &[]))
            .expect("A new connection is opened");
        assert_eq!(
            journal.connected.load(std::sync::atomic::Ordering::SeqCst),
            2
        );
    }

    #[test]
    fn begin_failure() {
        let (datasource, journal) = mock(1);
        journal.fail_on("BEGIN");
        let mut uow = datasource.unit_of_work(TxMode::Write, "begin");
        assert!(uow.execute("delete from book", &[]).is_err());
        assert_eq!(uow.state(), UnitState::Created);
        assert_eq!(journal.sql(), ["BEGIN"]);
        assert_eq!(datasource.pool().idle_count(), 1);
        uow.complete(&Ok(())).unwrap();
    }

    #[test]
    fn shard_key() {
        let (datasource, _) = mock(1);
        let mut uow = datasource.unit_of_work(TxMode::None, "shard");
        assert_eq!(uow.shard_key(), None);
        uow.set_shard_key(2024);
        assert_eq!(uow.shard_key(), Some(&Value::Int64(Some(2024))));
        uow.clear_shard_key();
        assert_eq!(uow.shard_key(), None);
        assert_eq!(uow.trace_id(), "shard");
        assert_eq!(uow.mode(), TxMode::None);
    }

    #[test]
    fn tracing() {
        let (datasource, _) = mock(1);
        let sink = Arc::new(Sink::default());
        let datasource = datasource.with_trace_sink(sink.clone());
        datasource
            .scoped(TxMode::Write, "trace-1", |uow| {
                uow.execute("update book set pages = ?", &[Value::Int64(Some(1))])?;
                uow.execute("update book set pages = ?", &[Value::Int64(Some(1))])?;
                uow.execute("update book set pages = ?", &[Value::Int64(Some(2))])
            })
            .unwrap();
        let before = sink.before.lock().unwrap().clone();
        let after = sink.after.lock().unwrap().clone();
        assert_eq!(before.len(), 3, "Transaction control is not traced");
        assert_eq!(after.len(), 3);
        assert!(before.iter().all(|(id, ..)| id == "trace-1"));
        assert_eq!(before[0].2, "[1]");
        assert_eq!(before[0].3, before[1].3, "Same statement, same fingerprint");
        assert_ne!(before[1].3, before[2].3, "Parameters take part in the fingerprint");
        for ((_, _, _, fingerprint), (_, after)) in before.iter().zip(after.iter()) {
            assert_eq!(fingerprint, after);
            assert_eq!(fingerprint.len(), 32);
            assert!(
                fingerprint
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
            );
        }
    }

    #[test]
    fn fingerprint_of_sql_and_params() {
        let params = [
            Value::Int64(Some(3)),
            Value::Varchar(Some("a".into())),
            Value::Null,
            Value::Boolean(Some(false)),
        ];
        let (json, hash) = fingerprint("select * from t where a = ?", &params);
        assert_eq!(json, r#"[3,"a",null,false]"#);
        assert_eq!(
            hash,
            format!(
                "{:X}",
                md5::compute(r#"select * from t where a = ?[3,"a",null,false]"#)
            )
        );
        let (json, _) = fingerprint("select 1", &[]);
        assert_eq!(json, "[]");
    }
}
