use keel::{AsValue, Batching, Datasource, TxMode, exec_raw, query_raw, query_raw_batched};
use std::{ops::ControlFlow, sync::Mutex};
use time::{Date, macros::date};

static MUTEX: Mutex<()> = Mutex::new(());

pub(crate) fn raw(datasource: &Datasource) {
    let _lock = MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    // Setup
    let result = datasource.scoped(TxMode::Write, "raw-setup", |uow| {
        exec_raw(
            uow,
            "DROP TABLE IF EXISTS holidays; CREATE TABLE holidays (day TEXT NOT NULL, name TEXT NOT NULL);",
            &[],
        )?;
        let mut inserted = 0;
        for (day, name) in [
            (date!(2025 - 01 - 01), "New Year"),
            (date!(2025 - 05 - 01), "Labour Day"),
            (date!(2025 - 08 - 15), "Assumption"),
            (date!(2025 - 12 - 25), "Christmas"),
            (date!(2025 - 12 - 26), "Boxing Day"),
        ] {
            inserted += exec_raw(
                uow,
                "INSERT INTO holidays (day, name) VALUES (?, ?)",
                &[day.as_value(), name.into()],
            )?
            .rows_affected;
        }
        Ok(inserted)
    });
    assert_eq!(result.expect("Failed to insert the holidays"), 5);

    // Manual row scan
    let result = datasource.scoped(TxMode::ReadOnly, "raw-query", |uow| {
        query_raw(
            uow,
            "SELECT day, name FROM holidays WHERE day >= ? ORDER BY day",
            &[date!(2025 - 12 - 01).as_value()],
            |row| {
                Ok((
                    Date::try_from_value(row.values[0].clone())?,
                    String::try_from_value(row.values[1].clone())?,
                ))
            },
        )
    });
    assert_eq!(
        result.expect("Failed to query the holidays"),
        [
            (date!(2025 - 12 - 25), "Christmas".to_string()),
            (date!(2025 - 12 - 26), "Boxing Day".to_string()),
        ]
    );

    // Wrong parameter count is caught before stepping
    let result = datasource.scoped(TxMode::ReadOnly, "raw-params", |uow| {
        query_raw(uow, "SELECT name FROM holidays WHERE day = ?", &[], Ok)
    });
    assert!(result.is_err());

    // Batched raw query
    let mut names = Vec::new();
    let delivered = datasource
        .scoped(TxMode::ReadOnly, "raw-batched", |uow| {
            query_raw_batched(
                uow,
                "SELECT name FROM holidays ORDER BY day",
                &[],
                Batching::new(2, 3),
                |rows| {
                    names.extend(rows.into_iter().filter_map(|r| {
                        r.get_column("name")
                            .cloned()
                            .and_then(|v| String::try_from_value(v).ok())
                    }));
                    ControlFlow::Continue(())
                },
            )
        })
        .expect("Failed to run the batched query");
    assert_eq!(delivered, 3);
    assert_eq!(names, ["New Year", "Labour Day", "Assumption"]);
}
