use crate::RecordingSink;
use keel::{
    AsValue, Batching, Dao, Datasource, EntityDescriptor, Error, Matcher, Order, Select, TxMode,
    exec_raw,
};
use std::{ops::ControlFlow, sync::Mutex};

static MUTEX: Mutex<()> = Mutex::new(());

#[derive(Default, Debug, Clone, PartialEq)]
struct Reading {
    id: i64,
    sensor: String,
    celsius: f64,
}

static READING: EntityDescriptor<Reading> = EntityDescriptor {
    table: "readings",
    columns: &["id", "sensor", "celsius"],
    auto_column: "id",
    sharding: None,
    instance: Reading::default,
    extract: |v| {
        vec![
            v.id.as_value(),
            v.sensor.clone().as_value(),
            v.celsius.as_value(),
        ]
    },
    assign: |v, column, value| {
        match column {
            "id" => v.id = AsValue::try_from_value(value)?,
            "sensor" => v.sensor = AsValue::try_from_value(value)?,
            "celsius" => v.celsius = AsValue::try_from_value(value)?,
            _ => return Err(Error::msg(format!("Unknown column `{}`", column))),
        }
        Ok(())
    },
};

pub(crate) fn batched(datasource: &Datasource, sink: &RecordingSink) {
    let _lock = MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dao = Dao::new(&READING);

    // Setup: 7 readings of sensor `a`, 2 of sensor `b`
    let result = datasource.scoped(TxMode::Write, "batched-setup", |uow| {
        exec_raw(
            uow,
            r#"
            DROP TABLE IF EXISTS readings;
            CREATE TABLE readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sensor TEXT NOT NULL,
                celsius REAL NOT NULL
            );
            "#,
            &[],
        )?;
        for (i, sensor) in ["a", "a", "b", "a", "a", "a", "b", "a", "a"].iter().enumerate() {
            let mut reading = Reading {
                id: 0,
                sensor: sensor.to_string(),
                celsius: 20.0 + i as f64,
            };
            dao.insert(uow, &mut reading)?;
        }
        Ok(())
    });
    assert!(
        result.is_ok(),
        "Failed to setup readings: {:?}",
        result.unwrap_err()
    );
    let matcher = Matcher::new().eq("sensor", "a");
    let orders = [Order::asc("id")];
    let select = Select::new().matcher(&matcher).orders(&orders);

    // Budget of 5 in pages of 2: 2 + 2 + 1, three round trips
    let mut pages = Vec::new();
    let delivered = datasource
        .scoped(TxMode::ReadOnly, "batched-budget", |uow| {
            dao.query_batched(uow, &select, Batching::new(2, 5), |page| {
                pages.push(page.len());
                ControlFlow::Continue(())
            })
        })
        .expect("Batched query failed");
    assert_eq!(delivered, 5);
    assert_eq!(pages, [2, 2, 1]);
    let statements = sink.statements("batched-budget");
    assert_eq!(statements.len(), 3);
    assert!(statements[2].sql.ends_with(" limit 1 offset 4"));

    // Stop on the first row: a single round trip whatever the budget
    let mut seen = Vec::new();
    let delivered = datasource
        .scoped(TxMode::ReadOnly, "batched-stop", |uow| {
            dao.query_batched(uow, &select, Batching::new(2, 0), |page| {
                seen.extend(page.into_iter().take(1));
                ControlFlow::Break(())
            })
        })
        .expect("Batched query failed");
    assert_eq!(delivered, 2);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].celsius, 20.0);
    assert_eq!(sink.statements("batched-stop").len(), 1);

    // No budget: runs until a short page
    let mut total = 0;
    let delivered = datasource
        .scoped(TxMode::ReadOnly, "batched-unbounded", |uow| {
            dao.query_batched(uow, &select, Batching::new(3, 0), |page| {
                total += page.len();
                ControlFlow::Continue(())
            })
        })
        .expect("Batched query failed");
    assert_eq!(delivered, 7);
    assert_eq!(total, 7);
    assert_eq!(sink.statements("batched-unbounded").len(), 3);

    // Projection decodes only the requested columns
    let mut sensors = Vec::new();
    datasource
        .scoped(TxMode::ReadOnly, "batched-view", |uow| {
            dao.query_batched(
                uow,
                &select.view(&["id", "sensor"]),
                Batching::new(4, 0),
                |page| {
                    sensors.extend(page);
                    ControlFlow::Continue(())
                },
            )
        })
        .expect("Batched query failed");
    assert_eq!(sensors.len(), 7);
    assert!(sensors.iter().all(|r| r.sensor == "a" && r.celsius == 0.0));

    // Build errors are reported before any round trip
    let result = datasource.scoped(TxMode::ReadOnly, "batched-invalid", |uow| {
        dao.query_batched(uow, &select, Batching::new(0, 10), |_| {
            ControlFlow::Continue(())
        })
    });
    assert!(result.is_err());
    let result = datasource.scoped(TxMode::ReadOnly, "batched-invalid", |uow| {
        dao.query_batched(
            uow,
            &select.view(&["id", "humidity"]),
            Batching::new(2, 10),
            |_| ControlFlow::Continue(()),
        )
    });
    assert!(result.is_err());
    assert!(sink.statements("batched-invalid").is_empty());
}
