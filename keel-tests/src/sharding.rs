use keel::{
    AsValue, Dao, Datasource, EntityDescriptor, Error, Modifier, Result, TxMode, Value, exec_raw,
};
use std::sync::Mutex;

static MUTEX: Mutex<()> = Mutex::new(());

#[derive(Default, Debug, Clone, PartialEq)]
struct Invoice {
    id: i64,
    tenant: i64,
    amount: f64,
}

/// Tenants are spread over `invoices_0` and `invoices_1`.
fn shard_by_tenant(table: &str, key: &Value) -> Result<String> {
    let tenant = i64::try_from_value(key.clone())?;
    Ok(format!("{}_{}", table, tenant.rem_euclid(2)))
}

static INVOICE: EntityDescriptor<Invoice> = EntityDescriptor {
    table: "invoices",
    columns: &["id", "tenant", "amount"],
    auto_column: "id",
    sharding: Some(&shard_by_tenant),
    instance: Invoice::default,
    extract: |v| vec![v.id.as_value(), v.tenant.as_value(), v.amount.as_value()],
    assign: |v, column, value| {
        match column {
            "id" => v.id = AsValue::try_from_value(value)?,
            "tenant" => v.tenant = AsValue::try_from_value(value)?,
            "amount" => v.amount = AsValue::try_from_value(value)?,
            _ => return Err(Error::msg(format!("Unknown column `{}`", column))),
        }
        Ok(())
    },
};

pub(crate) fn sharding(datasource: &Datasource) {
    let _lock = MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dao = Dao::new(&INVOICE);

    // Setup
    datasource
        .scoped(TxMode::None, "sharding-setup", |uow| {
            for shard in ["invoices_0", "invoices_1"] {
                exec_raw(
                    uow,
                    &format!(
                        "DROP TABLE IF EXISTS {shard}; CREATE TABLE {shard} (id INTEGER PRIMARY KEY AUTOINCREMENT, tenant INTEGER NOT NULL, amount REAL NOT NULL);"
                    ),
                    &[],
                )?;
            }
            Ok(())
        })
        .expect("Failed to create the shards");

    // Without a shard key the table cannot be resolved, nothing runs
    let result = datasource.scoped(TxMode::ReadOnly, "sharding-missing-key", |uow| {
        dao.count(uow, None)
    });
    assert!(result.is_err(), "A sharded table requires a shard key");

    // Each tenant lands in its own shard
    for (tenant, amount) in [(1, 10.0), (2, 20.0), (3, 30.0), (3, 5.5)] {
        let result = datasource.scoped(TxMode::Write, "sharding-insert", |uow| {
            uow.set_shard_key(tenant);
            let mut invoice = Invoice {
                id: 0,
                tenant,
                amount,
            };
            dao.insert(uow, &mut invoice)
        });
        assert!(
            result.is_ok(),
            "Failed to insert the invoice: {:?}",
            result.unwrap_err()
        );
    }
    let count_shard = |shard: &str| {
        datasource
            .scoped(TxMode::ReadOnly, "sharding-count", |uow| {
                keel::query_raw(uow, &format!("SELECT COUNT(*) FROM {}", shard), &[], |row| {
                    i64::try_from_value(row.values[0].clone())
                })
            })
            .expect("Failed to count the shard")[0]
    };
    assert_eq!(count_shard("invoices_0"), 1);
    assert_eq!(count_shard("invoices_1"), 3);

    // Statements follow the key of the unit of work
    let result = datasource.scoped(TxMode::Write, "sharding-update", |uow| {
        uow.set_shard_key(3);
        let updated = dao.update_all(uow, &Modifier::new().add("amount", 1))?;
        uow.set_shard_key(2);
        let total = dao.count(uow, None)?;
        Ok((updated, total))
    });
    assert_eq!(result.expect("Failed to update the shard"), (3, 1));
}
