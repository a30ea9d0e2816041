use crate::{USER_PROFILE, UserProfile, user::CREATE_USER_PROFILES};
use keel::{Dao, Datasource, Matcher, Modifier, TxMode, UnitState, exec_raw};
use std::sync::Mutex;

static MUTEX: Mutex<()> = Mutex::new(());

fn user(username: &str) -> UserProfile {
    UserProfile {
        username: username.into(),
        email: format!("{}@example.com", username),
        ..Default::default()
    }
}

pub(crate) fn transaction(datasource: &Datasource) {
    let _lock = MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dao = Dao::new(&USER_PROFILE);

    // Setup
    datasource
        .scoped(TxMode::None, "transaction-setup", |uow| {
            exec_raw(uow, CREATE_USER_PROFILES, &[])
        })
        .expect("Failed to create user_profiles");
    let count = |trace_id: &str| {
        datasource
            .scoped(TxMode::ReadOnly, trace_id, |uow| dao.count(uow, None))
            .expect("Failed to count the users")
    };

    // Commit
    let mut uow = datasource.unit_of_work(TxMode::Write, "transaction-commit");
    assert_eq!(uow.state(), UnitState::Created);
    let result = dao.insert(&mut uow, &mut user("frank"));
    assert!(result.is_ok(), "Insert failed: {:?}", result.as_ref().unwrap_err());
    assert_eq!(uow.state(), UnitState::InTransaction);
    uow.complete(&result).expect("Failed to commit");
    assert_eq!(uow.state(), UnitState::Completed);
    assert_eq!(count("transaction-count-1"), 1);

    // The second statement fails: the first one is rolled back too
    let result = datasource.scoped(TxMode::Write, "transaction-rollback", |uow| {
        dao.insert(uow, &mut user("grace"))?;
        // Same username violates the unique constraint
        dao.insert(uow, &mut user("frank"))?;
        Ok(())
    });
    assert!(result.is_err(), "The duplicate username must fail");
    assert_eq!(count("transaction-count-2"), 1);

    // After a failed statement the unit of work refuses to continue
    let mut uow = datasource.unit_of_work(TxMode::Write, "transaction-failed");
    dao.insert(&mut uow, &mut user("heidi"))
        .expect("Insert must succeed");
    assert!(dao.insert(&mut uow, &mut user("frank")).is_err());
    assert_eq!(uow.state(), UnitState::Failed);
    assert!(
        dao.update_by_matcher(
            &mut uow,
            &Matcher::new().eq("username", "heidi"),
            &Modifier::new().set("follower_count", 1)
        )
        .is_err()
    );
    assert!(
        uow.complete(&Ok(())).is_err(),
        "A rolled back transaction is not reported as committed"
    );
    assert_eq!(count("transaction-count-3"), 1);

    // An error reported by the caller rolls back
    let result = datasource.scoped(TxMode::Write, "transaction-caller-error", |uow| {
        dao.insert(uow, &mut user("ivan"))?;
        Err::<(), _>(keel::Error::msg("Business rule violated"))
    });
    assert!(result.is_err());
    assert_eq!(count("transaction-count-4"), 1);

    // Completing twice is rejected and leaves the pool consistent
    let idle = datasource.pool().idle_count();
    let open = datasource.pool().open_count();
    let mut uow = datasource.unit_of_work(TxMode::Write, "transaction-double");
    let result = dao.insert(&mut uow, &mut user("judy"));
    uow.complete(&result).expect("Failed to commit");
    assert!(uow.complete(&result).is_err());
    assert_eq!(datasource.pool().idle_count(), idle);
    assert_eq!(datasource.pool().open_count(), open);
    assert_eq!(count("transaction-count-5"), 2);

    // Dropping without completion rolls back and returns the connection
    {
        let mut uow = datasource.unit_of_work(TxMode::Write, "transaction-dropped");
        dao.insert(&mut uow, &mut user("mallory"))
            .expect("Insert must succeed");
    }
    assert_eq!(datasource.pool().idle_count(), idle);
    assert_eq!(count("transaction-count-6"), 2);

    // Without a transaction every statement stands on its own
    let result = datasource.scoped(TxMode::None, "transaction-none", |uow| {
        dao.insert(uow, &mut user("niaj"))?;
        assert_eq!(uow.state(), UnitState::Active);
        dao.insert(uow, &mut user("niaj"))?;
        Ok(())
    });
    assert!(result.is_err());
    assert_eq!(count("transaction-count-7"), 3);
}
