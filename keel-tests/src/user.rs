use keel::{
    AsValue, Dao, Datasource, EntityDescriptor, Error, LikeStyle, Matcher, Modifier, Order, Pager,
    TxMode, exec_raw,
};
use rust_decimal::Decimal;
use std::{collections::HashSet, str::FromStr, sync::Mutex};
use time::{PrimitiveDateTime, macros::datetime};

static MUTEX: Mutex<()> = Mutex::new(());

#[derive(Default, Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub follower_count: u32,
    pub is_active: bool,
    pub balance: Decimal,
    pub last_login: Option<PrimitiveDateTime>,
}

pub static USER_PROFILE: EntityDescriptor<UserProfile> = EntityDescriptor {
    table: "user_profiles",
    columns: &[
        "id",
        "username",
        "email",
        "full_name",
        "follower_count",
        "is_active",
        "balance",
        "last_login",
    ],
    auto_column: "id",
    sharding: None,
    instance: UserProfile::default,
    extract: |v| {
        vec![
            v.id.as_value(),
            v.username.clone().as_value(),
            v.email.clone().as_value(),
            v.full_name.clone().as_value(),
            v.follower_count.as_value(),
            v.is_active.as_value(),
            v.balance.as_value(),
            v.last_login.as_value(),
        ]
    },
    assign: |v, column, value| {
        match column {
            "id" => v.id = AsValue::try_from_value(value)?,
            "username" => v.username = AsValue::try_from_value(value)?,
            "email" => v.email = AsValue::try_from_value(value)?,
            "full_name" => v.full_name = AsValue::try_from_value(value)?,
            "follower_count" => v.follower_count = AsValue::try_from_value(value)?,
            "is_active" => v.is_active = AsValue::try_from_value(value)?,
            "balance" => v.balance = AsValue::try_from_value(value)?,
            "last_login" => v.last_login = AsValue::try_from_value(value)?,
            _ => return Err(Error::msg(format!("Unknown column `{}`", column))),
        }
        Ok(())
    },
};

pub(crate) const CREATE_USER_PROFILES: &str = r#"
    DROP TABLE IF EXISTS user_profiles;
    CREATE TABLE user_profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        full_name TEXT,
        follower_count INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL,
        balance REAL NOT NULL,
        last_login TEXT
    );
"#;

fn profile(
    username: &str,
    full_name: Option<&str>,
    follower_count: u32,
    is_active: bool,
    balance: &str,
    last_login: Option<PrimitiveDateTime>,
) -> UserProfile {
    UserProfile {
        id: 0,
        username: username.into(),
        email: format!("{}@example.com", username),
        full_name: full_name.map(Into::into),
        follower_count,
        is_active,
        balance: Decimal::from_str(balance).expect("Invalid decimal literal"),
        last_login,
    }
}

pub(crate) fn users(datasource: &Datasource) {
    let _lock = MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dao = Dao::new(&USER_PROFILE);

    // Setup
    let result = datasource.scoped(TxMode::None, "users-setup", |uow| {
        exec_raw(uow, CREATE_USER_PROFILES, &[])
    });
    assert!(
        result.is_ok(),
        "Failed to create user_profiles: {:?}",
        result.unwrap_err()
    );

    // Insert
    let mut users_to_create = vec![
        profile(
            "alice",
            Some("Alice Wonderland"),
            56,
            true,
            "10.5",
            Some(datetime!(2025-07-15 10:00:00)),
        ),
        profile("bob", Some("Bob Builder"), 99, false, "0", None),
        profile(
            "charlie",
            None,
            5000,
            true,
            "1250.25",
            Some(datetime!(2025-07-16 11:30:00)),
        ),
        profile("dean", Some("Dean Martin"), 15000, true, "3", None),
        profile(
            "eve",
            Some("Eve"),
            1,
            false,
            "-7.75",
            Some(datetime!(2024-01-01 00:00:00)),
        ),
    ];
    let result = datasource.scoped(TxMode::Write, "users-insert", |uow| {
        let mut total = 0;
        for user in users_to_create.iter_mut() {
            total += dao.insert(uow, user)?.rows_affected;
        }
        Ok(total)
    });
    assert!(
        result.is_ok(),
        "Failed to insert users: {:?}",
        result.unwrap_err()
    );
    assert_eq!(result.unwrap(), 5);
    let ids = users_to_create.iter().map(|v| v.id).collect::<HashSet<_>>();
    assert_eq!(ids.len(), 5, "Every insert must write back a distinct id");
    assert!(!ids.contains(&0));

    let mut uow = datasource.unit_of_work(TxMode::ReadOnly, "users-read");
    let result = (|| -> keel::Result<()> {
        // Insert then get by id round trips
        for user in &users_to_create {
            let found = dao
                .get_by_id(&mut uow, user.id, &[])?
                .expect("Inserted user must be found by id");
            assert_eq!(&found, user);
        }

        // Active users (alice, charlie, dean)
        let active = dao.query_list(
            &mut uow,
            &keel::Select::new().matcher(&Matcher::new().eq("is_active", true)),
        )?;
        assert_eq!(
            active
                .into_iter()
                .map(|u| u.username)
                .collect::<HashSet<_>>(),
            HashSet::from_iter(["alice".into(), "charlie".into(), "dean".into()])
        );

        // More than 1000 followers (charlie, dean)
        assert_eq!(
            dao.count(&mut uow, Some(&Matcher::new().gt("follower_count", 1000)))?,
            2
        );
        assert_eq!(dao.count(&mut uow, None)?, 5);

        // Explicit nesting: active and (never logged in or named like `ali%`)
        let matcher = Matcher::new().eq("is_active", true).group(
            Matcher::or()
                .is_null("last_login")
                .like("username", "ali", LikeStyle::Left),
        );
        let found = dao.query_list(
            &mut uow,
            &keel::Select::new()
                .matcher(&matcher)
                .orders(&[Order::asc("username")]),
        )?;
        assert_eq!(
            found.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
            ["alice", "dean"]
        );

        // Projection keeps the other fields blank
        let names = dao.query_list(
            &mut uow,
            &keel::Select::new()
                .view(&["id", "username"])
                .orders(&[Order::desc("follower_count")]),
        )?;
        assert_eq!(names.len(), 5);
        assert_eq!(names[0].username, "dean");
        assert_eq!(names[0].email, "");
        assert_eq!(names[0].follower_count, 0);

        // Pages
        let orders = [Order::asc("id")];
        let page = dao.query_page(&mut uow, None, &orders, Pager::new(2, 2), &[])?;
        assert_eq!(
            page.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
            ["charlie", "dean"]
        );
        let page = dao.query_page(&mut uow, None, &orders, Pager::new(3, 2), &[])?;
        assert_eq!(page.len(), 1);
        let page = dao.query_page(&mut uow, None, &orders, Pager::new(4, 2), &[])?;
        assert!(page.is_empty());
        let page = dao.query_page(
            &mut uow,
            Some(&Matcher::new().eq("is_active", true)),
            &orders,
            Pager::new(1, 2),
            &["id", "username"],
        )?;
        assert_eq!(
            page.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
            ["alice", "charlie"]
        );
        assert!(page.iter().all(|u| u.email.is_empty() && u.follower_count == 0));
        let found = dao
            .get_by_id(&mut uow, users_to_create[1].id, &["username"])?
            .expect("Projected user must be found by id");
        assert_eq!(found.username, users_to_create[1].username);
        assert_eq!(found.id, 0);

        // By ids
        let some = dao.get_by_ids(
            &mut uow,
            [users_to_create[0].id, users_to_create[4].id, 987_654],
            &[],
        )?;
        assert_eq!(some.len(), 2);
        assert!(dao.get_by_ids(&mut uow, Vec::<i64>::new(), &[])?.is_empty());

        // First by order
        let richest = dao
            .query_one(&mut uow, None, &[Order::desc("balance")], &[])?
            .expect("There must be at least one user");
        assert_eq!(richest.username, "charlie");
        assert_eq!(richest.balance, Decimal::from_str("1250.25").unwrap());
        Ok(())
    })();
    uow.complete(&result).expect("Failed to complete the read unit of work");
    assert!(result.is_ok(), "Read scenario failed: {:?}", result.unwrap_err());

    // Update a whole entity
    let mut bob = users_to_create[1].clone();
    bob.is_active = true;
    bob.full_name = Some("Robert Builder".into());
    bob.last_login = Some(datetime!(2025-07-17 20:00:00.250));
    let result = datasource.scoped(TxMode::Write, "users-save-bob", |uow| dao.update(uow, &bob));
    assert!(
        result.is_ok(),
        "Failed to save Bob: {:?}",
        result.unwrap_err()
    );
    assert_eq!(result.unwrap(), 1);
    let updated_bob = datasource
        .scoped(TxMode::ReadOnly, "users-read-bob", |uow| dao.get_by_id(uow, bob.id, &[]))
        .expect("Expected query to succeed")
        .expect("Could not find bob");
    assert_eq!(updated_bob, bob);

    // Update by id changes only the listed fields
    let alice = &users_to_create[0];
    let result = datasource.scoped(TxMode::Write, "users-follow-alice", |uow| {
        dao.update_by_id(
            uow,
            alice.id,
            &Modifier::new()
                .add("follower_count", 10)
                .set("full_name", "Alice Liddell"),
        )
    });
    assert_eq!(result.expect("Failed to update alice"), 1);
    let updated_alice = datasource
        .scoped(TxMode::ReadOnly, "users-read-alice", |uow| {
            dao.get_by_id(uow, alice.id, &[])
        })
        .expect("Expected query to succeed")
        .expect("Could not find alice");
    assert_eq!(updated_alice.follower_count, 66);
    assert_eq!(updated_alice.full_name.as_deref(), Some("Alice Liddell"));
    assert_eq!(updated_alice.email, alice.email);
    assert_eq!(updated_alice.balance, alice.balance);
    assert_eq!(updated_alice.last_login, alice.last_login);

    // Update many
    let result = datasource.scoped(TxMode::Write, "users-deactivate", |uow| {
        dao.update_by_ids(
            uow,
            [users_to_create[2].id, users_to_create[3].id],
            &Modifier::new().set("is_active", false),
        )
    });
    assert_eq!(result.expect("Failed to update by ids"), 2);
    let result = datasource.scoped(TxMode::Write, "users-reward", |uow| {
        dao.update_by_matcher(
            uow,
            &Matcher::new().lt("balance", 5),
            &Modifier::new().add("balance", 1),
        )
    });
    assert_eq!(result.expect("Failed to update by matcher"), 3);

    // Empty matchers never touch the whole table
    let result = datasource.scoped(TxMode::Write, "users-unsafe", |uow| {
        dao.update_by_matcher(uow, &Matcher::new(), &Modifier::new().set("balance", 0))
    });
    assert!(result.is_err(), "An empty matcher must not update every row");
    let result = datasource.scoped(TxMode::Write, "users-unsafe", |uow| {
        dao.delete_by_matcher(uow, &Matcher::new())
    });
    assert!(result.is_err(), "An empty matcher must not delete every row");

    // Delete eve
    let eve = &users_to_create[4];
    let result = datasource.scoped(TxMode::Write, "users-delete-eve", |uow| {
        dao.delete_by_id(uow, eve.id)
    });
    assert_eq!(result.expect("Failed to delete Eve"), 1);
    let maybe_eve = datasource
        .scoped(TxMode::ReadOnly, "users-read-eve", |uow| dao.get_by_id(uow, eve.id, &[]))
        .expect("Expected query to succeed");
    assert!(maybe_eve.is_none(), "Eve should have been deleted");

    // Delete those who never logged in (only dean)
    let result = datasource.scoped(TxMode::Write, "users-delete-idle", |uow| {
        dao.delete_by_matcher(uow, &Matcher::new().is_null("last_login"))
    });
    assert_eq!(result.expect("Failed to delete by matcher"), 1);
    let result = datasource.scoped(TxMode::Write, "users-delete-none", |uow| {
        dao.delete_by_ids(uow, Vec::<i64>::new())
    });
    assert_eq!(result.expect("Empty id list must be a no-op"), 0);

    // Remaining: alice, bob, charlie
    let remaining = datasource
        .scoped(TxMode::ReadOnly, "users-remaining", |uow| {
            dao.get_all(uow, &[Order::asc("username")], &[])
        })
        .expect("Expected query to succeed");
    assert_eq!(
        remaining
            .iter()
            .map(|u| u.username.as_str())
            .collect::<Vec<_>>(),
        ["alice", "bob", "charlie"]
    );

    // Update a list then wipe everything explicitly
    let result = datasource.scoped(TxMode::Write, "users-update-list", |uow| {
        let mut remaining = remaining.clone();
        for user in remaining.iter_mut() {
            user.follower_count += 1;
        }
        dao.update_list(uow, &remaining)
    });
    assert_eq!(result.expect("Failed to update the list"), 3);
    let result = datasource.scoped(TxMode::Write, "users-update-all", |uow| {
        dao.update_all(uow, &Modifier::new().set("is_active", true))
    });
    assert_eq!(result.expect("Failed to update all"), 3);
    let result = datasource.scoped(TxMode::Write, "users-delete-all", |uow| dao.delete_all(uow));
    assert_eq!(result.expect("Failed to delete all"), 3);
    let count = datasource
        .scoped(TxMode::ReadOnly, "users-count", |uow| dao.count(uow, None))
        .expect("Expected count to succeed");
    assert_eq!(count, 0);
}
