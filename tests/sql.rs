#[cfg(test)]
mod tests {
    use indoc::indoc;
    use keel::{
        AsValue, EntityDescriptor, Error, GenericSqlWriter, LikeStyle, Limit, Matcher, Modifier,
        Order, Pager, Scope, Select, Statement, Value,
    };
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use time::{PrimitiveDateTime, macros::datetime};

    const WRITER: GenericSqlWriter = GenericSqlWriter::new();

    #[derive(Default, Debug, Clone, PartialEq)]
    struct Cart {
        id: i64,
        user_id: i64,
        created_at: Option<PrimitiveDateTime>,
        is_active: bool,
        total_price: Decimal,
    }

    static CART: EntityDescriptor<Cart> = EntityDescriptor {
        table: "cart",
        columns: &["id", "user_id", "created_at", "is_active", "total_price"],
        auto_column: "id",
        sharding: None,
        instance: Cart::default,
        extract: |v| {
            vec![
                v.id.as_value(),
                v.user_id.as_value(),
                v.created_at.as_value(),
                v.is_active.as_value(),
                v.total_price.as_value(),
            ]
        },
        assign: |v, column, value| {
            match column {
                "id" => v.id = AsValue::try_from_value(value)?,
                "user_id" => v.user_id = AsValue::try_from_value(value)?,
                "created_at" => v.created_at = AsValue::try_from_value(value)?,
                "is_active" => v.is_active = AsValue::try_from_value(value)?,
                "total_price" => v.total_price = AsValue::try_from_value(value)?,
                _ => return Err(Error::msg(format!("Unknown column `{}`", column))),
            }
            Ok(())
        },
    };

    #[test]
    fn test_1() {
        let matcher = Matcher::new()
            .eq("is_active", true)
            .group(
                Matcher::or()
                    .gte("total_price", Decimal::from_str("99.90").unwrap())
                    .is_null("created_at"),
            )
            .not_in_list("user_id", [3, 5, 8]);
        let orders = [Order::desc("created_at"), Order::asc("id")];
        let statement = Statement::select(
            &WRITER,
            &CART,
            None,
            &Select::new()
                .view(&["id", "total_price"])
                .matcher(&matcher)
                .orders(&orders)
                .limit(Pager::new(2, 20).limit().unwrap()),
        )
        .unwrap();
        assert_eq!(
            statement.sql,
            indoc! {"
                select id, total_price from cart
                 where is_active = ? and (total_price >= ? or created_at is null) and user_id not in (?,?,?)
                 order by created_at desc, id asc
                 limit 20 offset 20
            "}
            .replace('\n', "")
        );
        assert_eq!(
            statement.params,
            [
                Value::Boolean(Some(true)),
                Value::Decimal(Some(Decimal::new(9990, 2))),
                Value::Int64(Some(3)),
                Value::Int64(Some(5)),
                Value::Int64(Some(8)),
            ]
        );
    }

    #[test]
    fn test_2() {
        let cart = Cart {
            id: 0,
            user_id: 17,
            created_at: Some(datetime!(2025-06-01 12:30)),
            is_active: true,
            total_price: Decimal::new(4250, 2),
        };
        let insert = Statement::insert(&WRITER, &CART, None, &cart).unwrap();
        assert_eq!(
            insert.sql,
            "insert into cart(user_id, created_at, is_active, total_price) values(?, ?, ?, ?)"
        );
        assert_eq!(insert.params.len(), 4);
        assert_eq!(insert.params[1], Value::Timestamp(Some(datetime!(2025-06-01 12:30))));

        let update = Statement::update(
            &WRITER,
            &CART,
            None,
            &Modifier::new()
                .set("is_active", false)
                .add("total_price", Decimal::new(-500, 2)),
            Scope::Matching(&Matcher::new().like("user_id", "1", LikeStyle::Left)),
        )
        .unwrap();
        assert_eq!(
            update.sql,
            "update cart set is_active = ?, total_price = total_price + ? where user_id like ?"
        );
        assert_eq!(update.params[2], Value::Varchar(Some("1%".into())));

        let count = Statement::count(&WRITER, &CART, None, None).unwrap();
        assert_eq!(count.sql, "select count(*) from cart");

        let delete = Statement::delete(
            &WRITER,
            &CART,
            None,
            Scope::Matching(&Matcher::new().between(
                "created_at",
                datetime!(2025-01-01 00:00),
                datetime!(2025-02-01 00:00),
            )),
        )
        .unwrap();
        assert_eq!(delete.sql, "delete from cart where created_at between ? and ?");
        assert!(Statement::delete(&WRITER, &CART, None, Scope::Matching(&Matcher::new())).is_err());
    }

    #[test]
    fn test_3() {
        let statement = Statement::select(
            &WRITER,
            &CART,
            None,
            &Select::new().limit(Limit {
                limit: 1,
                offset: 0,
            }),
        )
        .unwrap();
        assert_eq!(
            statement.sql,
            "select id, user_id, created_at, is_active, total_price from cart limit 1 offset 0"
        );
        assert!(statement.params.is_empty());
    }
}
