mod common;

#[cfg(test)]
mod tests {
    use crate::common::{BOOK, LOAN};
    use indoc::indoc;
    use keel_core::{
        GenericSqlWriter, Limit, Matcher, Modifier, Order, Pager, Scope, Select, SqlWriter,
        Statement, Value,
    };

    const WRITER: GenericSqlWriter = GenericSqlWriter::new();

    /// Quotes identifiers, numbered placeholders.
    struct NumberedWriter;

    impl SqlWriter for NumberedWriter {
        fn as_dyn(&self) -> &dyn SqlWriter {
            self
        }

        fn write_identifier(&self, out: &mut String, name: &str) {
            out.push('"');
            out.push_str(name);
            out.push('"');
        }

        fn write_placeholder(&self, out: &mut String, index: usize) {
            out.push('$');
            out.push_str(&index.to_string());
        }
    }

    #[test]
    fn select() {
        let matcher = Matcher::new().gt("pages", 100).is_not_null("author");
        let orders = [Order::desc("pages"), Order::asc("id")];
        let statement = Statement::select(
            &WRITER,
            &BOOK,
            None,
            &Select::new()
                .matcher(&matcher)
                .orders(&orders)
                .limit(Limit {
                    limit: 10,
                    offset: 20,
                }),
        )
        .expect("Could not build the select");
        assert_eq!(
            statement.sql,
            "select id, title, author, pages from book where pages > ? and author is not null order by pages desc, id asc limit 10 offset 20"
        );
        assert_eq!(statement.params, [Value::Int64(Some(100))]);

        let statement = Statement::select(&WRITER, &BOOK, None, &Select::new())
            .expect("Could not build the select");
        assert_eq!(statement.sql, "select id, title, author, pages from book");
        assert!(statement.params.is_empty());

        let empty = Matcher::new();
        let statement = Statement::select(&WRITER, &BOOK, None, &Select::new().matcher(&empty))
            .expect("Could not build the select");
        assert_eq!(statement.sql, "select id, title, author, pages from book");
    }

    #[test]
    fn select_view() {
        let statement = Statement::select(
            &WRITER,
            &BOOK,
            None,
            &Select::new().view(&["title", "id"]),
        )
        .expect("Could not build the select");
        assert_eq!(statement.sql, "select title, id from book");
        assert!(
            Statement::select(&WRITER, &BOOK, None, &Select::new().view(&["isbn"])).is_err(),
            "Unknown view column"
        );
        let orders = [Order::asc("isbn")];
        assert!(
            Statement::select(&WRITER, &BOOK, None, &Select::new().orders(&orders)).is_err(),
            "Unknown order column"
        );
    }

    #[test]
    fn matcher_columns_are_checked() {
        let unknown = Matcher::new()
            .eq("title", "Dune")
            .group(Matcher::or().eq("isbn", 1).lt("pages", 9));
        let injected = Matcher::new().eq("1=1 or id", 1);
        for matcher in [&unknown, &injected] {
            assert!(
                Statement::select(&WRITER, &BOOK, None, &Select::new().matcher(matcher)).is_err()
            );
            assert!(Statement::count(&WRITER, &BOOK, None, Some(matcher)).is_err());
            assert!(Statement::delete(&WRITER, &BOOK, None, Scope::Matching(matcher)).is_err());
            assert!(
                Statement::update(
                    &WRITER,
                    &BOOK,
                    None,
                    &Modifier::new().set("pages", 1),
                    Scope::Matching(matcher)
                )
                .is_err()
            );
            assert!(
                Statement::update_entity(
                    &WRITER,
                    &BOOK,
                    None,
                    &Default::default(),
                    &[],
                    Scope::Matching(matcher)
                )
                .is_err()
            );
        }
        let error = Statement::select(&WRITER, &BOOK, None, &Select::new().matcher(&unknown))
            .unwrap_err();
        assert!(error.to_string().contains("isbn"));
    }

    #[test]
    fn count() {
        let matcher = Matcher::or().eq("author", "Herbert").lt("pages", 50);
        let statement =
            Statement::count(&WRITER, &BOOK, None, Some(&matcher)).expect("Could not count");
        assert_eq!(
            statement.sql,
            "select count(*) from book where author = ? or pages < ?"
        );
        assert_eq!(statement.params.len(), 2);
        let statement = Statement::count(&WRITER, &BOOK, None, None).expect("Could not count");
        assert_eq!(statement.sql, "select count(*) from book");
    }

    #[test]
    fn insert_skips_auto_column() {
        let book = crate::common::Book {
            id: 99,
            title: "Solaris".into(),
            author: Some("Lem".into()),
            pages: 204,
        };
        let statement =
            Statement::insert(&WRITER, &BOOK, None, &book).expect("Could not build the insert");
        assert_eq!(
            statement.sql,
            "insert into book(title, author, pages) values(?, ?, ?)"
        );
        assert_eq!(
            statement.params,
            [
                Value::Varchar(Some("Solaris".into())),
                Value::Varchar(Some("Lem".into())),
                Value::Int64(Some(204)),
            ]
        );
    }

    #[test]
    fn update_and_delete() {
        let book = crate::common::Book {
            id: 7,
            title: "Dune".into(),
            author: None,
            pages: 412,
        };
        let by_id = Matcher::new().eq("id", 7);
        let statement = Statement::update_entity(
            &WRITER,
            &BOOK,
            None,
            &book,
            &["id"],
            Scope::Matching(&by_id),
        )
        .expect("Could not build the update");
        assert_eq!(
            statement.sql,
            "update book set title = ?, author = ?, pages = ? where id = ?"
        );
        assert_eq!(
            statement.params,
            [
                Value::Varchar(Some("Dune".into())),
                Value::Varchar(None),
                Value::Int64(Some(412)),
                Value::Int64(Some(7)),
            ]
        );
        assert!(
            Statement::update_entity(
                &WRITER,
                &BOOK,
                None,
                &book,
                &["title", "author", "pages"],
                Scope::Everything,
            )
            .is_err(),
            "Nothing left to set"
        );

        let modifier = Modifier::new().add("pages", 10).set("author", "Herbert");
        let statement = Statement::update(
            &WRITER,
            &BOOK,
            None,
            &modifier,
            Scope::Matching(&Matcher::new().in_list("id", [1, 2])),
        )
        .expect("Could not build the update");
        assert_eq!(
            statement.sql,
            "update book set pages = pages + ?, author = ? where id in (?,?)"
        );
        assert_eq!(statement.params.len(), 4);
        let statement = Statement::update(&WRITER, &BOOK, None, &modifier, Scope::Everything)
            .expect("Could not build the update");
        assert_eq!(statement.sql, "update book set pages = pages + ?, author = ?");
        assert!(
            Statement::update(
                &WRITER,
                &BOOK,
                None,
                &Modifier::new().set("isbn", "x"),
                Scope::Everything
            )
            .is_err(),
            "Unknown modifier column"
        );

        let statement = Statement::delete(
            &WRITER,
            &BOOK,
            None,
            Scope::Matching(&Matcher::new().lt("pages", 10)),
        )
        .expect("Could not build the delete");
        assert_eq!(statement.sql, "delete from book where pages < ?");
        let statement = Statement::delete(&WRITER, &BOOK, None, Scope::Everything)
            .expect("Could not build the delete");
        assert_eq!(statement.sql, "delete from book");
    }

    #[test]
    fn empty_scope_is_rejected() {
        let empty = Matcher::new().group(Matcher::or());
        assert!(Statement::delete(&WRITER, &BOOK, None, Scope::Matching(&empty)).is_err());
        assert!(
            Statement::update(
                &WRITER,
                &BOOK,
                None,
                &Modifier::new().set("pages", 1),
                Scope::Matching(&empty)
            )
            .is_err()
        );
        assert!(
            Statement::update_entity(
                &WRITER,
                &BOOK,
                None,
                &Default::default(),
                &[],
                Scope::Matching(&empty)
            )
            .is_err()
        );
    }

    #[test]
    fn sharding() {
        let key = Value::Int64(Some(2024));
        let statement = Statement::count(&WRITER, &LOAN, Some(&key), None)
            .expect("Could not build the count");
        assert_eq!(statement.sql, "select count(*) from loan_2024");
        let statement = Statement::delete(&WRITER, &LOAN, Some(&key), Scope::Everything)
            .expect("Could not build the delete");
        assert_eq!(statement.sql, "delete from loan_2024");
        assert!(
            Statement::select(&WRITER, &LOAN, None, &Select::new()).is_err(),
            "A sharded table needs a key"
        );
        assert!(
            Statement::count(&WRITER, &LOAN, Some(&Value::Varchar(Some("x".into()))), None)
                .is_err(),
            "The strategy rejects the key"
        );
        let statement = Statement::count(&WRITER, &BOOK, Some(&key), None)
            .expect("Could not build the count");
        assert_eq!(statement.sql, "select count(*) from book", "Key is ignored");
    }

    #[test]
    fn dialect() {
        let matcher = Matcher::new()
            .eq("title", "Dune")
            .group(Matcher::or().lt("pages", 100).gt("pages", 900));
        let statement = Statement::update(
            &NumberedWriter,
            &BOOK,
            None,
            &Modifier::new().set("author", "Herbert"),
            Scope::Matching(&matcher),
        )
        .expect("Could not build the update");
        assert_eq!(
            statement.sql,
            r#"update "book" set "author" = $1 where "title" = $2 and ("pages" < $3 or "pages" > $4)"#
        );
        assert_eq!(statement.params.len(), 4);
    }

    #[test]
    fn pager() {
        assert_eq!(
            Pager::new(3, 25).limit().unwrap(),
            Limit {
                limit: 25,
                offset: 50
            }
        );
        assert_eq!(Pager::new(1, 1).limit().unwrap().offset, 0);
        assert!(Pager::new(0, 10).limit().is_err());
        assert!(Pager::new(1, 0).limit().is_err());
        assert!(Pager::new(u64::MAX, 2).limit().is_err());
    }

    #[test]
    fn raw() {
        let statement = Statement::raw(
            indoc! {"
                SELECT b.title, count(*) AS loans
                FROM book b JOIN loan_2024 l ON l.id = b.id
                WHERE b.pages > ?
                GROUP BY b.title
            "},
            vec![Value::Int64(Some(300))],
        );
        assert_eq!(statement.sql.lines().count(), 4);
        assert!(statement.sql.starts_with("SELECT b.title"));
        assert_eq!(statement.sql.matches('?').count(), statement.params.len());
    }
}
