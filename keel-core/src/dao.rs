use crate::{
    AsValue, Batching, EntityDescriptor, Error, ID_COLUMN, Limit, Matcher, Modifier, Order, Pager,
    Result, RowLabeled, RowsAffected, Scope, Select, Statement, UnitOfWork, Value,
};
use std::{fmt::Debug, ops::ControlFlow};

/// Typed access to the table described by an [`EntityDescriptor`].
///
/// Every operation runs through the unit of work it receives, statements are
/// built (and validated) before any connection is touched. Sharded tables are
/// resolved with the shard key of the unit of work.
///
/// ```rust,ignore
/// let users = Dao::new(&USER);
/// datasource.scoped(TxMode::Write, "signup", |uow| {
///     let mut user = User { name: "ada".into(), ..Default::default() };
///     users.insert(uow, &mut user)?;
///     users.update_by_id(uow, user.id, &Modifier::new().add("logins", 1))
/// })?;
/// ```
pub struct Dao<T: 'static> {
    descriptor: &'static EntityDescriptor<T>,
}

impl<T: 'static> Clone for Dao<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for Dao<T> {}

impl<T: 'static> Debug for Dao<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Dao").field(self.descriptor).finish()
    }
}

impl<T: 'static> Dao<T> {
    pub fn new(descriptor: &'static EntityDescriptor<T>) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &'static EntityDescriptor<T> {
        self.descriptor
    }

    fn fetch(&self, uow: &mut UnitOfWork, statement: Statement) -> Result<Vec<T>> {
        let rows = uow.fetch(&statement.sql, &statement.params)?;
        rows.into_iter()
            .map(|row| self.descriptor.decode_row(row))
            .collect()
    }

    fn execute(&self, uow: &mut UnitOfWork, statement: Statement) -> Result<u64> {
        Ok(uow.execute(&statement.sql, &statement.params)?.rows_affected)
    }

    /// Every row following `orders`. `view` restricts the selected columns,
    /// empty means all of them. The same holds for every read below.
    pub fn get_all(
        &self,
        uow: &mut UnitOfWork,
        orders: &[Order],
        view: &[&str],
    ) -> Result<Vec<T>> {
        self.query_list(uow, &Select::new().view(view).orders(orders))
    }

    /// `None` when no row has this id.
    pub fn get_by_id(
        &self,
        uow: &mut UnitOfWork,
        id: impl Into<Value>,
        view: &[&str],
    ) -> Result<Option<T>> {
        let matcher = Matcher::new().eq(ID_COLUMN, id);
        self.query_one(uow, Some(&matcher), &[], view)
    }

    /// Rows come back in the database order, missing ids are skipped.
    pub fn get_by_ids<V: Into<Value>>(
        &self,
        uow: &mut UnitOfWork,
        ids: impl IntoIterator<Item = V>,
        view: &[&str],
    ) -> Result<Vec<T>> {
        let ids = ids.into_iter().map(Into::into).collect::<Vec<Value>>();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let matcher = Matcher::new().in_list(ID_COLUMN, ids);
        self.query_list(uow, &Select::new().view(view).matcher(&matcher))
    }

    pub fn query_list(&self, uow: &mut UnitOfWork, select: &Select) -> Result<Vec<T>> {
        let statement = Statement::select(uow.writer(), self.descriptor, uow.shard_key(), select)?;
        self.fetch(uow, statement)
    }

    pub fn query_page(
        &self,
        uow: &mut UnitOfWork,
        matcher: Option<&Matcher>,
        orders: &[Order],
        pager: Pager,
        view: &[&str],
    ) -> Result<Vec<T>> {
        let select = Select {
            view,
            matcher,
            orders,
            limit: Some(pager.limit()?),
        };
        self.query_list(uow, &select)
    }

    /// First row matching, following `orders`.
    pub fn query_one(
        &self,
        uow: &mut UnitOfWork,
        matcher: Option<&Matcher>,
        orders: &[Order],
        view: &[&str],
    ) -> Result<Option<T>> {
        let select = Select {
            view,
            matcher,
            orders,
            limit: Some(Limit {
                limit: 1,
                offset: 0,
            }),
        };
        Ok(self.query_list(uow, &select)?.into_iter().next())
    }

    /// Streams the rows selected by `select` to `handler` one page at a time,
    /// see [`Batching`]. With a `view`, only those columns are decoded into the
    /// blank instances. Returns the number of rows delivered.
    pub fn query_batched(
        &self,
        uow: &mut UnitOfWork,
        select: &Select,
        batching: Batching,
        handler: impl FnMut(Vec<T>) -> ControlFlow<()>,
    ) -> Result<u64> {
        if select.limit.is_some() {
            let error = Error::msg("A batched query computes its own limit, do not set one");
            log::error!("{:#}", error);
            return Err(error);
        }
        batching.run(
            |window| {
                let statement = Statement::select(
                    uow.writer(),
                    self.descriptor,
                    uow.shard_key(),
                    &select.limit(window),
                )?;
                self.fetch(uow, statement)
            },
            handler,
        )
    }

    pub fn count(&self, uow: &mut UnitOfWork, matcher: Option<&Matcher>) -> Result<u64> {
        let statement = Statement::count(uow.writer(), self.descriptor, uow.shard_key(), matcher)?;
        let rows = uow.fetch(&statement.sql, &statement.params)?;
        let Some(value) = rows.into_iter().next().and_then(|r| r.values.into_vec().pop()) else {
            return Err(Error::msg(format!(
                "Count on `{}` returned no row",
                self.descriptor.table
            )));
        };
        Ok(i64::try_from_value(value)?.max(0) as u64)
    }

    /// Writes the generated id back into `entity` when the table has an auto
    /// column.
    pub fn insert(&self, uow: &mut UnitOfWork, entity: &mut T) -> Result<RowsAffected> {
        let statement = Statement::insert(uow.writer(), self.descriptor, uow.shard_key(), entity)?;
        let result = uow.execute(&statement.sql, &statement.params)?;
        match result.last_affected_id {
            Some(id) if self.descriptor.has_auto_column() => {
                (self.descriptor.assign)(entity, self.descriptor.auto_column, id.as_value())?;
            }
            _ => {}
        }
        Ok(result)
    }

    /// Every non auto column of the row with the id of `entity`.
    pub fn update(&self, uow: &mut UnitOfWork, entity: &T) -> Result<u64> {
        let id = self.descriptor.extract_column(entity, ID_COLUMN)?;
        let matcher = Matcher::new().eq(ID_COLUMN, id);
        let statement = Statement::update_entity(
            uow.writer(),
            self.descriptor,
            uow.shard_key(),
            entity,
            &[ID_COLUMN],
            Scope::Matching(&matcher),
        )?;
        self.execute(uow, statement)
    }

    pub fn update_list(&self, uow: &mut UnitOfWork, entities: &[T]) -> Result<u64> {
        let mut total = 0;
        for entity in entities {
            total += self.update(uow, entity)?;
        }
        Ok(total)
    }

    pub fn update_by_id(
        &self,
        uow: &mut UnitOfWork,
        id: impl Into<Value>,
        modifier: &Modifier,
    ) -> Result<u64> {
        self.update_by_matcher(uow, &Matcher::new().eq(ID_COLUMN, id), modifier)
    }

    pub fn update_by_ids<V: Into<Value>>(
        &self,
        uow: &mut UnitOfWork,
        ids: impl IntoIterator<Item = V>,
        modifier: &Modifier,
    ) -> Result<u64> {
        let ids = ids.into_iter().map(Into::into).collect::<Vec<Value>>();
        if ids.is_empty() {
            return Ok(0);
        }
        self.update_by_matcher(uow, &Matcher::new().in_list(ID_COLUMN, ids), modifier)
    }

    /// Rejects an empty matcher, see [`Dao::update_all`].
    pub fn update_by_matcher(
        &self,
        uow: &mut UnitOfWork,
        matcher: &Matcher,
        modifier: &Modifier,
    ) -> Result<u64> {
        let statement = Statement::update(
            uow.writer(),
            self.descriptor,
            uow.shard_key(),
            modifier,
            Scope::Matching(matcher),
        )?;
        self.execute(uow, statement)
    }

    /// Updates every row of the table.
    pub fn update_all(&self, uow: &mut UnitOfWork, modifier: &Modifier) -> Result<u64> {
        let statement = Statement::update(
            uow.writer(),
            self.descriptor,
            uow.shard_key(),
            modifier,
            Scope::Everything,
        )?;
        self.execute(uow, statement)
    }

    pub fn delete_by_id(&self, uow: &mut UnitOfWork, id: impl Into<Value>) -> Result<u64> {
        self.delete_by_matcher(uow, &Matcher::new().eq(ID_COLUMN, id))
    }

    pub fn delete_by_ids<V: Into<Value>>(
        &self,
        uow: &mut UnitOfWork,
        ids: impl IntoIterator<Item = V>,
    ) -> Result<u64> {
        let ids = ids.into_iter().map(Into::into).collect::<Vec<Value>>();
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_by_matcher(uow, &Matcher::new().in_list(ID_COLUMN, ids))
    }

    /// Rejects an empty matcher, see [`Dao::delete_all`].
    pub fn delete_by_matcher(&self, uow: &mut UnitOfWork, matcher: &Matcher) -> Result<u64> {
        let statement = Statement::delete(
            uow.writer(),
            self.descriptor,
            uow.shard_key(),
            Scope::Matching(matcher),
        )?;
        self.execute(uow, statement)
    }

    /// Deletes every row of the table.
    pub fn delete_all(&self, uow: &mut UnitOfWork) -> Result<u64> {
        let statement = Statement::delete(
            uow.writer(),
            self.descriptor,
            uow.shard_key(),
            Scope::Everything,
        )?;
        self.execute(uow, statement)
    }
}

/// Runs a query written by hand, `scan` turns each row into the caller type.
pub fn query_raw<R>(
    uow: &mut UnitOfWork,
    sql: &str,
    params: &[Value],
    scan: impl FnMut(RowLabeled) -> Result<R>,
) -> Result<Vec<R>> {
    uow.fetch(sql, params)?.into_iter().map(scan).collect()
}

/// Pages through a query written by hand, a ` limit .. offset ..` clause is
/// appended to `sql` for each page. The query must not already have one.
pub fn query_raw_batched(
    uow: &mut UnitOfWork,
    sql: &str,
    params: &[Value],
    batching: Batching,
    handler: impl FnMut(Vec<RowLabeled>) -> ControlFlow<()>,
) -> Result<u64> {
    batching.run(
        |window| {
            let mut paged = sql.to_string();
            uow.writer().write_limit(&mut paged, &window);
            uow.fetch(&paged, params)
        },
        handler,
    )
}

pub fn exec_raw(uow: &mut UnitOfWork, sql: &str, params: &[Value]) -> Result<RowsAffected> {
    uow.execute(sql, params)
}
