use crate::{EntityDescriptor, Error, Limit, Matcher, Modifier, Order, Result, SqlWriter, Value};

/// SQL text with the parameters bound, in order, to its placeholders.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Rows targeted by an update or a delete.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// Rows matching a non empty matcher.
    Matching(&'a Matcher),
    /// The whole table, must be asked for explicitly.
    Everything,
}

/// Shape of a select: projection, filter, ordering and row window.
///
/// An empty `view` selects every column of the entity.
#[derive(Default, Debug, Clone, Copy)]
pub struct Select<'a> {
    pub view: &'a [&'a str],
    pub matcher: Option<&'a Matcher>,
    pub orders: &'a [Order],
    pub limit: Option<Limit>,
}

impl<'a> Select<'a> {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn view(mut self, view: &'a [&'a str]) -> Self {
        self.view = view;
        self
    }
    pub fn matcher(mut self, matcher: &'a Matcher) -> Self {
        self.matcher = Some(matcher);
        self
    }
    pub fn orders(mut self, orders: &'a [Order]) -> Self {
        self.orders = orders;
        self
    }
    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Statement {
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Columns actually selected: the view when given, every column otherwise.
    pub fn projection<'a, T>(
        descriptor: &EntityDescriptor<T>,
        view: &'a [&'a str],
    ) -> Result<Vec<&'a str>> {
        if view.is_empty() {
            return Ok(descriptor.columns.to_vec());
        }
        descriptor.check_columns(view.iter().copied())?;
        Ok(view.to_vec())
    }

    pub fn select<T>(
        writer: &dyn SqlWriter,
        descriptor: &EntityDescriptor<T>,
        shard_key: Option<&Value>,
        select: &Select,
    ) -> Result<Self> {
        let columns = Self::projection(descriptor, select.view)?;
        descriptor.check_columns(select.orders.iter().map(|o| o.column.as_str()))?;
        if let Some(matcher) = select.matcher {
            descriptor.check_columns(matcher.columns())?;
        }
        let table = descriptor.table_name(shard_key)?;
        let mut result = Self::default();
        writer.write_select(
            &mut result.sql,
            &mut result.params,
            &columns,
            &table,
            select.matcher,
            select.orders,
            select.limit.as_ref(),
        )?;
        Ok(result)
    }

    pub fn count<T>(
        writer: &dyn SqlWriter,
        descriptor: &EntityDescriptor<T>,
        shard_key: Option<&Value>,
        matcher: Option<&Matcher>,
    ) -> Result<Self> {
        if let Some(matcher) = matcher {
            descriptor.check_columns(matcher.columns())?;
        }
        let table = descriptor.table_name(shard_key)?;
        let mut result = Self::default();
        writer.write_count(&mut result.sql, &mut result.params, &table, matcher)?;
        Ok(result)
    }

    /// Every column except the auto column.
    pub fn insert<T>(
        writer: &dyn SqlWriter,
        descriptor: &EntityDescriptor<T>,
        shard_key: Option<&Value>,
        entity: &T,
    ) -> Result<Self> {
        let table = descriptor.table_name(shard_key)?;
        let columns = descriptor.insert_columns().collect::<Vec<_>>();
        let values = descriptor.extract_values(entity, false, &[])?;
        let mut result = Self::default();
        writer.write_insert(&mut result.sql, &mut result.params, &table, &columns, values);
        Ok(result)
    }

    /// Sets every column except the auto column and the `exclude` ones to the
    /// values of `entity`.
    pub fn update_entity<T>(
        writer: &dyn SqlWriter,
        descriptor: &EntityDescriptor<T>,
        shard_key: Option<&Value>,
        entity: &T,
        exclude: &[&str],
        scope: Scope,
    ) -> Result<Self> {
        check_scope(descriptor, "update", scope)?;
        let table = descriptor.table_name(shard_key)?;
        let columns = descriptor
            .insert_columns()
            .filter(|c| !exclude.contains(c))
            .collect::<Vec<_>>();
        if columns.is_empty() {
            let error = Error::msg(format!(
                "No column of `{}` is left to update",
                descriptor.table
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        let values = descriptor.extract_values(entity, false, exclude)?;
        let mut result = Self::default();
        writer.write_update(&mut result.sql, &mut result.params, &table, &columns, values);
        write_scope(writer, &mut result, scope)?;
        Ok(result)
    }

    pub fn update<T>(
        writer: &dyn SqlWriter,
        descriptor: &EntityDescriptor<T>,
        shard_key: Option<&Value>,
        modifier: &Modifier,
        scope: Scope,
    ) -> Result<Self> {
        check_scope(descriptor, "update", scope)?;
        descriptor.check_columns(modifier.columns())?;
        let table = descriptor.table_name(shard_key)?;
        let mut result = Self::default();
        writer.write_update_modifier(&mut result.sql, &mut result.params, &table, modifier)?;
        write_scope(writer, &mut result, scope)?;
        Ok(result)
    }

    pub fn delete<T>(
        writer: &dyn SqlWriter,
        descriptor: &EntityDescriptor<T>,
        shard_key: Option<&Value>,
        scope: Scope,
    ) -> Result<Self> {
        check_scope(descriptor, "delete", scope)?;
        let table = descriptor.table_name(shard_key)?;
        let mut result = Self::default();
        writer.write_delete(&mut result.sql, &table);
        write_scope(writer, &mut result, scope)?;
        Ok(result)
    }
}

/// Rejects an empty matcher and any column the entity does not have.
fn check_scope<T>(descriptor: &EntityDescriptor<T>, action: &str, scope: Scope) -> Result<()> {
    let empty = match scope {
        Scope::Matching(matcher) => {
            descriptor.check_columns(matcher.columns())?;
            matcher.is_empty()
        }
        Scope::Everything => false,
    };
    if empty {
        let error = Error::msg(format!(
            "Refusing to {} every row of `{}` from an empty matcher, use the `{}_all` variant",
            action, descriptor.table, action
        ));
        log::error!("{:#}", error);
        return Err(error);
    }
    Ok(())
}

fn write_scope(writer: &dyn SqlWriter, statement: &mut Statement, scope: Scope) -> Result<()> {
    match scope {
        Scope::Matching(matcher) => {
            writer.write_where(&mut statement.sql, &mut statement.params, Some(matcher))
        }
        Scope::Everything => Ok(()),
    }
}
