use crate::{Error, Result, RowLabeled, Value};
use std::fmt::{self, Debug};

/// Column used by the by-id operations.
pub const ID_COLUMN: &str = "id";

/// Table name resolution strategy for sharded entities.
///
/// Invoked once per statement build with the base table name and the shard
/// key the caller attached to the unit of work.
pub trait Sharding: Send + Sync {
    fn resolve(&self, table: &str, key: &Value) -> Result<String>;
}

impl<F> Sharding for F
where
    F: Fn(&str, &Value) -> Result<String> + Send + Sync,
{
    fn resolve(&self, table: &str, key: &Value) -> Result<String> {
        self(table, key)
    }
}

/// Static mapping between a Rust type and a table.
///
/// One descriptor exists per mapped type, usually as a `static`. The column
/// order in `columns` is the order of `extract` output and of every generated
/// column list.
///
/// ```rust
/// use keel_core::{AsValue, EntityDescriptor, Value};
///
/// #[derive(Default)]
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// static TAG: EntityDescriptor<Tag> = EntityDescriptor {
///     table: "tag",
///     columns: &["id", "label"],
///     auto_column: "id",
///     sharding: None,
///     instance: Tag::default,
///     extract: |tag| vec![tag.id.as_value(), tag.label.clone().as_value()],
///     assign: |tag, column, value| {
///         match column {
///             "id" => tag.id = AsValue::try_from_value(value)?,
///             "label" => tag.label = AsValue::try_from_value(value)?,
///             _ => {}
///         }
///         Ok(())
///     },
/// };
/// assert_eq!(TAG.table_name(None).unwrap(), "tag");
/// ```
pub struct EntityDescriptor<T> {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    /// Database generated column, empty when there is none.
    pub auto_column: &'static str,
    pub sharding: Option<&'static dyn Sharding>,
    /// Blank instance used as decoding target.
    pub instance: fn() -> T,
    /// One value per entry of `columns`, same order.
    pub extract: fn(&T) -> Vec<Value>,
    /// Stores a decoded column into the instance.
    pub assign: fn(&mut T, &str, Value) -> Result<()>,
}

impl<T> EntityDescriptor<T> {
    pub fn has_auto_column(&self) -> bool {
        !self.auto_column.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| *c == name)
    }

    /// Fails on the first name that is not a column of this entity.
    pub fn check_columns<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for name in names {
            if self.column_index(name).is_none() {
                let error = Error::msg(format!(
                    "Unknown column `{}` for table `{}`",
                    name, self.table
                ));
                log::error!("{:#}", error);
                return Err(error);
            }
        }
        Ok(())
    }

    /// Columns written by an insert: everything except the auto column.
    pub fn insert_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .copied()
            .filter(|c| *c != self.auto_column)
    }

    pub fn extract_values(
        &self,
        entity: &T,
        include_auto: bool,
        exclude: &[&str],
    ) -> Result<Vec<Value>> {
        let values = (self.extract)(entity);
        if values.len() != self.columns.len() {
            return Err(Error::msg(format!(
                "Descriptor of `{}` extracted {} values for {} columns",
                self.table,
                values.len(),
                self.columns.len()
            )));
        }
        Ok(self
            .columns
            .iter()
            .zip(values)
            .filter(|(c, _)| include_auto || **c != self.auto_column)
            .filter(|(c, _)| !exclude.contains(*c))
            .map(|(_, v)| v)
            .collect())
    }

    /// Value of a single column of `entity`.
    pub fn extract_column(&self, entity: &T, column: &str) -> Result<Value> {
        let index = self.column_index(column).ok_or_else(|| {
            Error::msg(format!(
                "Unknown column `{}` for table `{}`",
                column, self.table
            ))
        })?;
        let mut values = self.extract_values(entity, true, &[])?;
        Ok(values.swap_remove(index))
    }

    /// Resolves the physical table name, consulting the sharding strategy when
    /// the entity declares one.
    pub fn table_name(&self, shard_key: Option<&Value>) -> Result<String> {
        let Some(sharding) = self.sharding else {
            return Ok(self.table.to_string());
        };
        let Some(key) = shard_key else {
            let error = Error::msg(format!(
                "Table `{}` is sharded but no shard key was provided",
                self.table
            ));
            log::error!("{:#}", error);
            return Err(error);
        };
        sharding.resolve(self.table, key)
    }

    /// Builds a fresh instance from a fetched row. Only the columns present in
    /// the row are assigned, the rest keep the blank instance values.
    pub fn decode_row(&self, row: RowLabeled) -> Result<T> {
        let mut entity = (self.instance)();
        for (name, value) in row.labels.iter().zip(row.values.into_vec()) {
            (self.assign)(&mut entity, name, value).map_err(|e| {
                e.context(format!(
                    "While decoding column `{}` of table `{}`",
                    name, self.table
                ))
            })?;
        }
        Ok(entity)
    }
}

impl<T> Debug for EntityDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("auto_column", &self.auto_column)
            .field("sharded", &self.sharding.is_some())
            .finish()
    }
}
