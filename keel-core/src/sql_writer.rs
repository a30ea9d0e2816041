use crate::{
    Assignment, Condition, Criterion, Direction, Error, Limit, Matcher, Modifier, Order, Result,
    Value, possibly_parenthesized, separated_by,
};
use std::fmt::Write;

/// Dialect aware SQL text production.
///
/// Every literal goes to `params` and is referenced by a placeholder, the
/// order of `params` is the order placeholders appear in `out`. Drivers only
/// override what differs from the defaults (placeholder syntax, transaction
/// statements).
pub trait SqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter;

    fn write_identifier(&self, out: &mut String, name: &str) {
        out.push_str(name);
    }

    /// `index` is 1-based, the position of the parameter being referenced.
    fn write_placeholder(&self, out: &mut String, _index: usize) {
        out.push('?');
    }

    fn write_param(&self, out: &mut String, params: &mut Vec<Value>, value: Value) {
        params.push(value);
        self.write_placeholder(out, params.len());
    }

    fn write_condition(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        condition: &Condition,
    ) -> Result<()> {
        match condition {
            Condition::Compare { column, op, value } => {
                self.write_identifier(out, column);
                out.push(' ');
                out.push_str(op.sql());
                out.push(' ');
                self.write_param(out, params, value.clone());
            }
            Condition::Like {
                column,
                value,
                style,
                negated,
            } => {
                self.write_identifier(out, column);
                out.push_str(if *negated { " not like " } else { " like " });
                self.write_param(out, params, Value::Varchar(Some(style.pattern(value))));
            }
            Condition::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    let error = Error::msg(format!(
                        "Condition `{} {}in` requires at least one value",
                        column,
                        if *negated { "not " } else { "" }
                    ));
                    log::error!("{:#}", error);
                    return Err(error);
                }
                self.write_identifier(out, column);
                out.push_str(if *negated { " not in (" } else { " in (" });
                separated_by(
                    out,
                    values,
                    |out, v| self.write_param(out, params, v.clone()),
                    ",",
                );
                out.push(')');
            }
            Condition::Between { column, low, high } => {
                self.write_identifier(out, column);
                out.push_str(" between ");
                self.write_param(out, params, low.clone());
                out.push_str(" and ");
                self.write_param(out, params, high.clone());
            }
            Condition::Null { column, negated } => {
                self.write_identifier(out, column);
                out.push_str(if *negated { " is not null" } else { " is null" });
            }
        }
        Ok(())
    }

    /// Depth first, left to right. Empty groups are skipped, nested groups
    /// rendering more than one term are parenthesized.
    fn write_matcher(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        matcher: &Matcher,
    ) -> Result<()> {
        let mut first = true;
        for criterion in matcher.criteria().iter().filter(|v| !v.is_empty()) {
            if !first {
                out.push_str(matcher.connector().sql());
            }
            first = false;
            match criterion {
                Criterion::Condition(condition) => self.write_condition(out, params, condition)?,
                Criterion::Group(group) => {
                    possibly_parenthesized!(
                        out,
                        group.rendered_terms() > 1,
                        self.write_matcher(out, params, group)?
                    );
                }
            }
        }
        Ok(())
    }

    /// Writes ` where <condition>` unless the matcher is absent or empty.
    fn write_where(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        matcher: Option<&Matcher>,
    ) -> Result<()> {
        let Some(matcher) = matcher.filter(|m| !m.is_empty()) else {
            return Ok(());
        };
        out.push_str(" where ");
        self.write_matcher(out, params, matcher)
    }

    fn write_modifier(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        modifier: &Modifier,
    ) -> Result<()> {
        if modifier.is_empty() {
            let error = Error::msg("Cannot write an update without any field to set");
            log::error!("{:#}", error);
            return Err(error);
        }
        separated_by(
            out,
            modifier.fields(),
            |out, (column, assignment)| {
                self.write_identifier(out, column);
                out.push_str(" = ");
                match assignment {
                    Assignment::Set(v) => self.write_param(out, params, v.clone()),
                    Assignment::Add(v) => {
                        self.write_identifier(out, column);
                        out.push_str(" + ");
                        self.write_param(out, params, v.clone());
                    }
                }
            },
            ", ",
        );
        Ok(())
    }

    fn write_order_by(&self, out: &mut String, orders: &[Order]) {
        if orders.is_empty() {
            return;
        }
        out.push_str(" order by ");
        separated_by(
            out,
            orders,
            |out, order| {
                self.write_identifier(out, &order.column);
                out.push_str(match order.direction {
                    Direction::Asc => " asc",
                    Direction::Desc => " desc",
                });
            },
            ", ",
        );
    }

    fn write_limit(&self, out: &mut String, limit: &Limit) {
        let _ = write!(out, " limit {} offset {}", limit.limit, limit.offset);
    }

    #[allow(clippy::too_many_arguments)]
    fn write_select(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        columns: &[&str],
        table: &str,
        matcher: Option<&Matcher>,
        orders: &[Order],
        limit: Option<&Limit>,
    ) -> Result<()> {
        out.push_str("select ");
        separated_by(out, columns, |out, v| self.write_identifier(out, v), ", ");
        out.push_str(" from ");
        self.write_identifier(out, table);
        self.write_where(out, params, matcher)?;
        self.write_order_by(out, orders);
        if let Some(limit) = limit {
            self.write_limit(out, limit);
        }
        Ok(())
    }

    fn write_count(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        table: &str,
        matcher: Option<&Matcher>,
    ) -> Result<()> {
        out.push_str("select count(*) from ");
        self.write_identifier(out, table);
        self.write_where(out, params, matcher)
    }

    fn write_insert(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        table: &str,
        columns: &[&str],
        values: Vec<Value>,
    ) {
        out.push_str("insert into ");
        self.write_identifier(out, table);
        out.push('(');
        separated_by(out, columns, |out, v| self.write_identifier(out, v), ", ");
        out.push_str(") values(");
        separated_by(
            out,
            values,
            |out, v| self.write_param(out, params, v),
            ", ",
        );
        out.push(')');
    }

    /// `update <table> set <column> = ?, ...` for a whole entity.
    fn write_update(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        table: &str,
        columns: &[&str],
        values: Vec<Value>,
    ) {
        out.push_str("update ");
        self.write_identifier(out, table);
        out.push_str(" set ");
        separated_by(
            out,
            columns.iter().zip(values),
            |out, (column, value)| {
                self.write_identifier(out, column);
                out.push_str(" = ");
                self.write_param(out, params, value);
            },
            ", ",
        );
    }

    fn write_update_modifier(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        table: &str,
        modifier: &Modifier,
    ) -> Result<()> {
        out.push_str("update ");
        self.write_identifier(out, table);
        out.push_str(" set ");
        self.write_modifier(out, params, modifier)
    }

    fn write_delete(&self, out: &mut String, table: &str) {
        out.push_str("delete from ");
        self.write_identifier(out, table);
    }

    fn write_transaction_begin(&self, out: &mut String) {
        out.push_str("BEGIN");
    }

    fn write_transaction_commit(&self, out: &mut String) {
        out.push_str("COMMIT");
    }

    fn write_transaction_rollback(&self, out: &mut String) {
        out.push_str("ROLLBACK");
    }
}

/// `?` placeholders, plain `BEGIN`.
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericSqlWriter;

impl GenericSqlWriter {
    pub const fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for GenericSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }
}
