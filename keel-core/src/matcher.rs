use crate::{GenericSqlWriter, Result, SqlWriter, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

/// Where the pattern is anchored, the `%` wildcards go on the other side(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeStyle {
    /// `value%`
    Left,
    /// `%value`
    Right,
    /// `%value%`
    Both,
}

impl LikeStyle {
    pub fn pattern(&self, value: &str) -> String {
        match self {
            LikeStyle::Left => format!("{}%", value),
            LikeStyle::Right => format!("%{}", value),
            LikeStyle::Both => format!("%{}%", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn sql(&self) -> &'static str {
        match self {
            Connector::And => " and ",
            Connector::Or => " or ",
        }
    }
}

/// A leaf comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    Like {
        column: String,
        value: String,
        style: LikeStyle,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
    },
    Null {
        column: String,
        negated: bool,
    },
}

impl Condition {
    pub fn column(&self) -> &str {
        match self {
            Condition::Compare { column, .. }
            | Condition::Like { column, .. }
            | Condition::In { column, .. }
            | Condition::Between { column, .. }
            | Condition::Null { column, .. } => column,
        }
    }

    /// Number of parameters this condition appends when rendered.
    pub fn placeholders(&self) -> usize {
        match self {
            Condition::Compare { .. } | Condition::Like { .. } => 1,
            Condition::In { values, .. } => values.len(),
            Condition::Between { .. } => 2,
            Condition::Null { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Condition(Condition),
    Group(Matcher),
}

impl Criterion {
    pub fn is_empty(&self) -> bool {
        match self {
            Criterion::Condition(..) => false,
            Criterion::Group(v) => v.is_empty(),
        }
    }
}

/// Structured WHERE condition.
///
/// A flat list of criteria joined by a single connector, evaluated left to
/// right. Mixing `and` and `or` requires an explicit nested group:
///
/// ```rust
/// use keel_core::{LikeStyle, Matcher};
/// let matcher = Matcher::new()
///     .like("name", "ro", LikeStyle::Left)
///     .group(Matcher::or().lt("id", 4).is_null("deleted_at"));
/// let mut params = Vec::new();
/// let sql = matcher.to_sql(&mut params).unwrap();
/// assert_eq!(sql, "name like ? and (id < ? or deleted_at is null)");
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    connector: Connector,
    criteria: Vec<Criterion>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher {
    /// Criteria joined by `and`.
    pub fn new() -> Self {
        Self::with_connector(Connector::And)
    }

    /// Criteria joined by `or`.
    pub fn or() -> Self {
        Self::with_connector(Connector::Or)
    }

    pub fn with_connector(connector: Connector) -> Self {
        Self {
            connector,
            criteria: Vec::new(),
        }
    }

    pub fn connector(&self) -> Connector {
        self.connector
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// True when no leaf condition exists anywhere in the tree.
    pub fn is_empty(&self) -> bool {
        self.criteria.iter().all(Criterion::is_empty)
    }

    /// Number of leaf conditions in the tree.
    pub fn leaf_count(&self) -> usize {
        self.criteria
            .iter()
            .map(|v| match v {
                Criterion::Condition(..) => 1,
                Criterion::Group(g) => g.leaf_count(),
            })
            .sum()
    }

    /// Columns of every leaf, depth first.
    pub fn columns(&self) -> Vec<&str> {
        let mut result = Vec::new();
        self.collect_columns(&mut result);
        result
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        for criterion in &self.criteria {
            match criterion {
                Criterion::Condition(condition) => out.push(condition.column()),
                Criterion::Group(group) => group.collect_columns(out),
            }
        }
    }

    /// Criteria that will render to a term.
    pub fn rendered_terms(&self) -> usize {
        self.criteria.iter().filter(|v| !v.is_empty()).count()
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.criteria.push(Criterion::Condition(condition));
        self
    }

    pub fn group(mut self, matcher: Matcher) -> Self {
        self.criteria.push(Criterion::Group(matcher));
        self
    }

    fn compare(self, column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        self.condition(Condition::Compare {
            column: column.into(),
            op,
            value: value.into(),
        })
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Eq, value)
    }

    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Ne, value)
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Lt, value)
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Lte, value)
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Gt, value)
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, CompareOp::Gte, value)
    }

    pub fn like(self, column: impl Into<String>, value: impl Into<String>, style: LikeStyle) -> Self {
        self.condition(Condition::Like {
            column: column.into(),
            value: value.into(),
            style,
            negated: false,
        })
    }

    pub fn not_like(
        self,
        column: impl Into<String>,
        value: impl Into<String>,
        style: LikeStyle,
    ) -> Self {
        self.condition(Condition::Like {
            column: column.into(),
            value: value.into(),
            style,
            negated: true,
        })
    }

    pub fn in_list<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.condition(Condition::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    pub fn not_in_list<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.condition(Condition::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        })
    }

    pub fn between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.condition(Condition::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
        })
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.condition(Condition::Null {
            column: column.into(),
            negated: false,
        })
    }

    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.condition(Condition::Null {
            column: column.into(),
            negated: true,
        })
    }

    /// Renders with `?` placeholders, appending the parameters to `params`.
    /// An empty matcher renders to an empty string and leaves `params` untouched.
    pub fn to_sql(&self, params: &mut Vec<Value>) -> Result<String> {
        self.to_sql_with(&GenericSqlWriter::new(), params)
    }

    pub fn to_sql_with(&self, writer: &dyn SqlWriter, params: &mut Vec<Value>) -> Result<String> {
        let mut out = String::new();
        let len = params.len();
        if let Err(e) = writer.write_matcher(&mut out, params, self) {
            params.truncate(len);
            return Err(e);
        }
        Ok(out)
    }
}
