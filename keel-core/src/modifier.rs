use crate::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `column = ?`
    Set(Value),
    /// `column = column + ?`
    Add(Value),
}

/// Structured SET clause, rendered in insertion order.
///
/// Assigning a column twice keeps its first position and the last value.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Modifier {
    fields: Vec<(String, Assignment)>,
}

impl Modifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assign(column.into(), Assignment::Set(value.into()))
    }

    pub fn add(self, column: impl Into<String>, delta: impl Into<Value>) -> Self {
        self.assign(column.into(), Assignment::Add(delta.into()))
    }

    fn assign(mut self, column: String, assignment: Assignment) -> Self {
        if let Some(field) = self.fields.iter_mut().find(|(c, _)| *c == column) {
            field.1 = assignment;
        } else {
            self.fields.push((column, assignment));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[(String, Assignment)] {
        &self.fields
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }
}
