use keel_core::SqlWriter;

/// Quoted identifiers, write transactions take the database lock upfront.
#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteSqlWriter {}

impl SqlWriter for SqliteSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn write_identifier(&self, out: &mut String, name: &str) {
        out.push('"');
        out.push_str(&name.replace('"', "\"\""));
        out.push('"');
    }

    fn write_transaction_begin(&self, out: &mut String) {
        out.push_str("BEGIN IMMEDIATE");
    }
}
