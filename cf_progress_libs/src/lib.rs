pub mod codeforces;
pub mod schedule;

pub use cf_progress_derive::FieldList;

/// Comma separated column list of a table row type, used to build `SELECT` statements.
pub trait FieldList {
    fn field_list() -> &'static str;
}
