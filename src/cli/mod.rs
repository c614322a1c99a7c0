pub mod args;

pub use args::{parse_column_spec, Args};
