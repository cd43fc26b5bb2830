pub mod execute;
pub mod operators;
pub mod types;

pub use execute::{compare_rows, execute_query, sort_rows};
pub use operators::{compare_values, get_field_value, matches_filter, validate_filter};
pub use types::{normalize_sort, Query, SortDirection, SortEntry, SortInput};
